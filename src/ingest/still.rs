//! Still-image frame source.
//!
//! Replays a single image, or every image in a directory in file-name order, cycling forever.
//! Useful for bench runs without a camera attached.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct StillImageSource {
    root: PathBuf,
    images: Vec<PathBuf>,
    cursor: usize,
    stats: SourceStats,
}

impl StillImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            images: Vec::new(),
            cursor: 0,
            stats: SourceStats::default(),
        }
    }

    /// Images in replay order. Empty until `connect` succeeds.
    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }
}

impl FrameSource for StillImageSource {
    fn connect(&mut self) -> Result<()> {
        self.images = collect_images(&self.root)?;
        self.cursor = 0;
        log::info!(
            "StillImageSource: replaying {} image(s) from {}",
            self.images.len(),
            self.root.display()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.images.is_empty() {
            return Err(anyhow!("still image source not connected"));
        }
        let path = &self.images[self.cursor];
        self.cursor = (self.cursor + 1) % self.images.len();

        let decoded = image::open(path)
            .with_context(|| format!("decode image {}", path.display()))
            .map_err(|err| {
                self.stats.read_failures += 1;
                err
            })?;
        self.stats.frames_captured += 1;
        Ok(Frame::from_rgb_image(decoded.to_rgb8()))
    }

    fn stats(&self) -> SourceStats {
        self.stats.clone()
    }

    fn describe(&self) -> String {
        format!("images:{}", self.root.display())
    }
}

fn collect_images(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let entries =
        std::fs::read_dir(root).with_context(|| format!("read image dir {}", root.display()))?;
    let mut images = Vec::new();
    for entry in entries {
        let path = entry.context("read image dir entry")?.path();
        if path.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    if images.is_empty() {
        return Err(anyhow!("no images found in {}", root.display()));
    }
    images.sort();
    Ok(images)
}

pub(super) fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
