//! Event snapshots.
//!
//! An `Event` carries the frame that completed a persistence run. `SnapshotDir` writes it
//! as `event_<YYYYMMDD-HHMMSS>.jpg`; a second event within the same wall-clock second gets
//! `_2`, `_3`, … appended instead of overwriting the first.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;

use crate::frame::Frame;

pub const JPEG_QUALITY: u8 = 95;

#[derive(Clone, Debug)]
pub struct Event {
    /// Wall clock at emission, used for naming.
    pub timestamp: DateTime<Local>,
    /// Monotonic offset of the tick that fired.
    pub at: Duration,
    /// Continuous presence that triggered the event.
    pub persisted: Duration,
    pub frame: Frame,
}

impl Event {
    pub fn file_stem(&self) -> String {
        format!("event_{}", self.timestamp.format("%Y%m%d-%H%M%S"))
    }
}

/// Destination for emitted events.
pub trait EventSink {
    /// Persist the event, returning where it landed.
    fn persist(&mut self, event: &Event) -> Result<PathBuf>;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn persist(&mut self, event: &Event) -> Result<PathBuf> {
        (**self).persist(event)
    }
}

/// JPEG snapshots in a local directory.
#[derive(Debug)]
pub struct SnapshotDir {
    dir: PathBuf,
    quality: u8,
}

impl SnapshotDir {
    /// Create the directory if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create events dir {}", dir.display()))?;
        Ok(Self {
            dir,
            quality: JPEG_QUALITY,
        })
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn free_path(&self, stem: &str) -> PathBuf {
        let first = self.dir.join(format!("{stem}.jpg"));
        if !first.exists() {
            return first;
        }
        (2u32..)
            .map(|n| self.dir.join(format!("{stem}_{n}.jpg")))
            .find(|candidate| !candidate.exists())
            .unwrap_or(first)
    }
}

impl EventSink for SnapshotDir {
    fn persist(&mut self, event: &Event) -> Result<PathBuf> {
        let rgb = event.frame.to_rgb_image();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(&rgb)
            .context("encode event snapshot")?;

        let path = self.free_path(&event.file_stem());
        write_atomic(&path, &jpeg)
            .with_context(|| format!("write event snapshot {}", path.display()))?;
        Ok(path)
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("jpg.tmp");
    let written = File::create(&tmp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_rename_removes_temp_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // A non-empty directory at the target path makes the rename fail.
        let target = dir.path().join("event_20240309-211507.jpg");
        fs::create_dir(&target)?;
        fs::write(target.join("keep"), b"x")?;

        assert!(write_atomic(&target, b"jpeg bytes").is_err());
        assert!(!dir.path().join("event_20240309-211507.jpg.tmp").exists());
        assert!(target.is_dir());
        Ok(())
    }

    #[test]
    fn write_replaces_temp_with_target() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("event.jpg");
        write_atomic(&target, b"jpeg bytes")?;
        assert_eq!(fs::read(&target)?, b"jpeg bytes");
        assert!(!dir.path().join("event.jpg.tmp").exists());
        Ok(())
    }
}
