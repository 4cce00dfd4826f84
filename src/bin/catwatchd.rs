//! catwatchd - debounced presence daemon
//!
//! This daemon:
//! 1. Loads configuration (file, environment, flags)
//! 2. Opens the camera and the detector model (either failing aborts startup)
//! 3. Runs the per-frame loop until Ctrl-C or the frame limit
//! 4. Saves a snapshot each time the target has been present long enough

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;

use catwatch::{
    open_source, CatwatchConfig, FrameSource, ModelAdapter, Pipeline, SnapshotDir, ThermalProbe,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML, or JSON with a .json extension).
    #[arg(long, env = "CATWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Frame source: stub://…, an image file or directory, or a device node.
    #[arg(long)]
    source: Option<String>,
    /// Stop after this many ticks.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Skip the board temperature readout.
    #[arg(long)]
    no_thermal: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = CatwatchConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        config.device.source = Some(source);
    }

    let source = open_source(config.capture()).context("open frame source")?;
    log::info!("frame source ready: {}", source.describe());

    let adapter = ModelAdapter::load(&config.model.path, config.model.input_size)
        .with_context(|| format!("load model {}", config.model.path.display()))?;
    let sink = SnapshotDir::create(&config.events_dir)?;
    log::info!("events will be written to {}", sink.dir().display());

    let mut pipeline = Pipeline::new(
        source,
        adapter,
        config.target_filter(),
        config.persistence(),
        sink,
    );
    if !args.no_thermal {
        pipeline = pipeline.with_thermal(ThermalProbe::default());
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    pipeline.run(&rx, args.max_frames)?;
    Ok(())
}
