//! Detection-to-event loop.
//!
//! Each tick runs strictly in sequence:
//! 1. Pull a frame from the source (a failed read skips the tick, state untouched)
//! 2. Run the detector (failure ends the run)
//! 3. Keep only target-class detections above the confidence floor
//! 4. Feed "target seen" into the persistence debouncer
//! 5. On a trigger, hand the frame to the event sink (failure is logged, not fatal)

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;

use crate::debounce::{PersistenceDebouncer, Trigger};
use crate::detect::{InferenceEngine, ModelAdapter, TargetFilter};
use crate::ingest::FrameSource;
use crate::sink::{Event, EventSink};
use crate::thermal::ThermalProbe;

/// Rolling FPS window.
pub const FPS_WINDOW: Duration = Duration::from_secs(2);

/// Monotonic time source for the loop.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Frames-per-second over fixed windows.
#[derive(Clone, Debug)]
pub struct FpsMeter {
    window: Duration,
    window_start: Option<Duration>,
    frames: u32,
    last: Option<f32>,
}

impl FpsMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            frames: 0,
            last: None,
        }
    }

    /// Count one frame at `now`. Returns the window's rate when a window closes.
    pub fn record(&mut self, now: Duration) -> Option<f32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_sub(start);
        if elapsed < self.window || elapsed.is_zero() {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.window_start = Some(now);
        self.frames = 0;
        self.last = Some(fps);
        Some(fps)
    }

    /// Rate of the most recently closed window.
    pub fn last(&self) -> Option<f32> {
        self.last
    }
}

/// What one tick did.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// The frame read failed; nothing else ran.
    Skipped,
    Processed(TickReport),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub detections: usize,
    pub matches: usize,
    pub trigger: Option<Trigger>,
    /// Where the snapshot landed. `None` when nothing fired or the sink failed.
    pub snapshot: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub skipped: u64,
    pub events: u64,
    pub sink_failures: u64,
}

pub struct Pipeline<S, E, K> {
    source: S,
    adapter: ModelAdapter<E>,
    filter: TargetFilter,
    debouncer: PersistenceDebouncer,
    sink: K,
    clock: Box<dyn Clock>,
    fps: FpsMeter,
    thermal: Option<ThermalProbe>,
    summary: RunSummary,
}

impl<S, E, K> Pipeline<S, E, K>
where
    S: FrameSource,
    E: InferenceEngine,
    K: EventSink,
{
    pub fn new(
        source: S,
        adapter: ModelAdapter<E>,
        filter: TargetFilter,
        persistence: Duration,
        sink: K,
    ) -> Self {
        Self {
            source,
            adapter,
            filter,
            debouncer: PersistenceDebouncer::new(persistence),
            sink,
            clock: Box::new(MonotonicClock::new()),
            fps: FpsMeter::new(FPS_WINDOW),
            thermal: None,
            summary: RunSummary::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Report board temperature alongside FPS.
    pub fn with_thermal(mut self, probe: ThermalProbe) -> Self {
        self.thermal = Some(probe);
        self
    }

    pub fn debouncer(&self) -> &PersistenceDebouncer {
        &self.debouncer
    }

    pub fn adapter(&self) -> &ModelAdapter<E> {
        &self.adapter
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn tick(&mut self) -> Result<TickOutcome> {
        self.summary.ticks += 1;

        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.summary.skipped += 1;
                log::warn!("frame read from {} failed: {:#}", self.source.describe(), err);
                return Ok(TickOutcome::Skipped);
            }
        };
        let now = self.clock.now();

        let detections = self
            .adapter
            .detect(&frame)
            .context("inference failed")?;
        let matches = self.filter.apply(&detections);
        let trigger = self.debouncer.update(!matches.is_empty(), now);
        log::debug!(
            "tick {}: {} detection(s), {} match(es), active={}",
            self.summary.ticks,
            detections.len(),
            matches.len(),
            self.debouncer.state().is_active()
        );

        let mut report = TickReport {
            detections: detections.len(),
            matches: matches.len(),
            trigger,
            snapshot: None,
        };

        if let Some(trigger) = trigger {
            self.summary.events += 1;
            let event = Event {
                timestamp: Local::now(),
                at: trigger.at,
                persisted: trigger.persisted,
                frame,
            };
            match self.sink.persist(&event) {
                Ok(path) => {
                    log::info!(
                        "target present for {:.2}s, snapshot saved to {}",
                        trigger.persisted.as_secs_f32(),
                        path.display()
                    );
                    report.snapshot = Some(path);
                }
                Err(err) => {
                    self.summary.sink_failures += 1;
                    log::error!("failed to save event snapshot: {:#}", err);
                }
            }
        }

        if let Some(fps) = self.fps.record(now) {
            match self.thermal.as_ref().and_then(ThermalProbe::read_celsius) {
                Some(celsius) => log::info!("fps {:.1}, soc {:.1}C", fps, celsius),
                None => log::info!("fps {:.1}", fps),
            }
        }

        Ok(TickOutcome::Processed(report))
    }

    /// Tick until `shutdown` yields a message or `max_frames` ticks have run.
    pub fn run(&mut self, shutdown: &Receiver<()>, max_frames: Option<u64>) -> Result<RunSummary> {
        log::info!(
            "watching {} for class {} (score >= {:.2}, persistence {:.2}s)",
            self.source.describe(),
            self.filter.class_id,
            self.filter.min_score,
            self.debouncer.threshold().as_secs_f32()
        );

        loop {
            if max_frames.is_some_and(|limit| self.summary.ticks >= limit) {
                log::info!("frame limit reached");
                break;
            }
            self.tick()?;
            if shutdown.try_recv().is_ok() {
                log::info!("shutdown signal received");
                break;
            }
        }

        log::info!(
            "stopped after {} tick(s): {} event(s), {} skipped, {} sink failure(s)",
            self.summary.ticks,
            self.summary.events,
            self.summary.skipped,
            self.summary.sink_failures
        );
        Ok(self.summary.clone())
    }
}
