use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::config::MonitorConfig;
use crate::detection::domain::detector_handle::DetectorHandle;
use crate::estimation::domain::gaze_estimator::{estimate_gaze, GazeConfig};
use crate::estimation::domain::rotation_estimator::{estimate_rotation, RotationConfig};
use crate::sampling::cycle_logger::{CycleLogger, NullCycleLogger, TOTAL_STAGE};
use crate::sampling::domain::brightness::sample_brightness;
use crate::sampling::domain::sample::{CycleError, Sample, SamplerEvent};
use crate::shared::constants::{
    DEFAULT_BRIGHTNESS_STRIDE, DEFAULT_OVERRUN_LIMIT, DEFAULT_PROCESSING_BUDGET_MS,
    DEFAULT_SAMPLE_INTERVAL_MS, FALLBACK_FRAME_HEIGHT, FALLBACK_FRAME_WIDTH,
};
use crate::shared::frame::Frame;
use crate::video::domain::video_source::VideoSource;

/// Captured frames are RGBA, like a canvas readback.
const CAPTURE_CHANNELS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub sample_interval_ms: u64,
    pub processing_budget_ms: u64,
    /// Consecutive over-budget cycles that disable sampling.
    pub overrun_limit: u32,
    pub fallback_width: u32,
    pub fallback_height: u32,
    pub brightness_stride: usize,
    /// Whether a failed cycle clears the current overrun streak.
    pub reset_overruns_on_error: bool,
}

impl SamplerConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn processing_budget(&self) -> Duration {
        Duration::from_millis(self.processing_budget_ms)
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            processing_budget_ms: DEFAULT_PROCESSING_BUDGET_MS,
            overrun_limit: DEFAULT_OVERRUN_LIMIT,
            fallback_width: FALLBACK_FRAME_WIDTH,
            fallback_height: FALLBACK_FRAME_HEIGHT,
            brightness_stride: DEFAULT_BRIGHTNESS_STRIDE,
            reset_overruns_on_error: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub is_processing: bool,
    pub is_disabled: bool,
    pub consecutive_overruns: u32,
}

/// What a single [`FrameScheduler::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A cycle ran and emitted exactly one event.
    Ran,
    /// Another cycle was in flight; this sample was dropped.
    Busy,
    /// The overrun breaker is tripped.
    Disabled,
    /// The source has no current frame yet.
    NotReady,
}

/// Samples a [`VideoSource`] at a fixed cadence and reports one
/// [`SamplerEvent`] per completed cycle.
///
/// Layout: `ticker thread → (rendezvous) → worker thread [capture → detect →
/// estimate → brightness] → event channel`
///
/// Ticks that arrive while a cycle is in flight are dropped rather than
/// queued. Cycles slower than the processing budget count as overruns;
/// enough consecutive overruns disable sampling until [`start`](Self::start)
/// is called again.
pub struct FrameScheduler {
    core: Arc<SamplerCore>,
    timer: Option<Timer>,
}

struct Timer {
    stop_tx: Sender<()>,
    ticker: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl FrameScheduler {
    pub fn new(
        source: Box<dyn VideoSource>,
        detector: DetectorHandle,
        config: &MonitorConfig,
        logger: Option<Box<dyn CycleLogger>>,
    ) -> (Self, Receiver<SamplerEvent>) {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let core = SamplerCore {
            config: config.sampler,
            rotation: config.rotation,
            gaze: config.gaze,
            source: Mutex::new(source),
            detector,
            buffer: Mutex::new(None),
            logger: Mutex::new(logger.unwrap_or_else(|| Box::new(NullCycleLogger))),
            events: events_tx,
            running: AtomicBool::new(false),
            processing: AtomicBool::new(false),
            disabled: AtomicBool::new(false),
            consecutive_overruns: AtomicU32::new(0),
        };
        (
            Self {
                core: Arc::new(core),
                timer: None,
            },
            events_rx,
        )
    }

    /// Begins periodic sampling. No-op while already running; otherwise
    /// clears the breaker before the first tick.
    pub fn start(&mut self) {
        if self.core.running.load(Ordering::Acquire) {
            return;
        }
        // A timer may still be winding down after the breaker tripped.
        self.join_timer();

        self.core.disabled.store(false, Ordering::Release);
        self.core.consecutive_overruns.store(0, Ordering::Release);
        self.core.running.store(true, Ordering::Release);

        let interval = self.core.config.sample_interval();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        // Zero capacity: a send only succeeds when the worker is idle.
        let (work_tx, work_rx) = crossbeam_channel::bounded::<()>(0);

        let worker_core = self.core.clone();
        let worker = thread::spawn(move || {
            for () in work_rx {
                worker_core.tick();
            }
        });

        let ticker_core = self.core.clone();
        let ticker = thread::spawn(move || {
            let ticks = crossbeam_channel::tick(interval);
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticks) -> _ => {
                        if ticker_core.disabled.load(Ordering::Acquire) {
                            break;
                        }
                        match work_tx.try_send(()) {
                            Ok(()) => {}
                            Err(TrySendError::Full(())) => {
                                log::debug!("Sampling cycle still in flight, dropping tick");
                            }
                            Err(TrySendError::Disconnected(())) => break,
                        }
                    }
                }
            }
        });

        self.timer = Some(Timer {
            stop_tx,
            ticker,
            worker,
        });
        log::info!("Sampling started every {}ms", interval.as_millis());
    }

    /// Cancels periodic sampling, waiting for an in-flight cycle to finish.
    /// State from the last cycle is kept.
    pub fn stop(&mut self) {
        self.join_timer();
        if self.core.running.swap(false, Ordering::AcqRel) {
            log::info!("Sampling stopped");
        }
    }

    /// Stops sampling and releases the capture buffer and the detector.
    /// Safe to call repeatedly, and before [`start`](Self::start).
    pub fn cleanup(&mut self) {
        self.stop();
        let released_buffer = lock(&self.core.buffer).take().is_some();
        let released_detector = self.core.detector.release();
        if released_buffer || released_detector {
            lock(&self.core.logger).summary();
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.core.running.load(Ordering::Acquire),
            is_processing: self.core.processing.load(Ordering::Acquire),
            is_disabled: self.core.disabled.load(Ordering::Acquire),
            consecutive_overruns: self.core.consecutive_overruns.load(Ordering::Acquire),
        }
    }

    /// Runs one sampling cycle on the calling thread, subject to the same
    /// gates as timer ticks. Works whether or not the timer is running.
    pub fn tick(&self) -> TickOutcome {
        self.core.tick()
    }

    fn join_timer(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        drop(timer.stop_tx);
        if timer.ticker.join().is_err() {
            log::error!("Sampling ticker thread panicked");
        }
        // The ticker owned the work sender, so the worker drains and exits.
        if timer.worker.join().is_err() {
            log::error!("Sampling worker thread panicked");
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.join_timer();
    }
}

struct SamplerCore {
    config: SamplerConfig,
    rotation: RotationConfig,
    gaze: GazeConfig,
    source: Mutex<Box<dyn VideoSource>>,
    detector: DetectorHandle,
    /// Reused across cycles; released by cleanup.
    buffer: Mutex<Option<Frame>>,
    logger: Mutex<Box<dyn CycleLogger>>,
    events: Sender<SamplerEvent>,
    running: AtomicBool,
    processing: AtomicBool,
    disabled: AtomicBool,
    consecutive_overruns: AtomicU32,
}

/// Holds the single in-flight slot; released on drop whatever the outcome.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SamplerCore {
    fn tick(&self) -> TickOutcome {
        if self.disabled.load(Ordering::Acquire) {
            return TickOutcome::Disabled;
        }
        let Some(_guard) = ProcessingGuard::try_acquire(&self.processing) else {
            log::debug!("Sampling cycle still in flight, dropping tick");
            return TickOutcome::Busy;
        };

        let mut source = lock(&self.source);
        if !source.ready_state().can_capture() {
            log::debug!("Video source not ready, skipping tick");
            return TickOutcome::NotReady;
        }

        let start = Instant::now();
        match self.run_cycle(source.as_mut()) {
            Ok(sample) => self.finish(sample, start.elapsed()),
            Err(e) => self.fail(e),
        }
        TickOutcome::Ran
    }

    fn run_cycle(&self, source: &mut dyn VideoSource) -> Result<Sample, CycleError> {
        let (width, height) = source
            .dimensions()
            .filter(|&(w, h)| w > 0 && h > 0)
            .unwrap_or((self.config.fallback_width, self.config.fallback_height));

        let mut buffer = lock(&self.buffer);
        let frame = buffer.get_or_insert_with(|| Frame::blank(width, height, CAPTURE_CHANNELS));
        frame.reshape(width, height, CAPTURE_CHANNELS);

        let stage = Instant::now();
        source
            .capture(frame)
            .map_err(|e| CycleError::Capture(e.to_string()))?;
        self.timing("capture", stage);

        let detector = self.detector.acquire()?;
        let stage = Instant::now();
        let detection = lock(&detector)
            .detect(frame)
            .map_err(|e| CycleError::Detection(e.to_string()))?;
        self.timing("detect", stage);

        let stage = Instant::now();
        let (rotation, gaze) = match detection.primary() {
            Some(face) => (
                Some(estimate_rotation(face, &self.rotation)),
                Some(estimate_gaze(face, &self.gaze)),
            ),
            None => (None, None),
        };
        self.timing("estimate", stage);

        let stage = Instant::now();
        let brightness = sample_brightness(frame, self.config.brightness_stride);
        self.timing("brightness", stage);

        Ok(Sample {
            face_count: detection.count(),
            is_rotated: rotation.is_some_and(|r| r.is_rotated),
            is_looking_away: gaze.is_some_and(|g| g.is_looking_away),
            gaze_direction: gaze.map(|g| g.direction),
            brightness,
            processing_time_ms: 0.0,
        })
    }

    fn finish(&self, mut sample: Sample, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        sample.processing_time_ms = elapsed_ms;
        {
            let mut logger = lock(&self.logger);
            logger.timing(TOTAL_STAGE, elapsed_ms);
            logger.metric("face_count", sample.face_count as f64);
            logger.metric("brightness", sample.brightness);
        }

        if elapsed > self.config.processing_budget() {
            let overruns = self.consecutive_overruns.fetch_add(1, Ordering::AcqRel) + 1;
            let limit = self.config.overrun_limit;
            log::warn!(
                "Sampling cycle took {elapsed_ms:.1}ms (budget {}ms), overrun {overruns}/{limit}",
                self.config.processing_budget_ms
            );
            if overruns >= limit {
                self.trip_breaker(overruns);
                return;
            }
        } else {
            self.consecutive_overruns.store(0, Ordering::Release);
        }

        self.emit(SamplerEvent::Analysis(sample));
    }

    fn trip_breaker(&self, overruns: u32) {
        self.disabled.store(true, Ordering::Release);
        self.running.store(false, Ordering::Release);
        let reason = format!(
            "Sampling disabled after {overruns} consecutive cycles over the {}ms processing budget",
            self.config.processing_budget_ms
        );
        log::error!("{reason}");
        lock(&self.logger).info(&reason);
        self.emit(SamplerEvent::Disabled(reason));
    }

    fn fail(&self, error: CycleError) {
        log::warn!("Sampling cycle failed: {error}");
        if self.config.reset_overruns_on_error {
            self.consecutive_overruns.store(0, Ordering::Release);
        }
        self.emit(SamplerEvent::Error(error));
    }

    fn emit(&self, event: SamplerEvent) {
        // Nobody listening is not an error for the sampler.
        let _ = self.events.send(event);
    }

    fn timing(&self, stage: &str, since: Instant) {
        lock(&self.logger).timing(stage, since.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
