use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::error::BoxError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorInitError {
    #[error("landmark detector failed to initialize: {0}")]
    Failed(String),
    #[error("landmark detector handle is poisoned")]
    Poisoned,
}

/// Builds the inference engine on first use.
pub type DetectorFactory =
    Box<dyn Fn() -> Result<Box<dyn LandmarkDetector>, BoxError> + Send + Sync>;

/// An initialized detector shared between the handle and in-flight cycles.
pub type SharedDetector = Arc<Mutex<Box<dyn LandmarkDetector>>>;

enum SlotState {
    Empty,
    Initializing { attempt: u64 },
    Ready(SharedDetector),
    Failed { attempt: u64, message: String },
}

struct Slot {
    state: SlotState,
    attempts: u64,
}

/// Lazily constructed, explicitly released landmark detector.
///
/// The first [`acquire`](Self::acquire) runs the factory; callers arriving
/// while construction is in progress block until it finishes and share its
/// outcome, so one initialization serves everyone. A failed construction is
/// reported to all of its waiters and retried by the next caller.
pub struct DetectorHandle {
    factory: DetectorFactory,
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl DetectorHandle {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn LandmarkDetector>, BoxError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            slot: Mutex::new(Slot {
                state: SlotState::Empty,
                attempts: 0,
            }),
            ready: Condvar::new(),
        }
    }

    pub fn acquire(&self) -> Result<SharedDetector, DetectorInitError> {
        let mut slot = self.lock()?;
        let mut awaited = None;
        loop {
            let in_progress = match &slot.state {
                SlotState::Ready(detector) => return Ok(detector.clone()),
                SlotState::Initializing { attempt } => Some(*attempt),
                SlotState::Failed { attempt, message } if awaited == Some(*attempt) => {
                    return Err(DetectorInitError::Failed(message.clone()));
                }
                SlotState::Empty | SlotState::Failed { .. } => None,
            };
            let Some(attempt) = in_progress else {
                break;
            };
            awaited = Some(attempt);
            slot = self
                .ready
                .wait(slot)
                .map_err(|_| DetectorInitError::Poisoned)?;
        }

        slot.attempts += 1;
        let attempt = slot.attempts;
        slot.state = SlotState::Initializing { attempt };
        drop(slot);

        log::debug!("Initializing landmark detector (attempt {attempt})");
        let mut pending = PendingInit {
            handle: self,
            attempt,
            armed: true,
        };
        let built = (self.factory)();
        pending.armed = false;

        let mut slot = self.lock()?;
        let outcome = match built {
            Ok(detector) => {
                let shared: SharedDetector = Arc::new(Mutex::new(detector));
                slot.state = SlotState::Ready(shared.clone());
                log::info!("Landmark detector ready");
                Ok(shared)
            }
            Err(e) => {
                let message = e.to_string();
                log::warn!("Landmark detector initialization failed: {message}");
                slot.state = SlotState::Failed {
                    attempt,
                    message: message.clone(),
                };
                Err(DetectorInitError::Failed(message))
            }
        };
        self.ready.notify_all();
        outcome
    }

    /// Closes and drops the detector if one is live. Returns whether anything
    /// was released; calling it again, or before any acquire, is a no-op.
    ///
    /// An initialization already in progress is waited for, so the detector
    /// it produces is released as well.
    pub fn release(&self) -> bool {
        let Ok(mut slot) = self.slot.lock() else {
            return false;
        };
        while matches!(slot.state, SlotState::Initializing { .. }) {
            slot = match self.ready.wait(slot) {
                Ok(slot) => slot,
                Err(_) => return false,
            };
        }
        let detector = match std::mem::replace(&mut slot.state, SlotState::Empty) {
            SlotState::Ready(detector) => Some(detector),
            other => {
                slot.state = other;
                None
            }
        };
        drop(slot);

        let Some(detector) = detector else {
            return false;
        };
        if let Ok(mut inner) = detector.lock() {
            inner.close();
        }
        log::info!("Landmark detector released");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| matches!(slot.state, SlotState::Ready(_)))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slot>, DetectorInitError> {
        self.slot.lock().map_err(|_| DetectorInitError::Poisoned)
    }
}

/// Marks an attempt as failed and wakes its waiters if the factory unwinds.
struct PendingInit<'a> {
    handle: &'a DetectorHandle,
    attempt: u64,
    armed: bool,
}

impl Drop for PendingInit<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self
            .handle
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(slot.state, SlotState::Initializing { attempt } if attempt == self.attempt) {
            log::error!("Landmark detector factory panicked");
            slot.state = SlotState::Failed {
                attempt: self.attempt,
                message: "factory panicked".to_string(),
            };
        }
        self.handle.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::landmark_detector::Detection;
    use crate::shared::frame::Frame;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    struct StubDetector {
        closed: Arc<AtomicUsize>,
    }

    impl LandmarkDetector for StubDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Detection, BoxError> {
            Ok(Detection::default())
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_handle(delay: Duration) -> (Arc<DetectorHandle>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let builds_clone = builds.clone();
        let closed_clone = closed.clone();
        let handle = DetectorHandle::new(move || {
            builds_clone.fetch_add(1, Ordering::SeqCst);
            thread::sleep(delay);
            Ok(Box::new(StubDetector {
                closed: closed_clone.clone(),
            }) as Box<dyn LandmarkDetector>)
        });
        (Arc::new(handle), builds, closed)
    }

    #[test]
    fn test_lazy_until_first_acquire() {
        let (handle, builds, _) = counting_handle(Duration::ZERO);
        assert!(!handle.is_initialized());
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        handle.acquire().unwrap();
        assert!(handle.is_initialized());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeated_acquire_reuses_instance() {
        let (handle, builds, _) = counting_handle(Duration::ZERO);
        let a = handle.acquire().unwrap();
        let b = handle.acquire().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let (handle, builds, _) = counting_handle(Duration::from_millis(50));
        let barrier = Arc::new(Barrier::new(4));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    handle.acquire().unwrap()
                })
            })
            .collect();

        let detectors: Vec<SharedDetector> =
            workers.into_iter().map(|w| w.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        for d in &detectors[1..] {
            assert!(Arc::ptr_eq(&detectors[0], d));
        }
    }

    #[test]
    fn test_failed_init_is_reported_and_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let handle = DetectorHandle::new(move || {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("model file missing".into());
            }
            Ok(Box::new(StubDetector {
                closed: Arc::new(AtomicUsize::new(0)),
            }) as Box<dyn LandmarkDetector>)
        });

        let first = handle.acquire();
        assert_eq!(
            first.err(),
            Some(DetectorInitError::Failed("model file missing".into()))
        );
        assert!(!handle.is_initialized());

        assert!(handle.acquire().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_release_closes_once_and_is_idempotent() {
        let (handle, _, closed) = counting_handle(Duration::ZERO);
        handle.acquire().unwrap();

        assert!(handle.release());
        assert!(!handle.release());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(!handle.is_initialized());
    }

    #[test]
    fn test_release_before_acquire_is_noop() {
        let (handle, builds, closed) = counting_handle(Duration::ZERO);
        assert!(!handle.release());
        assert_eq!(builds.load(Ordering::SeqCst), 0);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_factory_does_not_wedge_later_acquires() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let handle = Arc::new(DetectorHandle::new(move || {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("inference runtime aborted");
            }
            Ok(Box::new(StubDetector {
                closed: Arc::new(AtomicUsize::new(0)),
            }) as Box<dyn LandmarkDetector>)
        }));

        let first = {
            let handle = handle.clone();
            thread::spawn(move || handle.acquire().is_ok())
        };
        assert!(first.join().is_err());
        assert!(!handle.is_initialized());

        let (tx, rx) = crossbeam_channel::bounded(1);
        {
            let handle = handle.clone();
            thread::spawn(move || {
                let _ = tx.send(handle.acquire().is_ok());
            });
        }
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(true));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_release_during_init_releases_built_detector() {
        let (handle, builds, closed) = counting_handle(Duration::from_millis(200));

        let acquirer = {
            let handle = handle.clone();
            thread::spawn(move || handle.acquire().is_ok())
        };
        while builds.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        assert!(handle.release());
        assert!(acquirer.join().unwrap());
        assert!(!handle.is_initialized());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_after_panicked_init_returns() {
        let handle = Arc::new(DetectorHandle::new(|| {
            thread::sleep(Duration::from_millis(100));
            panic!("inference runtime aborted");
        }));

        let acquirer = {
            let handle = handle.clone();
            thread::spawn(move || handle.acquire().is_ok())
        };
        thread::sleep(Duration::from_millis(20));

        assert!(!handle.release());
        assert!(acquirer.join().is_err());
    }

    #[test]
    fn test_acquire_after_release_rebuilds() {
        let (handle, builds, _) = counting_handle(Duration::ZERO);
        handle.acquire().unwrap();
        handle.release();
        handle.acquire().unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }
}
