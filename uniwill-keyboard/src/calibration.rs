//! Boot animation quiescence detection
//!
//! The firmware plays a lighting animation at power-on that keeps rewriting the
//! keyboard channel registers. We sample the channels periodically and only
//! program our own state once a full window of samples agree, or give up after
//! a fixed number of samples.
//!
//! [`CalibrationDetector`] is the pure state machine. [`BootCalibration`] drives
//! it from a timer thread, running each sample on the [`WorkQueue`] and
//! re-arming the timer only after that sample has been handled.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::CalibrationConfig;
use crate::error::KeyboardError;
use crate::led::{KbdBacklight, RgbColor};
use crate::work::WorkQueue;

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Sampling,
    Stabilized,
    TimedOut,
}

impl CalibrationState {
    pub fn is_terminal(self) -> bool {
        self != Self::Sampling
    }
}

/// Ring of recent channel samples plus the remaining sample budget
#[derive(Debug, Clone)]
pub struct CalibrationDetector {
    /// Packed 0xRRGGBB samples; seeds live above 24 bits so they never match
    ring: Vec<u32>,
    next: usize,
    remaining: u32,
    state: CalibrationState,
}

impl CalibrationDetector {
    pub fn new(window: usize, attempts: u32) -> Self {
        let window = window.max(2);
        Self {
            ring: (1..=window as u32).map(|i| i << 24).collect(),
            next: 0,
            remaining: attempts,
            state: if attempts == 0 {
                CalibrationState::TimedOut
            } else {
                CalibrationState::Sampling
            },
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Feed one sample; terminal states ignore further samples
    pub fn record(&mut self, sample: RgbColor) -> CalibrationState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.ring[self.next] = sample.to_u32();
        self.next = (self.next + 1) % self.ring.len();
        self.consume_attempt();
        self.state
    }

    /// Count a tick whose sample could not be read
    pub fn record_missed(&mut self) -> CalibrationState {
        if !self.state.is_terminal() {
            self.consume_attempt();
        }
        self.state
    }

    fn consume_attempt(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
        if self.ring.windows(2).all(|w| w[0] == w[1]) {
            self.state = CalibrationState::Stabilized;
        } else if self.remaining == 0 {
            self.state = CalibrationState::TimedOut;
        }
    }
}

/// How a calibration run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome {
    /// Animation ended and the steady state was applied
    Applied,
    /// Animation ended but applying the steady state failed
    ApplyFailed,
    TimedOut,
    Cancelled,
}

struct Shared {
    detector: Mutex<CalibrationDetector>,
    cancelled: Mutex<bool>,
    wake: Condvar,
    outcome: Mutex<Option<CalibrationOutcome>>,
    finished: Condvar,
}

impl Shared {
    fn finish(&self, outcome: CalibrationOutcome) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
            self.finished.notify_all();
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Sleep for `interval` unless cancelled first; true if cancelled
    fn sleep_or_cancel(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut cancelled = self.cancelled.lock();
        while !*cancelled {
            if self.wake.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }

    /// One sample: read, decide, apply. None once cancelled.
    fn tick(&self, backlight: &KbdBacklight) -> Option<CalibrationState> {
        if self.is_cancelled() {
            return None;
        }

        let mut detector = self.detector.lock();
        let state = match backlight.read_rgb() {
            Ok(sample) => {
                debug!(
                    "calibration sample {} ({} left)",
                    sample,
                    detector.remaining().saturating_sub(1)
                );
                detector.record(sample)
            }
            Err(e) => {
                debug!("calibration sample failed: {}", e);
                detector.record_missed()
            }
        };
        drop(detector);

        match state {
            CalibrationState::Sampling => {}
            CalibrationState::Stabilized => {
                debug!("boot animation finished, applying backlight state");
                match backlight.init_set(true) {
                    Ok(()) => self.finish(CalibrationOutcome::Applied),
                    Err(e) => {
                        warn!("kbd init after boot animation failed: {}", e);
                        self.finish(CalibrationOutcome::ApplyFailed);
                    }
                }
            }
            CalibrationState::TimedOut => {
                info!("kbd init timeout, failed to detect end of boot animation");
                self.finish(CalibrationOutcome::TimedOut);
            }
        }
        Some(state)
    }
}

/// A running boot calibration
pub struct BootCalibration {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl BootCalibration {
    /// Arm the sampling timer
    pub fn start(
        backlight: Arc<KbdBacklight>,
        queue: Arc<WorkQueue>,
        config: &CalibrationConfig,
    ) -> Result<Self, KeyboardError> {
        let shared = Arc::new(Shared {
            detector: Mutex::new(CalibrationDetector::new(config.window, config.attempts)),
            cancelled: Mutex::new(false),
            wake: Condvar::new(),
            outcome: Mutex::new(None),
            finished: Condvar::new(),
        });
        let interval = config.interval();

        let timer_shared = Arc::clone(&shared);
        let timer = std::thread::Builder::new()
            .name("kbd-bl-calibration".into())
            .spawn(move || run_timer(timer_shared, backlight, queue, interval))
            .map_err(|e| KeyboardError::Worker(format!("spawn calibration timer: {}", e)))?;

        Ok(Self {
            shared,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// Outcome, if calibration has ended
    pub fn outcome(&self) -> Option<CalibrationOutcome> {
        *self.shared.outcome.lock()
    }

    /// Current detector state
    pub fn state(&self) -> CalibrationState {
        self.shared.detector.lock().state()
    }

    /// Block until calibration ends or `timeout` passes
    pub fn wait(&self, timeout: Duration) -> Option<CalibrationOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.shared.outcome.lock();
        while outcome.is_none() {
            if self
                .shared
                .finished
                .wait_until(&mut outcome, deadline)
                .timed_out()
            {
                break;
            }
        }
        *outcome
    }

    /// Stop sampling; no further sample is taken or applied after this returns
    pub fn cancel(&self) {
        *self.shared.cancelled.lock() = true;
        self.shared.wake.notify_all();
        if let Some(timer) = self.timer.lock().take() {
            if timer.thread().id() != std::thread::current().id() {
                let _ = timer.join();
            }
        }
        self.shared.finish(CalibrationOutcome::Cancelled);
    }
}

impl Drop for BootCalibration {
    fn drop(&mut self) {
        // signal only; joining here could wait on a tick queued behind the dropping job
        *self.shared.cancelled.lock() = true;
        self.shared.wake.notify_all();
    }
}

fn run_timer(
    shared: Arc<Shared>,
    backlight: Arc<KbdBacklight>,
    queue: Arc<WorkQueue>,
    interval: Duration,
) {
    if shared.detector.lock().state().is_terminal() {
        shared.finish(CalibrationOutcome::TimedOut);
        return;
    }

    loop {
        if shared.sleep_or_cancel(interval) {
            return;
        }

        let (done_tx, done_rx) = oneshot::channel();
        let tick_shared = Arc::clone(&shared);
        let tick_backlight = Arc::clone(&backlight);
        let queued = queue.schedule(move || {
            let _ = done_tx.send(tick_shared.tick(&tick_backlight));
        });
        if !queued {
            return;
        }

        // A dropped job closes the channel, which also ends the timer
        match done_rx.blocking_recv() {
            Ok(Some(CalibrationState::Sampling)) => {}
            _ => return,
        }
    }
}
