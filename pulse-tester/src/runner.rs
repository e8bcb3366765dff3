//! Timing thread lifecycle.
//!
//! [`PulseRunner`] owns at most one `pulse-timing` thread. The thread drives a
//! [`SimulationLoop`] against `Instant::now()` and pushes notifications into a
//! bounded crossbeam queue that the front-end drains on its own thread.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use pulse_core::channel::{CHANNEL_COUNT, ChannelId, PulseSettings};
use pulse_core::notify::{ChannelStatus, DispatchError, Notification, NotificationSink};
use pulse_core::simulation::SimulationLoop;

pub const TIMING_THREAD_NAME: &str = "pulse-timing";

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RunnerConfig {
    pub tick: Duration,
    pub join_timeout: Duration,
    pub queue_depth: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(1),
            join_timeout: Duration::from_secs(1),
            queue_depth: 256,
        }
    }
}

#[derive(Debug)]
pub enum RunnerError {
    /// The timing thread did not exit within the join timeout and was detached.
    ShutdownTimeout,
    /// The timing thread panicked.
    WorkerPanicked,
    /// The OS refused to spawn the timing thread.
    Spawn(io::Error),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::ShutdownTimeout => f.write_str("timing thread did not stop in time"),
            RunnerError::WorkerPanicked => f.write_str("timing thread panicked"),
            RunnerError::Spawn(err) => write!(f, "failed to spawn timing thread: {err}"),
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

/// Totals reported by a timing thread when its run ends.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    pub pulses: [u64; CHANNEL_COUNT],
    pub dropped_notifications: u64,
}

/// [`NotificationSink`] backed by a bounded crossbeam queue.
///
/// A sink built with [`QueueSink::detachable`] reports `Disconnected` once its
/// flag is set, so a detached timing thread can no longer reach the queue.
#[derive(Clone)]
pub struct QueueSink {
    sender: Sender<Notification>,
    detached: Option<Arc<AtomicBool>>,
}

impl QueueSink {
    pub fn new(sender: Sender<Notification>) -> Self {
        Self {
            sender,
            detached: None,
        }
    }

    pub fn detachable(sender: Sender<Notification>, detached: Arc<AtomicBool>) -> Self {
        Self {
            sender,
            detached: Some(detached),
        }
    }

    fn is_detached(&self) -> bool {
        self.detached
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }
}

impl NotificationSink for QueueSink {
    type Error = ();

    fn try_dispatch(&mut self, notification: Notification) -> Result<(), DispatchError<()>> {
        if self.is_detached() {
            return Err(DispatchError::Disconnected);
        }
        self.sender.try_send(notification).map_err(|err| match err {
            TrySendError::Full(_) => DispatchError::QueueFull,
            TrySendError::Disconnected(_) => DispatchError::Disconnected,
        })
    }
}

struct Worker {
    running: Arc<AtomicBool>,
    detached: Arc<AtomicBool>,
    handle: JoinHandle<RunSummary>,
}

/// Starts and stops the timing thread on behalf of the front-end.
pub struct PulseRunner {
    settings: Arc<PulseSettings>,
    config: RunnerConfig,
    sender: Sender<Notification>,
    receiver: Receiver<Notification>,
    worker: Option<Worker>,
}

impl PulseRunner {
    pub fn new(settings: Arc<PulseSettings>, config: RunnerConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_depth.max(1));
        Self {
            settings,
            config,
            sender,
            receiver,
            worker: None,
        }
    }

    pub fn settings(&self) -> &Arc<PulseSettings> {
        &self.settings
    }

    /// Queue the front-end drains. Every notification arrives here, in order.
    pub fn notifications(&self) -> &Receiver<Notification> {
        &self.receiver
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Queues a notification produced outside the timing thread, such as a
    /// status change after a target edit. Dropped when the queue is full.
    pub fn announce(&self, notification: Notification) {
        if let Err(err) = QueueSink::new(self.sender.clone()).try_dispatch(notification) {
            log::debug!("announcement dropped ({err}): {notification}");
        }
    }

    /// Spawns the timing thread. Returns `Ok(false)` when a run is already in
    /// progress.
    pub fn start(&mut self) -> Result<bool, RunnerError> {
        if self.is_running() {
            return Ok(false);
        }

        // Flags are per run; a detached thread keeps its own.
        let running = Arc::new(AtomicBool::new(true));
        let detached = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new()
            .name(TIMING_THREAD_NAME.to_string())
            .spawn({
                let running = Arc::clone(&running);
                let settings = Arc::clone(&self.settings);
                let sink = QueueSink::detachable(self.sender.clone(), Arc::clone(&detached));
                let tick = self.config.tick;
                move || run_timing_loop(&settings, sink, &running, tick)
            })
            .map_err(RunnerError::Spawn)?;

        log::info!("timing thread started (tick {}us)", self.config.tick.as_micros());
        self.worker = Some(Worker {
            running,
            detached,
            handle,
        });
        Ok(true)
    }

    /// Signals the timing thread and waits up to the join timeout. Returns
    /// `Ok(false)` when nothing was running.
    pub fn stop(&mut self) -> Result<bool, RunnerError> {
        let Some(worker) = self.worker.take() else {
            return Ok(false);
        };
        worker.running.store(false, Ordering::Release);

        // `None` waits without a limit.
        let deadline = Instant::now().checked_add(self.config.join_timeout);
        while !worker.handle.is_finished() {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                log::warn!(
                    "timing thread still running after {}ms, detaching",
                    self.config.join_timeout.as_millis()
                );
                worker.detached.store(true, Ordering::Release);
                self.announce_stopped();
                return Err(RunnerError::ShutdownTimeout);
            }
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        let summary = worker.handle.join().map_err(|_| {
            log::error!("timing thread panicked");
            RunnerError::WorkerPanicked
        })?;
        log::info!(
            "timing thread stopped: {} + {} pulses, {} notifications dropped",
            summary.pulses[0],
            summary.pulses[1],
            summary.dropped_notifications
        );
        Ok(true)
    }

    /// Closing notifications on behalf of a thread that was detached before it
    /// could send its own.
    fn announce_stopped(&self) {
        for channel in ChannelId::ALL {
            self.announce(Notification::RateUpdate {
                channel,
                rate_per_minute: None,
            });
            self.announce(Notification::Status {
                channel,
                status: ChannelStatus::Stopped,
            });
        }
    }
}

impl Drop for PulseRunner {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::warn!("shutdown: {err}");
        }
    }
}

fn run_timing_loop(
    settings: &PulseSettings,
    sink: QueueSink,
    running: &AtomicBool,
    tick: Duration,
) -> RunSummary {
    let mut sim = SimulationLoop::new(settings, sink, Instant::now());
    sim.start(Instant::now());

    while running.load(Ordering::Acquire) {
        sim.tick(Instant::now());
        thread::sleep(tick);
    }

    sim.stop(Instant::now());
    RunSummary {
        pulses: ChannelId::ALL.map(|channel| sim.pulse_count(channel)),
        dropped_notifications: sim.dropped_notifications(),
    }
}
