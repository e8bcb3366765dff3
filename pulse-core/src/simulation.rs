//! Dual-channel simulation loop.
//!
//! [`SimulationLoop`] is the poll body run by the timing thread. It owns one
//! [`PulseScheduler`] and one [`RateTracker`] per channel, reads the live
//! [`PulseSettings`] on every tick, and pushes [`Notification`]s into a
//! non-blocking [`NotificationSink`]. The loop itself never sleeps or reads a
//! clock; the caller passes `now` into every transition.

use core::time::Duration;

use crate::channel::{CHANNEL_COUNT, ChannelId, PulseSettings};
use crate::notify::{ChannelStatus, Notification, NotificationSink};
use crate::rate::{RATE_WARMUP, RateTracker};
use crate::scheduler::{PollOutcome, PulseScheduler};
use crate::telemetry::{PulseTelemetry, TelemetryRecorder};
use crate::time::PulseInstant;

/// Wall-clock spacing between rate notifications.
pub const RATE_REPORT_PERIOD: Duration = Duration::from_secs(1);

/// Bookkeeping for one start/stop cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RunSession<I> {
    pub started_at: I,
}

/// Lifecycle of the simulation loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoopState<I> {
    Idle,
    Running(RunSession<I>),
}

impl<I> LoopState<I> {
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, LoopState::Running(_))
    }
}

/// What happened during a single [`SimulationLoop::tick`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TickReport {
    /// Channels that fired a pulse, indexed by [`ChannelId::index`].
    pub fired: [bool; CHANNEL_COUNT],
    /// Channels whose deadline was re-anchored after starvation.
    pub resnapped: [bool; CHANNEL_COUNT],
    /// `true` when rate figures were dispatched on this tick.
    pub rates_reported: bool,
}

impl TickReport {
    /// Number of pulses fired on this tick.
    #[must_use]
    pub fn pulses(&self) -> usize {
        self.fired.iter().filter(|fired| **fired).count()
    }
}

#[derive(Copy, Clone, Debug)]
struct ChannelRuntime<I> {
    scheduler: PulseScheduler<I>,
    tracker: RateTracker<I>,
}

impl<I> ChannelRuntime<I>
where
    I: PulseInstant,
{
    const fn new(now: I) -> Self {
        Self {
            scheduler: PulseScheduler::new(now),
            tracker: RateTracker::new(now),
        }
    }

    fn reset(&mut self, now: I) {
        self.scheduler.reset(now);
        self.tracker.reset(now);
    }
}

/// Drives both channels from a shared polling cadence.
pub struct SimulationLoop<'a, I, S>
where
    I: PulseInstant,
    S: NotificationSink,
{
    settings: &'a PulseSettings,
    sink: S,
    state: LoopState<I>,
    channels: [ChannelRuntime<I>; CHANNEL_COUNT],
    next_rate_report: Option<I>,
    telemetry: TelemetryRecorder<I>,
    dropped_notifications: u64,
}

impl<'a, I, S> SimulationLoop<'a, I, S>
where
    I: PulseInstant,
    S: NotificationSink,
{
    /// Creates an idle loop. `now` seeds the per-channel bookkeeping and is
    /// replaced when a run starts.
    pub fn new(settings: &'a PulseSettings, sink: S, now: I) -> Self {
        Self {
            settings,
            sink,
            state: LoopState::Idle,
            channels: [ChannelRuntime::new(now); CHANNEL_COUNT],
            next_rate_report: None,
            telemetry: TelemetryRecorder::new(),
            dropped_notifications: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> LoopState<I> {
        self.state
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.state.is_running()
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[must_use]
    pub fn telemetry(&self) -> &TelemetryRecorder<I> {
        &self.telemetry
    }

    /// Notifications lost to a full or disconnected sink since creation.
    #[must_use]
    pub const fn dropped_notifications(&self) -> u64 {
        self.dropped_notifications
    }

    /// Pulses fired on `channel` during the current (or last) run.
    #[must_use]
    pub fn pulse_count(&self, channel: ChannelId) -> u64 {
        self.channels[channel.index()].tracker.pulse_count()
    }

    /// Deadline of the next pulse on `channel`.
    #[must_use]
    pub fn next_deadline(&self, channel: ChannelId) -> I {
        self.channels[channel.index()].scheduler.next_deadline()
    }

    /// Cumulative rate for `channel`, or `None` while idle or warming up.
    #[must_use]
    pub fn rate_per_minute(&self, channel: ChannelId, now: I) -> Option<f64> {
        if !self.is_running() {
            return None;
        }
        self.channels[channel.index()].tracker.rate_per_minute(now)
    }

    /// Begins a new run. Returns `false` (and changes nothing) when a run is
    /// already in progress.
    pub fn start(&mut self, now: I) -> bool {
        if self.is_running() {
            return false;
        }

        for runtime in &mut self.channels {
            runtime.reset(now);
        }
        self.state = LoopState::Running(RunSession { started_at: now });
        self.next_rate_report = now.checked_add(RATE_WARMUP);
        self.telemetry.clear();
        self.telemetry.record_run_started(now);

        for channel in ChannelId::ALL {
            let watts = self.settings.target(channel);
            log::info!("{channel}: pulsing at {watts}W");
            self.dispatch(
                Notification::Status {
                    channel,
                    status: ChannelStatus::Pulsing { watts },
                },
                now,
            );
        }

        true
    }

    /// Ends the current run and resets the rate and status displays. Returns
    /// `false` when the loop was already idle; nothing is dispatched then.
    pub fn stop(&mut self, now: I) -> bool {
        if !self.is_running() {
            return false;
        }

        self.state = LoopState::Idle;
        self.next_rate_report = None;
        self.telemetry.record_run_stopped(now);

        for channel in ChannelId::ALL {
            let jitter = self.telemetry.jitter(channel);
            log::info!(
                "{channel}: stopped after {} pulses (max late {}us, mean late {}us, resnaps {}, dropped {})",
                jitter.pulses,
                jitter.max_lateness.as_micros(),
                jitter.mean_lateness().unwrap_or_default().as_micros(),
                jitter.resnaps,
                jitter.dropped,
            );

            self.dispatch(
                Notification::RateUpdate {
                    channel,
                    rate_per_minute: None,
                },
                now,
            );
            self.dispatch(
                Notification::Status {
                    channel,
                    status: ChannelStatus::Stopped,
                },
                now,
            );
        }

        true
    }

    /// Runs one poll of both channels, channel 1 first.
    pub fn tick(&mut self, now: I) -> TickReport {
        let mut report = TickReport::default();
        if !self.is_running() {
            return report;
        }

        for channel in ChannelId::ALL {
            let watts = self.settings.target(channel);
            let runtime = &mut self.channels[channel.index()];

            let PollOutcome::Fired(pulse) = runtime.scheduler.poll(now, watts) else {
                continue;
            };
            runtime.tracker.record_pulse();
            report.fired[channel.index()] = true;

            self.telemetry.record_pulse(
                channel,
                PulseTelemetry {
                    number: pulse.number,
                    lateness: pulse.lateness,
                    interval: pulse.interval,
                },
                now,
            );
            if pulse.resnapped {
                report.resnapped[channel.index()] = true;
                self.telemetry.record_resnap(channel, now);
                log::debug!(
                    "{channel}: fell behind by more than {}ms, deadline resnapped",
                    pulse.interval.as_millis()
                );
            }

            let pulse_width_ms = self.settings.pulse_width_ms();
            log::trace!("{channel}: pulse #{} width={pulse_width_ms}ms", pulse.number);
            self.dispatch(
                Notification::Pulse {
                    channel,
                    pulse_width_ms,
                },
                now,
            );
        }

        report.rates_reported = self.report_rates(now);
        report
    }

    fn report_rates(&mut self, now: I) -> bool {
        let Some(due_at) = self.next_rate_report else {
            return false;
        };
        if now < due_at {
            return false;
        }

        let rates = ChannelId::ALL.map(|channel| {
            (
                channel,
                self.channels[channel.index()].tracker.rate_per_minute(now),
            )
        });
        if rates.iter().any(|(_, rate)| rate.is_none()) {
            // Still inside the warm-up window; retry on the next tick.
            return false;
        }

        for (channel, rate_per_minute) in rates {
            self.dispatch(
                Notification::RateUpdate {
                    channel,
                    rate_per_minute,
                },
                now,
            );
        }

        self.next_rate_report = match due_at.checked_add(RATE_REPORT_PERIOD) {
            Some(next) if next > now => Some(next),
            _ => now.checked_add(RATE_REPORT_PERIOD),
        };
        true
    }

    fn dispatch(&mut self, notification: Notification, now: I) {
        if let Err(error) = self.sink.try_dispatch(notification) {
            self.dropped_notifications = self.dropped_notifications.saturating_add(1);
            self.telemetry.record_dropped(notification.channel(), now);
            log::debug!("notification dropped ({error}): {notification}");
        }
    }
}
