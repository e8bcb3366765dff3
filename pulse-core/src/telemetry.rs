//! Pulse telemetry ring and jitter bookkeeping.
//!
//! The simulation loop records every run transition, fired pulse, deadline
//! resnap, and dropped notification into a fixed-size ring so the host can
//! report how closely the realized cadence followed the schedule. Starvation
//! is never an error; this ring is where it becomes visible.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::channel::{CHANNEL_COUNT, ChannelId};
use crate::time::PulseInstant;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Identifier assigned to each telemetry record.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    RunStarted,
    RunStopped,
    PulseFired(ChannelId),
    DeadlineResnapped(ChannelId),
    NotificationDropped(ChannelId),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::RunStarted => f.write_str("run-started"),
            TelemetryEventKind::RunStopped => f.write_str("run-stopped"),
            TelemetryEventKind::PulseFired(channel) => write!(f, "pulse {}", channel.number()),
            TelemetryEventKind::DeadlineResnapped(channel) => {
                write!(f, "resnap {}", channel.number())
            }
            TelemetryEventKind::NotificationDropped(channel) => {
                write!(f, "dropped {}", channel.number())
            }
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    Pulse(PulseTelemetry),
}

/// Timing details of a fired pulse.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PulseTelemetry {
    pub number: u64,
    pub lateness: Duration,
    pub interval: Duration,
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<I>
where
    I: Copy,
{
    pub id: EventId,
    pub timestamp: I,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Aggregate lateness figures for one channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct JitterSummary {
    pub pulses: u64,
    pub resnaps: u64,
    pub dropped: u64,
    pub max_lateness: Duration,
    total_lateness: Duration,
}

impl JitterSummary {
    /// Mean lateness over all observed pulses.
    #[must_use]
    pub fn mean_lateness(&self) -> Option<Duration> {
        if self.pulses == 0 {
            return None;
        }
        let pulses = u32::try_from(self.pulses).unwrap_or(u32::MAX);
        Some(self.total_lateness / pulses)
    }

    fn observe(&mut self, lateness: Duration) {
        self.pulses += 1;
        self.max_lateness = self.max_lateness.max(lateness);
        self.total_lateness = self.total_lateness.saturating_add(lateness);
    }
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<I, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    I: Copy,
{
    ring: HistoryBuf<TelemetryRecord<I>, CAPACITY>,
    jitter: [JitterSummary; CHANNEL_COUNT],
    next_event_id: EventId,
}

impl<I, const CAPACITY: usize> TelemetryRecorder<I, CAPACITY>
where
    I: PulseInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            jitter: [JitterSummary {
                pulses: 0,
                resnaps: 0,
                dropped: 0,
                max_lateness: Duration::ZERO,
                total_lateness: Duration::ZERO,
            }; CHANNEL_COUNT],
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    #[must_use]
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<I>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord<I>> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Lateness summary for `channel` since the last clear.
    #[must_use]
    pub fn jitter(&self, channel: ChannelId) -> JitterSummary {
        self.jitter[channel.index()]
    }

    /// Drops every record and summary; event ids keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.jitter = [JitterSummary::default(); CHANNEL_COUNT];
    }

    pub fn record_run_started(&mut self, timestamp: I) -> EventId {
        self.record(TelemetryEventKind::RunStarted, TelemetryPayload::None, timestamp)
    }

    pub fn record_run_stopped(&mut self, timestamp: I) -> EventId {
        self.record(TelemetryEventKind::RunStopped, TelemetryPayload::None, timestamp)
    }

    /// Records a fired pulse and folds its lateness into the channel summary.
    pub fn record_pulse(
        &mut self,
        channel: ChannelId,
        pulse: PulseTelemetry,
        timestamp: I,
    ) -> EventId {
        self.jitter[channel.index()].observe(pulse.lateness);
        self.record(
            TelemetryEventKind::PulseFired(channel),
            TelemetryPayload::Pulse(pulse),
            timestamp,
        )
    }

    pub fn record_resnap(&mut self, channel: ChannelId, timestamp: I) -> EventId {
        self.jitter[channel.index()].resnaps += 1;
        self.record(
            TelemetryEventKind::DeadlineResnapped(channel),
            TelemetryPayload::None,
            timestamp,
        )
    }

    pub fn record_dropped(&mut self, channel: ChannelId, timestamp: I) -> EventId {
        self.jitter[channel.index()].dropped += 1;
        self.record(
            TelemetryEventKind::NotificationDropped(channel),
            TelemetryPayload::None,
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: I,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<I, const CAPACITY: usize> Default for TelemetryRecorder<I, CAPACITY>
where
    I: PulseInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
