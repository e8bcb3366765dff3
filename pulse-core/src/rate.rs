//! Cumulative pulse-rate reporting.

use core::time::Duration;

use crate::time::PulseInstant;

/// Minimum session age before a rate is reported.
pub const RATE_WARMUP: Duration = Duration::from_secs(1);

/// Counts pulses since a session start and reports the average rate.
///
/// The figure is a cumulative average rather than an instantaneous one: with
/// millisecond polling the spacing between two individual pulses is too noisy
/// to display.
#[derive(Copy, Clone, Debug)]
pub struct RateTracker<I> {
    session_start: I,
    pulse_count: u64,
}

impl<I> RateTracker<I>
where
    I: PulseInstant,
{
    #[must_use]
    pub const fn new(now: I) -> Self {
        Self {
            session_start: now,
            pulse_count: 0,
        }
    }

    /// Restarts counting from `now`.
    pub fn reset(&mut self, now: I) {
        self.session_start = now;
        self.pulse_count = 0;
    }

    pub fn record_pulse(&mut self) {
        self.pulse_count = self.pulse_count.saturating_add(1);
    }

    #[must_use]
    pub const fn pulse_count(&self) -> u64 {
        self.pulse_count
    }

    #[must_use]
    pub const fn session_start(&self) -> I {
        self.session_start
    }

    /// Pulses per minute averaged over the session, or `None` until more than
    /// [`RATE_WARMUP`] has elapsed.
    #[must_use]
    pub fn rate_per_minute(&self, now: I) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.session_start);
        if elapsed <= RATE_WARMUP {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let count = self.pulse_count as f64;
        Some(count * 60.0 / elapsed.as_secs_f64())
    }
}
