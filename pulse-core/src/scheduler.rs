//! Per-channel pulse deadline tracking.
//!
//! A [`PulseScheduler`] owns the absolute deadline of the next pulse for one
//! channel. Each [`poll`](PulseScheduler::poll) fires at most one pulse, then
//! advances the deadline by the interval implied by the current target power.
//! When the caller has fallen more than a full interval behind, the deadline is
//! re-anchored to `now` instead of replaying the missed pulses back-to-back.

use core::time::Duration;

use crate::time::PulseInstant;

/// Energy represented by one pulse: 1 Wh expressed in joules.
pub const JOULES_PER_PULSE: f64 = 3_600.0;

/// Shortest interval the scheduler will advance by.
pub const MIN_PULSE_INTERVAL: Duration = Duration::from_nanos(1);

/// Longest interval the scheduler will advance by (one day).
pub const MAX_PULSE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Seconds between pulses for `target_watts`.
///
/// Callers must pass a finite, strictly positive target.
#[must_use]
pub fn interval_seconds(target_watts: f64) -> f64 {
    JOULES_PER_PULSE / target_watts
}

/// Milliseconds between pulses for `target_watts`.
#[must_use]
pub fn interval_millis(target_watts: f64) -> f64 {
    (JOULES_PER_PULSE * 1_000.0) / target_watts
}

/// Interval between pulses as a [`Duration`], rounded to the nearest
/// nanosecond and clamped to [`MIN_PULSE_INTERVAL`]..=[`MAX_PULSE_INTERVAL`].
#[must_use]
pub fn pulse_interval(target_watts: f64) -> Duration {
    let nanos = interval_seconds(target_watts) * NANOS_PER_SECOND;
    let max_nanos = MAX_PULSE_INTERVAL.as_secs_f64() * NANOS_PER_SECOND;

    if nanos.is_nan() || nanos >= max_nanos {
        return MAX_PULSE_INTERVAL;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = (nanos + 0.5) as u64;
    Duration::from_nanos(rounded).max(MIN_PULSE_INTERVAL)
}

/// Result of polling a scheduler.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// The next deadline lies in the future.
    NotDue,
    /// A pulse fired on this poll.
    Fired(FiredPulse),
}

impl PollOutcome {
    /// Returns `true` when a pulse fired.
    #[must_use]
    pub const fn fired(&self) -> bool {
        matches!(self, PollOutcome::Fired(_))
    }
}

/// Details of a pulse emitted by [`PulseScheduler::poll`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FiredPulse {
    /// One-based pulse number within the current run.
    pub number: u64,
    /// How far past its deadline the pulse was observed.
    pub lateness: Duration,
    /// Interval used to advance the deadline.
    pub interval: Duration,
    /// `true` when the deadline was re-anchored to `now` after starvation.
    pub resnapped: bool,
}

/// Deadline bookkeeping for a single channel.
#[derive(Copy, Clone, Debug)]
pub struct PulseScheduler<I> {
    next_deadline: I,
    pulses_fired: u64,
}

impl<I> PulseScheduler<I>
where
    I: PulseInstant,
{
    /// Creates a scheduler whose first pulse is due at `now`.
    #[must_use]
    pub const fn new(now: I) -> Self {
        Self {
            next_deadline: now,
            pulses_fired: 0,
        }
    }

    /// Re-arms the scheduler for a new run starting at `now`.
    pub fn reset(&mut self, now: I) {
        self.next_deadline = now;
        self.pulses_fired = 0;
    }

    /// Absolute time of the next due pulse.
    #[must_use]
    pub const fn next_deadline(&self) -> I {
        self.next_deadline
    }

    /// Pulses fired since the last reset.
    #[must_use]
    pub const fn pulses_fired(&self) -> u64 {
        self.pulses_fired
    }

    /// Fires a pulse when `now` has reached the deadline and schedules the next
    /// one using the interval for `target_watts`.
    ///
    /// A clock reading earlier than the deadline (including one that moved
    /// backward) is simply "not due".
    pub fn poll(&mut self, now: I, target_watts: f64) -> PollOutcome {
        if now < self.next_deadline {
            return PollOutcome::NotDue;
        }

        let lateness = now.saturating_duration_since(self.next_deadline);
        let interval = pulse_interval(target_watts);
        self.pulses_fired += 1;

        let resnapped = match self.next_deadline.checked_add(interval) {
            Some(advanced) => {
                self.next_deadline = advanced;
                let caught_up = advanced
                    .checked_add(interval)
                    .is_none_or(|horizon| now <= horizon);
                if caught_up {
                    false
                } else {
                    self.resnap(now, interval);
                    true
                }
            }
            None => {
                self.resnap(now, interval);
                true
            }
        };

        PollOutcome::Fired(FiredPulse {
            number: self.pulses_fired,
            lateness,
            interval,
            resnapped,
        })
    }

    fn resnap(&mut self, now: I, interval: Duration) {
        // `now` is at or past the old deadline, so this still moves forward.
        if let Some(next) = now.checked_add(interval) {
            self.next_deadline = next;
        }
    }
}
