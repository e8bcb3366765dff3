//! Instant abstraction shared by the scheduler, rate tracker, and telemetry.
//!
//! The host runner drives the core with `std::time::Instant` (behind the `std`
//! feature) while scenario tests use [`SimInstant`], a microsecond counter that
//! advances only when told to.

use core::time::Duration;

/// Monotonic timestamp consumed by the pulse timing core.
pub trait PulseInstant: Copy + Ord {
    /// Returns `self + duration`, or `None` when the instant type overflows.
    /// A non-zero `duration` must yield a strictly later instant.
    fn checked_add(self, duration: Duration) -> Option<Self>;

    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Simulated clock reading with microsecond resolution.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SimInstant(u64);

impl SimInstant {
    /// Origin of the simulated clock.
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000)
    }

    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Advances the reading, saturating at the end of the representable range.
    #[must_use]
    pub fn advanced_by(self, duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl PulseInstant for SimInstant {
    /// Partial microseconds round up, so a non-zero duration always moves the
    /// reading forward.
    fn checked_add(self, duration: Duration) -> Option<Self> {
        let whole = u64::try_from(duration.as_micros()).ok()?;
        let micros = if duration.subsec_nanos() % 1_000 == 0 {
            whole
        } else {
            whole.checked_add(1)?
        };
        self.0.checked_add(micros).map(Self)
    }

    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[cfg(feature = "std")]
impl PulseInstant for std::time::Instant {
    fn checked_add(self, duration: Duration) -> Option<Self> {
        std::time::Instant::checked_add(&self, duration)
    }

    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        std::time::Instant::saturating_duration_since(self, earlier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_instant_rounds_down_to_whole_micros() {
        let start = SimInstant::from_millis(5);
        let later = start.advanced_by(Duration::from_nanos(2_999));

        assert_eq!(later.as_micros(), 5_002);
        assert_eq!(
            later.saturating_duration_since(start),
            Duration::from_micros(2)
        );
    }

    #[test]
    fn duration_since_saturates_when_clock_runs_backward() {
        let earlier = SimInstant::from_micros(100);
        let later = SimInstant::from_micros(400);

        assert_eq!(earlier.saturating_duration_since(later), Duration::ZERO);
    }

    #[test]
    fn checked_add_reports_overflow() {
        let edge = SimInstant::from_micros(u64::MAX - 1);

        assert_eq!(
            edge.checked_add(Duration::from_micros(1)),
            Some(SimInstant::from_micros(u64::MAX))
        );
        assert_eq!(edge.checked_add(Duration::from_micros(2)), None);
        assert_eq!(edge.checked_add(Duration::from_nanos(1_001)), None);
    }

    #[test]
    fn checked_add_rounds_partial_micros_up() {
        let start = SimInstant::from_micros(10);

        assert_eq!(
            start.checked_add(Duration::from_nanos(360)),
            Some(SimInstant::from_micros(11))
        );
        assert_eq!(
            start.checked_add(Duration::from_nanos(2_001)),
            Some(SimInstant::from_micros(13))
        );
        assert_eq!(start.checked_add(Duration::ZERO), Some(start));
    }
}
