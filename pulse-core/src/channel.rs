//! Channel identities and the live settings shared with the front-end.
//!
//! [`PulseSettings`] holds one atomic cell per scalar so the front-end can
//! replace a value at any moment while the timing thread keeps reading.
//! Each cell only ever contains a validated value: rejected edits leave the
//! previous one in place.

use core::fmt;
use core::ops::RangeInclusive;

use portable_atomic::{AtomicF64, AtomicU16, Ordering};

/// Number of simulated meters.
pub const CHANNEL_COUNT: usize = 2;

/// Default target for channel 1, in watts.
pub const DEFAULT_TARGET_1_WATTS: f64 = 2_000.0;

/// Default target for channel 2, in watts.
pub const DEFAULT_TARGET_2_WATTS: f64 = 5_000.0;

/// Default flash duration in milliseconds.
pub const DEFAULT_PULSE_WIDTH_MS: u16 = 10;

/// Accepted flash durations in milliseconds.
pub const PULSE_WIDTH_RANGE_MS: RangeInclusive<u16> = 1..=1_000;

/// Identifies one of the two pulse channels.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChannelId {
    One,
    Two,
}

impl ChannelId {
    /// Both channels in evaluation order.
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [ChannelId::One, ChannelId::Two];

    /// Zero-based slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            ChannelId::One => 0,
            ChannelId::Two => 1,
        }
    }

    /// One-based number shown to operators.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            ChannelId::One => 1,
            ChannelId::Two => 2,
        }
    }

    /// Looks up a channel by its one-based number.
    #[must_use]
    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(ChannelId::One),
            2 => Some(ChannelId::Two),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ChannelId::One => "Target 1",
            ChannelId::Two => "Target 2",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rejected operator input. The stored setting is left untouched.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InputError {
    /// Target power was not a finite number greater than zero.
    InvalidTarget,
    /// Pulse width was not an integer within [`PULSE_WIDTH_RANGE_MS`].
    InvalidPulseWidth,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::InvalidTarget => f.write_str("target power must be a number above 0 W"),
            InputError::InvalidPulseWidth => {
                let (start, end) = (PULSE_WIDTH_RANGE_MS.start(), PULSE_WIDTH_RANGE_MS.end());
                write!(f, "pulse width must be an integer between {start} and {end} ms")
            }
        }
    }
}

/// Checks a target power value.
pub fn validate_target(watts: f64) -> Result<f64, InputError> {
    if watts.is_finite() && watts > 0.0 {
        Ok(watts)
    } else {
        Err(InputError::InvalidTarget)
    }
}

/// Checks a pulse width value.
pub fn validate_pulse_width(width_ms: i64) -> Result<u16, InputError> {
    u16::try_from(width_ms)
        .ok()
        .filter(|width| PULSE_WIDTH_RANGE_MS.contains(width))
        .ok_or(InputError::InvalidPulseWidth)
}

/// Live parameters written by the front-end and read by the timing loop.
#[derive(Debug)]
pub struct PulseSettings {
    targets: [AtomicF64; CHANNEL_COUNT],
    pulse_width_ms: AtomicU16,
}

impl PulseSettings {
    /// Creates settings from already-validated values.
    ///
    /// Returns the first validation error when any value is out of range.
    pub fn new(targets: [f64; CHANNEL_COUNT], pulse_width_ms: u16) -> Result<Self, InputError> {
        let [first, second] = targets;
        Ok(Self {
            targets: [
                AtomicF64::new(validate_target(first)?),
                AtomicF64::new(validate_target(second)?),
            ],
            pulse_width_ms: AtomicU16::new(validate_pulse_width(i64::from(pulse_width_ms))?),
        })
    }

    /// Current target for `channel`, in watts.
    #[must_use]
    pub fn target(&self, channel: ChannelId) -> f64 {
        self.targets[channel.index()].load(Ordering::Relaxed)
    }

    /// Replaces the target for `channel` when `watts` is valid.
    pub fn set_target(&self, channel: ChannelId, watts: f64) -> Result<f64, InputError> {
        let watts = validate_target(watts)?;
        self.targets[channel.index()].store(watts, Ordering::Relaxed);
        Ok(watts)
    }

    /// Current flash duration shared by both channels.
    #[must_use]
    pub fn pulse_width_ms(&self) -> u16 {
        self.pulse_width_ms.load(Ordering::Relaxed)
    }

    /// Replaces the flash duration when `width_ms` is within range.
    pub fn set_pulse_width(&self, width_ms: i64) -> Result<u16, InputError> {
        let width = validate_pulse_width(width_ms)?;
        self.pulse_width_ms.store(width, Ordering::Relaxed);
        Ok(width)
    }
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            targets: [
                AtomicF64::new(DEFAULT_TARGET_1_WATTS),
                AtomicF64::new(DEFAULT_TARGET_2_WATTS),
            ],
            pulse_width_ms: AtomicU16::new(DEFAULT_PULSE_WIDTH_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_factory_targets() {
        let settings = PulseSettings::default();

        assert!((settings.target(ChannelId::One) - 2_000.0).abs() < f64::EPSILON);
        assert!((settings.target(ChannelId::Two) - 5_000.0).abs() < f64::EPSILON);
        assert_eq!(settings.pulse_width_ms(), 10);
    }

    #[test]
    fn invalid_targets_keep_previous_value() {
        let settings = PulseSettings::default();
        settings
            .set_target(ChannelId::One, 1_500.0)
            .expect("valid target");

        for bad in [-10.0, 0.0, f64::NAN, f64::INFINITY] {
            assert_eq!(
                settings.set_target(ChannelId::One, bad),
                Err(InputError::InvalidTarget)
            );
        }

        assert!((settings.target(ChannelId::One) - 1_500.0).abs() < f64::EPSILON);
        assert!((settings.target(ChannelId::Two) - 5_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pulse_width_range_is_inclusive() {
        let settings = PulseSettings::default();

        assert_eq!(settings.set_pulse_width(1), Ok(1));
        assert_eq!(settings.set_pulse_width(1_000), Ok(1_000));
        assert_eq!(
            settings.set_pulse_width(0),
            Err(InputError::InvalidPulseWidth)
        );
        assert_eq!(
            settings.set_pulse_width(1_001),
            Err(InputError::InvalidPulseWidth)
        );
        assert_eq!(
            settings.set_pulse_width(-5),
            Err(InputError::InvalidPulseWidth)
        );
        assert_eq!(settings.pulse_width_ms(), 1_000);
    }

    #[test]
    fn constructor_rejects_invalid_values() {
        assert_eq!(
            PulseSettings::new([2_000.0, -1.0], 10).err(),
            Some(InputError::InvalidTarget)
        );
        assert_eq!(
            PulseSettings::new([2_000.0, 1.0], 0).err(),
            Some(InputError::InvalidPulseWidth)
        );
        assert!(PulseSettings::new([0.5, 9_000.0], 250).is_ok());
    }

    #[test]
    fn channel_numbers_round_trip() {
        for channel in ChannelId::ALL {
            assert_eq!(ChannelId::from_number(channel.number()), Some(channel));
        }
        assert_eq!(ChannelId::from_number(3), None);
    }
}
