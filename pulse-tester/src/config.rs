use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use pulse_core::channel::{
    DEFAULT_PULSE_WIDTH_MS, DEFAULT_TARGET_1_WATTS, DEFAULT_TARGET_2_WATTS, InputError,
    PulseSettings, validate_pulse_width, validate_target,
};

use crate::runner::RunnerConfig;

/// One week.
const MAX_HEADLESS_SECONDS: u64 = 7 * 24 * 60 * 60;
const MAX_JOIN_TIMEOUT_MS: u64 = 60_000;

/// Command-line configuration for the tester.
#[derive(Parser, Debug, Clone)]
#[command(name = "pulse-tester")]
#[command(about = "Dual-channel power-meter pulse tester")]
#[command(version)]
pub struct TesterConfig {
    /// Initial power target of channel 1, in watts
    #[arg(long, default_value_t = DEFAULT_TARGET_1_WATTS, value_parser = parse_target_arg)]
    pub target1: f64,

    /// Initial power target of channel 2, in watts
    #[arg(long, default_value_t = DEFAULT_TARGET_2_WATTS, value_parser = parse_target_arg)]
    pub target2: f64,

    /// Indicator flash width in milliseconds (1-1000)
    #[arg(long, default_value_t = DEFAULT_PULSE_WIDTH_MS, value_parser = parse_width_arg)]
    pub width: u16,

    /// Timing loop tick in microseconds
    #[arg(long, default_value_t = 1_000, value_parser = clap::value_parser!(u64).range(1..=100_000))]
    pub tick_us: u64,

    /// How long `stop` waits for the timing thread, in milliseconds
    #[arg(long, default_value_t = 1_000, value_parser = clap::value_parser!(u64).range(..=MAX_JOIN_TIMEOUT_MS))]
    pub join_timeout_ms: u64,

    /// Capacity of the notification queue
    #[arg(long, default_value_t = 256, value_parser = clap::value_parser!(u32).range(1..))]
    pub queue_depth: u32,

    /// Run without the terminal UI for this many seconds, printing notifications
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..=MAX_HEADLESS_SECONDS))]
    pub headless: Option<u64>,

    /// Session log file
    #[arg(long, default_value = "pulse-tester.log")]
    pub log: PathBuf,

    /// Minimum level written to the session log
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl TesterConfig {
    /// Shared settings seeded from the command line.
    pub fn settings(&self) -> Result<PulseSettings, InputError> {
        PulseSettings::new([self.target1, self.target2], self.width)
    }

    pub fn runner(&self) -> RunnerConfig {
        RunnerConfig {
            tick: Duration::from_micros(self.tick_us),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
            queue_depth: usize::try_from(self.queue_depth).unwrap_or(usize::MAX),
        }
    }

    pub fn headless_duration(&self) -> Option<Duration> {
        self.headless.map(Duration::from_secs)
    }
}

fn parse_target_arg(text: &str) -> Result<f64, String> {
    text.parse::<f64>()
        .map_err(|_| InputError::InvalidTarget)
        .and_then(validate_target)
        .map_err(|error| error.to_string())
}

fn parse_width_arg(text: &str) -> Result<u16, String> {
    text.parse::<i64>()
        .map_err(|_| InputError::InvalidPulseWidth)
        .and_then(validate_pulse_width)
        .map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_bench_setup() {
        let config = TesterConfig::try_parse_from(["pulse-tester"]).unwrap();
        let settings = config.settings().unwrap();

        assert!((config.target1 - 2_000.0).abs() < f64::EPSILON);
        assert!((config.target2 - 5_000.0).abs() < f64::EPSILON);
        assert_eq!(settings.pulse_width_ms(), 10);
        assert_eq!(config.runner().tick, Duration::from_millis(1));
        assert_eq!(config.runner().join_timeout, Duration::from_secs(1));
        assert_eq!(config.runner().queue_depth, 256);
        assert_eq!(config.headless_duration(), None);
        assert_eq!(LevelFilter::from(config.log_level), LevelFilter::Info);
    }

    #[test]
    fn invalid_values_are_usage_errors() {
        for args in [
            ["pulse-tester", "--target1", "-5"],
            ["pulse-tester", "--target2", "lots"],
            ["pulse-tester", "--width", "0"],
            ["pulse-tester", "--width", "1001"],
            ["pulse-tester", "--tick-us", "0"],
            ["pulse-tester", "--headless", "0"],
            ["pulse-tester", "--headless", "18446744073709551615"],
            ["pulse-tester", "--join-timeout-ms", "18446744073709551615"],
        ] {
            let error = TesterConfig::try_parse_from(args).unwrap_err();
            assert_eq!(error.exit_code(), 2, "{args:?}");
        }
    }

    #[test]
    fn headless_and_tuning_flags_parse() {
        let config = TesterConfig::try_parse_from([
            "pulse-tester",
            "--headless",
            "5",
            "--tick-us",
            "500",
            "--queue-depth",
            "16",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(config.headless_duration(), Some(Duration::from_secs(5)));
        assert_eq!(config.runner().tick, Duration::from_micros(500));
        assert_eq!(config.runner().queue_depth, 16);
        assert_eq!(config.log_level, LogLevel::Debug);
    }
}
