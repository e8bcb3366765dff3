use std::sync::Arc;

use crossbeam_channel::Receiver;
use pulse_core::channel::{ChannelId, PulseSettings};
use pulse_core::command::{
    Command, HELP_TOPICS, parse_command, parse_pulse_width, parse_watts,
};
use pulse_core::notify::{ChannelStatus, Notification};

use crate::runner::{PulseRunner, RunnerError};

/// Result of handling one operator line.
#[derive(Debug, PartialEq)]
pub enum Reply {
    Lines(Vec<String>),
    Quit(Vec<String>),
}

impl Reply {
    pub fn lines(&self) -> &[String] {
        match self {
            Reply::Lines(lines) | Reply::Quit(lines) => lines,
        }
    }
}

/// Operator-facing command handling on top of a [`PulseRunner`].
pub struct Session {
    runner: PulseRunner,
}

impl Session {
    pub fn new(runner: PulseRunner) -> Self {
        Self { runner }
    }

    pub fn settings(&self) -> &Arc<PulseSettings> {
        self.runner.settings()
    }

    pub fn notifications(&self) -> &Receiver<Notification> {
        self.runner.notifications()
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    pub fn handle_command(&mut self, line: &str) -> Reply {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Reply::Lines(Vec::new());
        }
        log::debug!("operator> {trimmed}");

        let command = match parse_command(trimmed) {
            Ok(command) => command,
            Err(err) => return Reply::Lines(vec![format!("ERR {err}")]),
        };

        match command {
            Command::SetTarget { channel, watts } => Reply::Lines(self.set_target(channel, watts)),
            Command::SetPulseWidth { width_ms } => Reply::Lines(self.set_pulse_width(width_ms)),
            Command::Start => Reply::Lines(self.start()),
            Command::Stop => Reply::Lines(self.stop()),
            Command::Status => Reply::Lines(self.status()),
            Command::Help => Reply::Lines(help_lines()),
            Command::Quit => {
                let mut lines = self.stop();
                lines.push("Session closed.".to_string());
                Reply::Quit(lines)
            }
        }
    }

    /// Starts a run.
    pub fn start(&mut self) -> Vec<String> {
        match self.runner.start() {
            Ok(true) => vec!["OK pulsing".to_string()],
            Ok(false) => vec!["OK already pulsing".to_string()],
            Err(err) => {
                log::error!("{err}");
                vec![format!("ERR {err}")]
            }
        }
    }

    /// Stops the current run, if any.
    pub fn stop(&mut self) -> Vec<String> {
        match self.runner.stop() {
            Ok(true) => vec!["OK stopped".to_string()],
            Ok(false) => Vec::new(),
            Err(err @ RunnerError::ShutdownTimeout) => vec![format!("WARN {err}")],
            Err(err) => vec![format!("ERR {err}")],
        }
    }

    fn set_target(&self, channel: ChannelId, text: &str) -> Vec<String> {
        let settings = self.runner.settings();
        match parse_watts(text).and_then(|watts| settings.set_target(channel, watts)) {
            Ok(watts) => {
                log::info!("{channel} target set to {watts}W");
                self.runner.announce(Notification::Status {
                    channel,
                    status: ChannelStatus::Target { watts },
                });
                vec![format!("OK {channel} = {watts}W")]
            }
            Err(err) => {
                let kept = settings.target(channel);
                log::warn!("{channel}: rejected `{text}`: {err}");
                vec![format!("ERR {err} (keeping {kept}W)")]
            }
        }
    }

    fn set_pulse_width(&self, text: &str) -> Vec<String> {
        let settings = self.runner.settings();
        match parse_pulse_width(text).and_then(|width| settings.set_pulse_width(i64::from(width))) {
            Ok(width) => {
                log::info!("pulse width set to {width}ms");
                vec![format!("OK width = {width}ms")]
            }
            Err(err) => {
                let kept = settings.pulse_width_ms();
                log::warn!("rejected pulse width `{text}`: {err}");
                vec![format!("ERR {err} (keeping {kept}ms)")]
            }
        }
    }

    fn status(&self) -> Vec<String> {
        let settings = self.runner.settings();
        let mut lines: Vec<String> = ChannelId::ALL
            .iter()
            .map(|channel| format!("{channel}: {}W", settings.target(*channel)))
            .collect();
        lines.push(format!("Pulse width: {}ms", settings.pulse_width_ms()));
        lines.push(format!(
            "State: {}",
            if self.is_running() { "pulsing" } else { "idle" }
        ));
        lines
    }
}

fn help_lines() -> Vec<String> {
    let mut lines = vec!["Available commands:".to_string()];
    lines.extend(HELP_TOPICS.iter().map(|(_, detail)| format!("  {detail}")));
    lines
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use log::{LevelFilter, Log, Metadata, Record};

    use super::*;
    use crate::runner::RunnerConfig;

    struct CapturingLogger(Mutex<Vec<String>>);

    impl Log for CapturingLogger {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            if let Ok(mut lines) = self.0.lock() {
                lines.push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    static CAPTURED: CapturingLogger = CapturingLogger(Mutex::new(Vec::new()));

    fn captured_lines_containing(needle: &str) -> usize {
        CAPTURED
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    fn session() -> Session {
        Session::new(PulseRunner::new(
            Arc::new(PulseSettings::default()),
            RunnerConfig::default(),
        ))
    }

    #[test]
    fn target_edit_is_applied_and_announced() {
        let mut session = session();

        let reply = session.handle_command("target 1 4500");
        assert_eq!(reply.lines(), ["OK Target 1 = 4500W".to_string()]);
        assert!((session.settings().target(ChannelId::One) - 4_500.0).abs() < f64::EPSILON);
        assert_eq!(
            session.notifications().try_recv().ok(),
            Some(Notification::Status {
                channel: ChannelId::One,
                status: ChannelStatus::Target { watts: 4_500.0 },
            })
        );
    }

    #[test]
    fn each_edit_is_logged_once() {
        // Only this test installs a logger in this binary.
        log::set_logger(&CAPTURED).unwrap();
        log::set_max_level(LevelFilter::Trace);
        let mut session = session();

        session.handle_command("target 2 4321");
        session.handle_command("width 77");

        assert_eq!(captured_lines_containing("target set to 4321W"), 1);
        assert_eq!(captured_lines_containing("pulse width set to 77ms"), 1);
    }

    #[test]
    fn invalid_edits_keep_previous_values() {
        let mut session = session();

        let reply = session.handle_command("target 2 -100");
        assert!(reply.lines()[0].starts_with("ERR"));
        assert!(reply.lines()[0].ends_with("(keeping 5000W)"));
        assert!((session.settings().target(ChannelId::Two) - 5_000.0).abs() < f64::EPSILON);

        let reply = session.handle_command("width 2000");
        assert!(reply.lines()[0].ends_with("(keeping 10ms)"));
        assert_eq!(session.settings().pulse_width_ms(), 10);
        assert!(session.notifications().is_empty());
    }

    #[test]
    fn start_stop_and_quit() {
        let mut session = session();

        assert_eq!(session.handle_command("start").lines(), ["OK pulsing".to_string()]);
        assert_eq!(
            session.handle_command("START").lines(),
            ["OK already pulsing".to_string()]
        );
        assert!(session.handle_command("status").lines().contains(&"State: pulsing".to_string()));

        let reply = session.handle_command("quit");
        assert_eq!(
            reply,
            Reply::Quit(vec!["OK stopped".to_string(), "Session closed.".to_string()])
        );
        assert!(!session.is_running());
    }

    #[test]
    fn syntax_errors_are_reported() {
        let mut session = session();
        assert_eq!(
            session.handle_command("target 7 100").lines(),
            ["ERR channel must be 1 or 2".to_string()]
        );
        assert_eq!(session.handle_command("   ").lines(), Vec::<String>::new().as_slice());
    }
}
