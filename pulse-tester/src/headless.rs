use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use pulse_core::notify::Notification;

use crate::session::Session;

/// Runs one session of `duration` without the terminal UI, printing every
/// notification as a timestamped line.
pub fn run(mut session: Session, duration: Duration, out: &mut impl Write) -> io::Result<()> {
    let started_at = Instant::now();
    // `None` runs until the queue disconnects.
    let deadline = started_at.checked_add(duration);

    for line in session.start() {
        writeln!(out, "{line}")?;
    }

    loop {
        let remaining = deadline.map_or(Duration::MAX, |deadline| {
            deadline.saturating_duration_since(Instant::now())
        });
        if remaining.is_zero() {
            break;
        }
        match session.notifications().recv_timeout(remaining) {
            Ok(notification) => print_line(out, started_at, &notification)?,
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }

    let closing = session.stop();
    let pending: Vec<_> = session.notifications().try_iter().collect();
    for notification in pending {
        print_line(out, started_at, &notification)?;
    }
    for line in closing {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

fn print_line(
    out: &mut impl Write,
    started_at: Instant,
    notification: &Notification,
) -> io::Result<()> {
    writeln!(
        out,
        "[+{:>6} ms] {notification}",
        started_at.elapsed().as_millis()
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pulse_core::channel::PulseSettings;

    use super::*;
    use crate::runner::{PulseRunner, RunnerConfig};

    #[test]
    fn short_headless_run_prints_pulses_and_stops() {
        let settings = PulseSettings::new([3_600.0, 36_000.0], 25).unwrap();
        let session = Session::new(PulseRunner::new(
            Arc::new(settings),
            RunnerConfig::default(),
        ));

        let mut output = Vec::new();
        run(session, Duration::from_millis(250), &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();

        assert!(text.starts_with("OK pulsing\n"));
        assert!(text.contains("] Target 1: Pulsing at 3600W"));
        assert!(text.contains("] pulse 1 width=25ms"));
        assert!(text.contains("] pulse 2 width=25ms"));
        assert!(text.contains("] Target 2: Stopped"));
        assert!(text.trim_end().ends_with("OK stopped"));
    }
}
