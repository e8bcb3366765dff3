use std::time::{Duration, Instant};

use pulse_core::channel::{CHANNEL_COUNT, ChannelId};
use pulse_core::notify::{ChannelStatus, Notification};

/// What the front-end shows for one channel.
#[derive(Clone, Debug)]
pub struct ChannelView {
    lit_until: Option<Instant>,
    pub status_line: String,
    pub rate_line: String,
    pub flashes: u64,
}

impl ChannelView {
    fn new(channel: ChannelId) -> Self {
        Self {
            lit_until: None,
            status_line: status_text(channel, ChannelStatus::Ready),
            rate_line: rate_text(channel, None),
            flashes: 0,
        }
    }

    pub fn is_lit(&self, now: Instant) -> bool {
        self.lit_until.is_some_and(|until| now < until)
    }
}

/// Presentation state fed exclusively by [`Notification`]s.
#[derive(Clone, Debug)]
pub struct Dashboard {
    channels: [ChannelView; CHANNEL_COUNT],
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            channels: ChannelId::ALL.map(ChannelView::new),
        }
    }

    pub fn channel(&self, channel: ChannelId) -> &ChannelView {
        &self.channels[channel.index()]
    }

    /// Applies one notification. A pulse that arrives while the indicator is
    /// still lit is ignored; the flash is not extended.
    pub fn apply(&mut self, notification: Notification, now: Instant) {
        let view = &mut self.channels[notification.channel().index()];
        match notification {
            Notification::Pulse { pulse_width_ms, .. } => {
                if view.is_lit(now) {
                    return;
                }
                view.lit_until = Some(now + Duration::from_millis(u64::from(pulse_width_ms)));
                view.flashes += 1;
            }
            Notification::RateUpdate { .. } => view.rate_line = notification.to_string(),
            Notification::Status { .. } => view.status_line = notification.to_string(),
        }
    }

    /// Earliest instant at which a lit indicator goes dark, for redraw pacing.
    pub fn next_expiry(&self, now: Instant) -> Option<Instant> {
        self.channels
            .iter()
            .filter_map(|view| view.lit_until)
            .filter(|until| *until > now)
            .min()
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

fn status_text(channel: ChannelId, status: ChannelStatus) -> String {
    Notification::Status { channel, status }.to_string()
}

fn rate_text(channel: ChannelId, rate_per_minute: Option<f64>) -> String {
    Notification::RateUpdate {
        channel,
        rate_per_minute,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(channel: ChannelId, pulse_width_ms: u16) -> Notification {
        Notification::Pulse {
            channel,
            pulse_width_ms,
        }
    }

    #[test]
    fn starts_ready_with_placeholder_rates() {
        let dashboard = Dashboard::new();
        assert_eq!(dashboard.channel(ChannelId::One).status_line, "Target 1: Ready");
        assert_eq!(dashboard.channel(ChannelId::Two).rate_line, "Rate 2: -- pulses/min");
    }

    #[test]
    fn lit_indicator_ignores_overlapping_pulses() {
        let mut dashboard = Dashboard::new();
        let now = Instant::now();

        dashboard.apply(pulse(ChannelId::One, 10), now);
        dashboard.apply(pulse(ChannelId::One, 500), now + Duration::from_millis(5));

        let view = dashboard.channel(ChannelId::One);
        assert_eq!(view.flashes, 1);
        assert!(view.is_lit(now + Duration::from_millis(9)));
        assert!(!view.is_lit(now + Duration::from_millis(10)));
        assert!(!dashboard.channel(ChannelId::Two).is_lit(now));
        assert_eq!(dashboard.next_expiry(now), Some(now + Duration::from_millis(10)));

        dashboard.apply(pulse(ChannelId::One, 20), now + Duration::from_millis(11));
        assert_eq!(dashboard.channel(ChannelId::One).flashes, 2);
    }

    #[test]
    fn rate_and_status_lines_follow_notifications() {
        let mut dashboard = Dashboard::new();
        let now = Instant::now();

        dashboard.apply(
            Notification::RateUpdate {
                channel: ChannelId::Two,
                rate_per_minute: Some(83.3),
            },
            now,
        );
        dashboard.apply(
            Notification::Status {
                channel: ChannelId::One,
                status: ChannelStatus::Target { watts: 4_500.0 },
            },
            now,
        );

        assert_eq!(dashboard.channel(ChannelId::Two).rate_line, "Rate 2: 83.3 pulses/min");
        assert_eq!(dashboard.channel(ChannelId::One).status_line, "Target 1: 4500W");
    }
}
