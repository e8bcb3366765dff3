//! Notifications handed from the timing loop to the presentation layer.
//!
//! The hand-off is strictly fire-and-forget: [`NotificationSink::try_dispatch`]
//! must return immediately, and a sink that is full or gone only costs the
//! notification, never a tick.

use core::fmt;

use crate::channel::ChannelId;

/// Human-readable channel state shown next to each indicator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ChannelStatus {
    /// No run has started yet.
    Ready,
    /// The operator changed the target while idle or running.
    Target { watts: f64 },
    /// A run is in progress at the given target.
    Pulsing { watts: f64 },
    /// The last run was stopped.
    Stopped,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Ready => f.write_str("Ready"),
            ChannelStatus::Target { watts } => write!(f, "{watts}W"),
            ChannelStatus::Pulsing { watts } => write!(f, "Pulsing at {watts}W"),
            ChannelStatus::Stopped => f.write_str("Stopped"),
        }
    }
}

/// One-way message from the core to the presentation layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Notification {
    /// Flash the channel indicator for `pulse_width_ms`.
    Pulse {
        channel: ChannelId,
        pulse_width_ms: u16,
    },
    /// Refresh the rate display; `None` shows the placeholder.
    RateUpdate {
        channel: ChannelId,
        rate_per_minute: Option<f64>,
    },
    /// Replace the status line.
    Status {
        channel: ChannelId,
        status: ChannelStatus,
    },
}

impl Notification {
    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        match self {
            Notification::Pulse { channel, .. }
            | Notification::RateUpdate { channel, .. }
            | Notification::Status { channel, .. } => *channel,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Pulse {
                channel,
                pulse_width_ms,
            } => write!(f, "pulse {} width={pulse_width_ms}ms", channel.number()),
            Notification::RateUpdate {
                channel,
                rate_per_minute: Some(rate),
            } => write!(f, "Rate {}: {rate:.1} pulses/min", channel.number()),
            Notification::RateUpdate {
                channel,
                rate_per_minute: None,
            } => write!(f, "Rate {}: -- pulses/min", channel.number()),
            Notification::Status { channel, status } => write!(f, "{channel}: {status}"),
        }
    }
}

/// Reason a notification could not be handed off.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DispatchError<E = ()> {
    /// The queue towards the presentation layer is full.
    QueueFull,
    /// The presentation layer has gone away.
    Disconnected,
    /// Transport-specific failure.
    Other(E),
}

impl<E> fmt::Display for DispatchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::QueueFull => f.write_str("queue-full"),
            DispatchError::Disconnected => f.write_str("disconnected"),
            DispatchError::Other(_) => f.write_str("transport-error"),
        }
    }
}

/// Non-blocking consumer of [`Notification`]s.
pub trait NotificationSink {
    /// Transport-specific error type.
    type Error;

    /// Hands off a notification without blocking.
    fn try_dispatch(&mut self, notification: Notification) -> Result<(), DispatchError<Self::Error>>;
}

impl<S> NotificationSink for &mut S
where
    S: NotificationSink + ?Sized,
{
    type Error = S::Error;

    fn try_dispatch(&mut self, notification: Notification) -> Result<(), DispatchError<Self::Error>> {
        (**self).try_dispatch(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_matches_operator_labels() {
        let mut buffer = heapless::String::<48>::new();
        fmt::write(
            &mut buffer,
            format_args!(
                "{}",
                Notification::Status {
                    channel: ChannelId::One,
                    status: ChannelStatus::Pulsing { watts: 2_000.0 },
                }
            ),
        )
        .unwrap();
        assert_eq!(buffer.as_str(), "Target 1: Pulsing at 2000W");

        buffer.clear();
        fmt::write(&mut buffer, format_args!("{}", ChannelStatus::Target { watts: 1_234.5 }))
            .unwrap();
        assert_eq!(buffer.as_str(), "1234.5W");
    }

    #[test]
    fn rate_text_uses_placeholder_when_unavailable() {
        let mut buffer = heapless::String::<48>::new();
        fmt::write(
            &mut buffer,
            format_args!(
                "{}",
                Notification::RateUpdate {
                    channel: ChannelId::Two,
                    rate_per_minute: None,
                }
            ),
        )
        .unwrap();
        assert_eq!(buffer.as_str(), "Rate 2: -- pulses/min");

        buffer.clear();
        fmt::write(
            &mut buffer,
            format_args!(
                "{}",
                Notification::RateUpdate {
                    channel: ChannelId::Two,
                    rate_per_minute: Some(83.333),
                }
            ),
        )
        .unwrap();
        assert_eq!(buffer.as_str(), "Rate 2: 83.3 pulses/min");
    }
}
