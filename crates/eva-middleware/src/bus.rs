//! Headless, channel-partitioned publish/subscribe bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! Each outbound [`Channel`] gets its own lane, so the gesture consumer
//! never sees soma traffic.  A separate *tap* lane receives a copy of every
//! message; monitors and the rosbridge writer listen there.

use std::collections::HashMap;
use std::sync::Arc;

use eva_types::{Channel, EvaError, OutboundMessage};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered messages before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    lanes: Arc<HashMap<Channel, broadcast::Sender<OutboundMessage>>>,
    tap: broadcast::Sender<OutboundMessage>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every lane independently.
    pub fn new(capacity: usize) -> Self {
        let lanes = Channel::ALL
            .iter()
            .map(|&channel| (channel, broadcast::channel(capacity).0))
            .collect();
        let (tap, _) = broadcast::channel(capacity);
        Self {
            lanes: Arc::new(lanes),
            tap,
        }
    }

    /// Publish `message` on the lane of its channel and on the tap.
    ///
    /// Returns the number of receivers that were handed the message.
    /// `Ok(0)` means nobody is listening, which is a normal condition for a
    /// pub/sub transport and not an error.
    pub fn publish(&self, message: OutboundMessage) -> Result<usize, EvaError> {
        let lane = self.lane(message.channel())?;
        let tapped = self.tap.send(message.clone()).unwrap_or(0);
        let delivered = lane.send(message).unwrap_or(0);
        Ok(tapped + delivered)
    }

    /// Subscribe to a single [`Channel`].
    pub fn subscribe_to(&self, channel: Channel) -> ChannelReceiver {
        let receiver = match self.lanes.get(&channel) {
            Some(lane) => lane.subscribe(),
            // Every channel gets a lane in `new`; this arm is unreachable
            // but a closed receiver is a safe answer.
            None => broadcast::channel(1).1,
        };
        ChannelReceiver { channel, receiver }
    }

    /// Subscribe to the tap, which carries every published message.
    pub fn subscribe_all(&self) -> TapReceiver {
        TapReceiver {
            receiver: self.tap.subscribe(),
        }
    }

    /// Number of receivers that would see a message on `channel`, counting
    /// tap subscribers.
    pub fn listener_count(&self, channel: Channel) -> usize {
        let lane = self
            .lanes
            .get(&channel)
            .map(|s| s.receiver_count())
            .unwrap_or(0);
        lane + self.tap.receiver_count()
    }

    fn lane(&self, channel: Channel) -> Result<&broadcast::Sender<OutboundMessage>, EvaError> {
        self.lanes
            .get(&channel)
            .ok_or_else(|| EvaError::Channel(format!("no lane for channel {channel:?}")))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receivers
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Channel`].
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct ChannelReceiver {
    channel: Channel,
    receiver: broadcast::Receiver<OutboundMessage>,
}

impl ChannelReceiver {
    /// Wait for the next message on this channel.
    ///
    /// Returns:
    /// * `Ok(message)` – a successfully received message.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<OutboundMessage, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive; used by tests and by synchronous drains.
    pub fn try_recv(&mut self) -> Result<OutboundMessage, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(message) => out.push(message),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(channel = ?self.channel, lagged_by = n, "ChannelReceiver lagged");
                }
                Err(_) => return out,
            }
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }
}

/// A receiver on the tap lane that skips over lag instead of failing.
pub struct TapReceiver {
    receiver: broadcast::Receiver<OutboundMessage>,
}

impl TapReceiver {
    /// Wait for the next message on any channel.
    ///
    /// Returns `None` when the bus is closed and no further messages will
    /// arrive.
    pub async fn recv(&mut self) -> Option<OutboundMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "TapReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`TapReceiver::recv`]; `None` when nothing
    /// is buffered.
    pub fn try_recv(&mut self) -> Option<OutboundMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "TapReceiver lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eva_types::OutboundAction;

    fn gesture(name: &str) -> OutboundMessage {
        OutboundMessage::new(
            "eva-middleware::test",
            OutboundAction::Gesture {
                name: name.to_string(),
                magnitude: 1.0,
                repeat: 1,
                speed: 1.0,
            },
        )
    }

    #[tokio::test]
    async fn publish_and_receive_on_channel() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Channel::Gesture);

        let message = gesture("wave");
        bus.publish(message.clone())?;

        let received = rx.recv().await?;
        assert_eq!(received.id, message.id);
        assert_eq!(received.action, message.action);
        Ok(())
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(gesture("nod")).unwrap(), 0);
    }

    #[tokio::test]
    async fn channel_subscriber_does_not_receive_other_channels() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut soma = bus.subscribe_to(Channel::SomaState);

        bus.publish(gesture("wave"))?;

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), soma.recv()).await;
        assert!(result.is_err(), "soma subscriber must not see a gesture");
        Ok(())
    }

    #[tokio::test]
    async fn tap_sees_every_channel() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut tap = bus.subscribe_all();

        bus.publish(gesture("wave"))?;
        bus.publish(OutboundMessage::new("test", OutboundAction::TtsStop))?;

        assert_eq!(tap.recv().await.ok_or("closed")?.channel(), Channel::Gesture);
        assert_eq!(tap.recv().await.ok_or("closed")?.channel(), Channel::TtsControl);
        Ok(())
    }

    #[test]
    fn listener_count_includes_tap() {
        let bus = EventBus::default();
        assert_eq!(bus.listener_count(Channel::ParameterConfig), 0);
        let _tap = bus.subscribe_all();
        assert_eq!(bus.listener_count(Channel::ParameterConfig), 1);
        let _direct = bus.subscribe_to(Channel::ParameterConfig);
        assert_eq!(bus.listener_count(Channel::ParameterConfig), 2);
    }

    #[test]
    fn drain_returns_buffered_messages_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Channel::Gesture);
        bus.publish(gesture("a")).unwrap();
        bus.publish(gesture("b")).unwrap();

        let names: Vec<_> = rx
            .drain()
            .into_iter()
            .filter_map(|m| m.action.name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(rx.drain().is_empty());
    }

    #[tokio::test]
    async fn channel_lag_on_slow_subscriber() {
        const CAPACITY: usize = 64;
        let bus = EventBus::new(CAPACITY);
        let mut slow = bus.subscribe_to(Channel::Gesture);

        for _ in 0..1_000 {
            let _ = bus.publish(gesture("flood"));
        }

        let result = slow.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }
}
