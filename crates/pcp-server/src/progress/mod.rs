//! Upload progress publishing
//!
//! Best-effort, per-channel broadcast of progress events. Publishing is
//! synchronous and never blocks the caller: events sent to a channel with
//! no live subscribers are dropped, and subscribers that fall behind lose
//! the oldest events (broadcast lag). Nothing is persisted or replayed
//! for late subscribers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Buffered events per channel before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 256;

/// A single progress event as delivered to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub channel: String,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Per-channel registry of broadcast senders
///
/// Channels are created lazily on first publish or subscribe. The registry
/// is shared across upload sessions; each channel delivers independently.
#[derive(Debug, Default)]
pub struct ProgressPublisher {
    channels: RwLock<HashMap<String, broadcast::Sender<ProgressEvent>>>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event to a channel, fire-and-forget
    ///
    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(
        &self,
        channel: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> usize {
        let event = ProgressEvent {
            channel: channel.to_string(),
            event_type: event_type.to_string(),
            payload,
        };

        let sender = self.sender_for(channel);
        // send only fails when there are no receivers; that is fine here
        sender.send(event).unwrap_or(0)
    }

    /// Subscribe to a channel, receiving events published after this call
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<ProgressEvent> {
        self.sender_for(channel).subscribe()
    }

    /// Number of live subscribers on a channel
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .map(|map| map.get(channel).map_or(0, |s| s.receiver_count()))
            .unwrap_or(0)
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<ProgressEvent> {
        if let Ok(map) = self.channels.read() {
            if let Some(sender) = map.get(channel) {
                return sender.clone();
            }
        }

        let mut map = match self.channels.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_block() {
        let publisher = ProgressPublisher::new();
        let delivered = publisher.publish("uploadprogress", "message", json!({"progress": "50%"}));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.subscribe("uploadprogress");

        publisher.publish("uploadprogress", "message", json!({"progress": "25%"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.channel, "uploadprogress");
        assert_eq!(event.event_type, "message");
        assert_eq!(event.payload["progress"], "25%");
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let publisher = ProgressPublisher::new();
        let mut rx_a = publisher.subscribe("uploads:a");
        let mut rx_b = publisher.subscribe("uploads:b");

        publisher.publish("uploads:a", "message", json!({"progress": "10%"}));

        let event = rx_a.recv().await.unwrap();
        assert_eq!(event.channel, "uploads:a");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let publisher = ProgressPublisher::new();
        publisher.publish("uploadprogress", "message", json!({"progress": "99%"}));

        let mut rx = publisher.subscribe("uploadprogress");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscriber_count() {
        let publisher = ProgressPublisher::new();
        assert_eq!(publisher.subscriber_count("uploadprogress"), 0);
        let _rx = publisher.subscribe("uploadprogress");
        assert_eq!(publisher.subscriber_count("uploadprogress"), 1);
    }
}
