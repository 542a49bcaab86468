//! In-process publish/subscribe hub feeding the per-user event stream.

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Notification {
        id: Uuid,
        title: String,
        message: String,
        kind: String,
        created_at: DateTime<Utc>,
    },
    Chat {
        id: Uuid,
        sender_id: Uuid,
        content: String,
        created_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
struct Addressed {
    user_id: Uuid,
    event: RealtimeEvent,
}

#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Addressed>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Delivers to every live subscription of `user_id`; nothing is buffered for offline users.
    pub fn publish(&self, user_id: Uuid, event: RealtimeEvent) {
        // An error only means nobody is listening right now.
        let _ = self.sender.send(Addressed { user_id, event });
    }

    pub fn subscribe(&self, user_id: Uuid) -> Subscription {
        Subscription {
            user_id,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(256)
    }
}

pub struct Subscription {
    user_id: Uuid,
    receiver: broadcast::Receiver<Addressed>,
}

impl Subscription {
    pub async fn next(&mut self) -> Option<RealtimeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) if msg.user_id == self.user_id => return Some(msg.event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %self.user_id, skipped, "realtime subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(mut self) -> impl Stream<Item = RealtimeEvent> {
        async_stream::stream! {
            while let Some(event) = self.next().await {
                yield event;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(content: &str) -> RealtimeEvent {
        RealtimeEvent::Chat {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_only_see_their_own_events() {
        let hub = NotificationHub::new(16);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut sub = hub.subscribe(alice);

        hub.publish(bob, chat("for bob"));
        hub.publish(alice, chat("for alice"));

        match sub.next().await {
            Some(RealtimeEvent::Chat { content, .. }) => assert_eq!(content, "for alice"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_newest_events() {
        let hub = NotificationHub::new(2);
        let user = Uuid::new_v4();
        let mut sub = hub.subscribe(user);

        for i in 0..5 {
            hub.publish(user, chat(&format!("m{i}")));
        }

        match sub.next().await {
            Some(RealtimeEvent::Chat { content, .. }) => assert_eq!(content, "m3"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let value = serde_json::to_value(chat("hi")).unwrap();
        assert_eq!(value["type"], "chat");
        assert_eq!(value["content"], "hi");
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        NotificationHub::default().publish(Uuid::new_v4(), chat("nobody"));
    }
}
