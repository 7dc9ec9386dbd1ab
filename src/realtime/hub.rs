/// Broadcast hub for change events
use crate::{
    identity::Actor,
    realtime::{ChangeEvent, Topic},
};
use std::collections::HashSet;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Fan-in point for every server-confirmed change
#[derive(Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
}

/// What a subscriber receives
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(ChangeEvent),
    /// The subscriber fell behind and this many events were skipped.
    /// Clients should refetch authoritative state.
    Lagged(u64),
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns the number of live subscribers
    pub fn publish(&self, event: ChangeEvent) -> usize {
        tracing::trace!("Publishing {} on {:?}", event.name(), event.topic());
        // No subscribers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to an explicit set of topics
    pub fn subscribe(&self, topics: impl IntoIterator<Item = Topic>) -> ChangeStream {
        ChangeStream {
            receiver: self.sender.subscribe(),
            topics: topics.into_iter().collect(),
        }
    }

    /// Subscribe to the streams an actor is entitled to
    pub fn subscribe_actor(&self, actor: &Actor) -> ChangeStream {
        let mut topics = vec![Topic::Notifications(actor.account_id.clone())];
        if actor.is_moderator {
            topics.push(Topic::ModerationQueue);
        }
        self.subscribe(topics)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A filtered view over the hub
pub struct ChangeStream {
    receiver: broadcast::Receiver<ChangeEvent>,
    topics: HashSet<Topic>,
}

impl ChangeStream {
    /// Switch the watched video; at most one video stream is open at a time
    pub fn watch_video(&mut self, video_id: impl Into<String>) {
        self.unwatch_video();
        self.topics.insert(Topic::Video(video_id.into()));
    }

    pub fn unwatch_video(&mut self) {
        self.topics.retain(|topic| !matches!(topic, Topic::Video(_)));
    }

    pub fn watched_video(&self) -> Option<&str> {
        self.topics.iter().find_map(|topic| match topic {
            Topic::Video(id) => Some(id.as_str()),
            _ => None,
        })
    }

    pub fn is_subscribed(&self, topic: &Topic) -> bool {
        self.topics.contains(topic)
    }

    /// Wait for the next matching event; `None` once the hub is gone
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.topics.contains(&event.topic()) => {
                    return Some(Delivery::Event(event))
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Some(Delivery::Lagged(skipped)),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, without waiting
    pub fn try_next(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.topics.contains(&event.topic()) => {
                    return Some(Delivery::Event(event))
                }
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => return Some(Delivery::Lagged(skipped)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
