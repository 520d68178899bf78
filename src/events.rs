//! Observability event stream.
//!
//! Every primitive the dispatcher executes emits one event on a broadcast
//! channel after it commits. Subscribers (e.g. a UI, a metrics sink) get a
//! best-effort feed: a slow subscriber that falls behind the channel
//! capacity silently misses older events rather than blocking writers,
//! which matches the "observability must never be on the write's critical
//! path" requirement.
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// The kind of event recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Change,
    Link,
    Participant,
}

/// Payload for a `change` event: a key was stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangePayload {
    pub key: String,
    pub author: String,
    pub content_len: usize,
}

/// Payload for a `link` event: an edge was added to the temporal graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkPayload {
    pub source: NodeId,
    pub target: NodeId,
    pub relation: crate::types::RelationType,
}

/// Payload for a `participant` event: the orchestration roster changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantPayload {
    pub participant_id: String,
    pub joined: bool,
}

/// The payload union for an [`EventRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EventPayload {
    Change(ChangePayload),
    Link(LinkPayload),
    Participant(ParticipantPayload),
}

/// A single observability event: `{"type": ..., "payload": ..., "timestamp": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: EventPayload,
    pub timestamp: i64,
}

impl EventRecord {
    pub fn change(key: impl Into<String>, author: impl Into<String>, content_len: usize) -> Self {
        Self {
            event_type: EventType::Change,
            payload: EventPayload::Change(ChangePayload { key: key.into(), author: author.into(), content_len }),
            timestamp: crate::types::next_timestamp(),
        }
    }

    pub fn link(source: NodeId, target: NodeId, relation: crate::types::RelationType) -> Self {
        Self {
            event_type: EventType::Link,
            payload: EventPayload::Link(LinkPayload { source, target, relation }),
            timestamp: crate::types::next_timestamp(),
        }
    }

    pub fn participant(participant_id: impl Into<String>, joined: bool) -> Self {
        Self {
            event_type: EventType::Participant,
            payload: EventPayload::Participant(ParticipantPayload { participant_id: participant_id.into(), joined }),
            timestamp: crate::types::next_timestamp(),
        }
    }
}

/// Broadcast hub for [`EventRecord`]s.
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the event stream. Safe to call without an async runtime;
    /// the returned receiver only needs one when `.recv()` is awaited.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Publish an event. Never blocks; if there are no subscribers the
    /// event is simply dropped.
    pub fn publish(&self, event: EventRecord) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
