//! Orchestration context: the participant roster for collaborating agents.
//!
//! This module tracks *who* is contributing, not *what* they're allowed to
//! do — authentication and authorization are out of scope and belong to a
//! layer above this one. A participant here is just an id, a type, a
//! transport, and a running contribution count.
use crate::events::EventRecord;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Who a participant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantType {
    Human,
    AiAgent,
}

/// How a participant is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Mcp,
    WebSocket,
    InProcess,
}

/// A participant in the orchestration context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub participant_type: ParticipantType,
    pub connection: ConnectionKind,
    pub joined_at: i64,
    pub contribution_count: u64,
}

struct ParticipantEntry {
    participant_type: ParticipantType,
    connection: ConnectionKind,
    joined_at: i64,
    contributions: AtomicU64,
}

/// Tracks the set of humans and agents participating in a session and how
/// many contributions (primitive invocations) each has made.
///
/// Carries no authentication responsibility: any id can register, and
/// nothing here is consulted to decide whether an operation is permitted.
#[derive(Default)]
pub struct OrchestrationContext {
    participants: DashMap<String, ParticipantEntry>,
}

impl OrchestrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_participant(
        &self,
        id: impl Into<String>,
        participant_type: ParticipantType,
        connection: ConnectionKind,
    ) -> EventRecord {
        let id = id.into();
        self.participants.insert(
            id.clone(),
            ParticipantEntry {
                participant_type,
                connection,
                joined_at: crate::types::next_timestamp(),
                contributions: AtomicU64::new(0),
            },
        );
        EventRecord::participant(id, true)
    }

    pub fn remove_participant(&self, id: &str) -> Option<EventRecord> {
        self.participants.remove(id).map(|_| EventRecord::participant(id, false))
    }

    /// Record that a participant performed one contribution (e.g. a
    /// dispatcher primitive call). No-op for unknown participants.
    pub fn record_contribution(&self, id: &str) {
        if let Some(entry) = self.participants.get(id) {
            entry.contributions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get(&self, id: &str) -> Option<Participant> {
        self.participants.get(id).map(|entry| Participant {
            id: id.to_string(),
            participant_type: entry.participant_type,
            connection: entry.connection,
            joined_at: entry.joined_at,
            contribution_count: entry.contributions.load(Ordering::Relaxed),
        })
    }

    pub fn list(&self) -> Vec<Participant> {
        self.participants
            .iter()
            .map(|e| Participant {
                id: e.key().clone(),
                participant_type: e.value().participant_type,
                connection: e.value().connection,
                joined_at: e.value().joined_at,
                contribution_count: e.value().contributions.load(Ordering::Relaxed),
            })
            .collect()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}
