//! Per-conversation session record

use crate::memory::HandlerMemory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use switchboard_core::{Facts, HandlerId, RoutingContext};

/// Where the conversation stands between turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No active handler; the next turn is routed
    #[default]
    Idle,
    /// A handler owns the conversation until it reports a terminal outcome
    Engaged {
        handler: HandlerId,
        topic: Option<String>,
    },
    /// A handler just finished; an acknowledgement inside the window closes the task
    TerminalCooldown {
        handler: HandlerId,
        completed_at: DateTime<Utc>,
    },
}

/// Topic of the last terminal outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTopic {
    pub topic: String,
    pub at: DateTime<Utc>,
}

/// Conversation state owned by exactly one writer at a time.
///
/// Handler memory lives in a separate region keyed by handler id and is only
/// reachable for the handler that is currently engaged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    state: SessionState,
    #[serde(default)]
    facts: Facts,
    #[serde(default)]
    last_topic: Option<ResolvedTopic>,
    #[serde(default)]
    pending_question: Option<String>,
    #[serde(default)]
    memories: BTreeMap<HandlerId, HandlerMemory>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, SessionState::Idle)
    }

    pub fn active_handler(&self) -> Option<&str> {
        match &self.state {
            SessionState::Engaged { handler, .. } => Some(handler),
            _ => None,
        }
    }

    pub fn active_topic(&self) -> Option<&str> {
        match &self.state {
            SessionState::Engaged { topic, .. } => topic.as_deref(),
            _ => None,
        }
    }

    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    pub fn last_topic(&self) -> Option<&ResolvedTopic> {
        self.last_topic.as_ref()
    }

    pub fn pending_question(&self) -> Option<&str> {
        self.pending_question.as_deref()
    }

    /// Memory of the engaged handler; `None` when no handler is engaged.
    pub fn active_memory(&self) -> Option<&HandlerMemory> {
        let handler = self.active_handler()?;
        self.memories.get(handler)
    }

    pub fn active_memory_mut(&mut self) -> Option<&mut HandlerMemory> {
        let SessionState::Engaged { handler, .. } = &self.state else {
            return None;
        };
        Some(self.memories.entry(handler.clone()).or_default())
    }

    /// Context for routing the next turn
    pub fn routing_context(&self) -> RoutingContext {
        RoutingContext {
            facts: self.facts.clone(),
            last_topic: self.last_topic.as_ref().map(|t| t.topic.clone()),
            pending_question: self.pending_question.clone(),
        }
    }

    pub(crate) fn take_pending_question(&mut self) -> Option<String> {
        self.pending_question.take()
    }

    pub(crate) fn set_pending_question(&mut self, question: String) {
        self.pending_question = Some(question);
    }

    pub(crate) fn engage(&mut self, handler: HandlerId, topic: Option<String>) {
        self.state = SessionState::Engaged { handler, topic };
    }

    /// Engage `handler` unless it already is, and hand out its memory
    pub(crate) fn engage_memory(&mut self, handler: &str) -> &mut HandlerMemory {
        if self.active_handler() != Some(handler) {
            self.engage(handler.to_string(), None);
        }
        self.memories.entry(handler.to_string()).or_default()
    }

    pub(crate) fn set_active_topic(&mut self, new_topic: String) {
        if let SessionState::Engaged { topic, .. } = &mut self.state {
            *topic = Some(new_topic);
        }
    }

    /// Close out the engaged handler and open the acknowledgement window
    pub(crate) fn complete(&mut self, handler: HandlerId, topic: Option<String>, at: DateTime<Utc>) {
        if let Some(topic) = topic {
            self.last_topic = Some(ResolvedTopic { topic, at });
        }
        self.state = SessionState::TerminalCooldown {
            handler,
            completed_at: at,
        };
    }

    pub(crate) fn reset(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Copy (overwrite by key) facts into session scope
    pub(crate) fn merge_facts(&mut self, facts: Facts) {
        self.facts.extend(facts);
    }
}
