//! Per-handler working memory and tool call records

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use switchboard_core::Facts;

/// Who may see a memory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only the owning handler
    Private,
    /// Promoted into session facts after every invocation
    Session,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub value: Value,
    pub visibility: Visibility,
}

/// Outcome of one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Ok { value: Value },
    Error { message: String },
}

impl ToolResult {
    pub fn ok(value: impl Into<Value>) -> Self {
        ToolResult::Ok {
            value: value.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResult::Error {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ToolResult::Ok { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ToolResult::Ok { value } => Some(value),
            ToolResult::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub tool_id: String,
    pub arguments: Value,
    pub result: ToolResult,
}

/// Opaque working memory owned by one handler.
///
/// Entries survive between invocations of the same handler. Only entries
/// written with [`Visibility::Session`] leave this region, as session facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerMemory {
    #[serde(default)]
    entries: BTreeMap<String, MemoryEntry>,
    #[serde(default)]
    tool_results: Vec<ToolRecord>,
}

impl HandlerMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn visibility(&self, key: &str) -> Option<Visibility> {
        self.entries.get(key).map(|e| e.visibility)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>, visibility: Visibility) {
        self.entries.insert(
            key.into(),
            MemoryEntry {
                value: value.into(),
                visibility,
            },
        );
    }

    pub fn set_private(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.set(key, value, Visibility::Private);
    }

    /// Write an entry that is copied into session facts
    pub fn set_session(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.set(key, value, Visibility::Session);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Session-visible entries as a facts map
    pub fn session_facts(&self) -> Facts {
        self.entries
            .iter()
            .filter(|(_, e)| e.visibility == Visibility::Session)
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Every tool call made by this handler, oldest first
    pub fn tool_results(&self) -> &[ToolRecord] {
        &self.tool_results
    }

    pub(crate) fn record_tools(&mut self, records: &[ToolRecord]) {
        self.tool_results.extend_from_slice(records);
    }
}
