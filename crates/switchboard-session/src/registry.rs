//! Handler and tool registries, built once at startup

use crate::memory::{HandlerMemory, ToolRecord, ToolResult};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use switchboard_core::{ConfigError, HandlerId, HandlerOutcome, Turn};

/// Calls a registered tool by id. Failures come back as [`ToolResult::Error`].
pub trait ToolCaller {
    fn call(&self, tool_id: &str, arguments: Value) -> ToolResult;
}

/// A capability a handler can invoke
pub trait Tool: Send + Sync {
    fn id(&self) -> &str;

    fn call(&self, arguments: &Value) -> anyhow::Result<Value>;
}

/// Tool backed by a closure
pub struct FnTool<F> {
    id: String,
    f: F,
}

impl<F> FnTool<F>
where
    F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(id: impl Into<String>, f: F) -> Self {
        Self { id: id.into(), f }
    }
}

impl<F> Tool for FnTool<F>
where
    F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn call(&self, arguments: &Value) -> anyhow::Result<Value> {
        (self.f)(arguments)
    }
}

/// Immutable tool table
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Box<dyn Tool>>) -> anyhow::Result<Self> {
        let mut table = BTreeMap::new();
        for tool in tools {
            let id = tool.id().to_string();
            if table.insert(id.clone(), tool).is_some() {
                anyhow::bail!("tool `{id}` registered twice");
            }
        }
        Ok(Self { tools: table })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolCaller for ToolRegistry {
    fn call(&self, tool_id: &str, arguments: Value) -> ToolResult {
        let Some(tool) = self.tools.get(tool_id) else {
            return ToolResult::error(format!("unknown tool `{tool_id}`"));
        };
        match tool.call(&arguments) {
            Ok(value) => ToolResult::ok(value),
            Err(e) => {
                tracing::warn!(tool = tool_id, error = %e, "tool call failed");
                ToolResult::error(e.to_string())
            }
        }
    }
}

/// Wraps a caller and keeps a record of every call made through it
pub(crate) struct RecordingCaller<'a> {
    inner: &'a dyn ToolCaller,
    records: RefCell<Vec<ToolRecord>>,
}

impl<'a> RecordingCaller<'a> {
    pub(crate) fn new(inner: &'a dyn ToolCaller) -> Self {
        Self {
            inner,
            records: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn into_records(self) -> Vec<ToolRecord> {
        self.records.into_inner()
    }
}

impl ToolCaller for RecordingCaller<'_> {
    fn call(&self, tool_id: &str, arguments: Value) -> ToolResult {
        let result = self.inner.call(tool_id, arguments.clone());
        self.records.borrow_mut().push(ToolRecord {
            tool_id: tool_id.to_string(),
            arguments,
            result: result.clone(),
        });
        result
    }
}

/// A task-specific conversational handler
pub trait Handler: Send + Sync {
    fn id(&self) -> &str;

    /// Handle one turn. Session facts are visible in `turn.metadata.facts`.
    fn run(&self, turn: &Turn, memory: &mut HandlerMemory, tools: &dyn ToolCaller)
        -> HandlerOutcome;
}

/// Immutable handler table
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<HandlerId, Box<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new(handlers: Vec<Box<dyn Handler>>) -> Result<Self, ConfigError> {
        let mut table = BTreeMap::new();
        for handler in handlers {
            let id = handler.id().to_string();
            if table.contains_key(&id) {
                return Err(ConfigError::DuplicateHandler(id));
            }
            table.insert(id, handler);
        }
        Ok(Self { handlers: table })
    }

    pub fn get(&self, id: &str) -> Option<&dyn Handler> {
        self.handlers.get(id).map(|h| h.as_ref())
    }

    pub fn ids(&self) -> Vec<HandlerId> {
        self.handlers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
