//! Session state machine, handler memory and the turn-handling facade

mod ack;
mod memory;
mod registry;
mod session;
mod switchboard;

pub use ack::is_acknowledgement;
pub use memory::{HandlerMemory, MemoryEntry, ToolRecord, ToolResult, Visibility};
pub use registry::{FnTool, Handler, HandlerRegistry, Tool, ToolCaller, ToolRegistry};
pub use session::{ResolvedTopic, Session, SessionState};
pub use switchboard::{Switchboard, TurnReply};
