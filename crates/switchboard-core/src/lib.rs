//! Core turn-routing types, configuration and multi-signal arbitration

mod arbiter;
mod capability;
mod catalog;
mod config;
mod error;
mod provider;
mod types;

pub use arbiter::{Arbiter, Providers};
pub use capability::{
    centroid, cosine_similarity, json_object_span, ChatModel, ChatPrompt, DisabledModel, Embedder,
};
pub use catalog::{Catalog, FewShot, HandlerProfile, RESERVED_LABELS};
pub use config::{
    ArbiterConfig, EscalationConfig, SessionConfig, Thresholds, GENERIC_CLARIFY_QUESTION,
};
pub use error::{ConfigError, RoutingFault};
pub use provider::{RoutingContext, SignalContext, SignalProvider};
pub use types::{
    clamp_unit, Actor, Channel, ClarifyPayload, Details, Facts, HandlerId, HandlerOutcome,
    HistoryMessage, Route, RouterDecision, Signal, SignalSource, Turn, TurnMetadata,
};
