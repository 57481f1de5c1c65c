//! Routing fault taxonomy and configuration errors

use crate::types::{HandlerId, SignalSource};
use thiserror::Error;

/// Faults absorbed by the component that detects them.
///
/// None of these cross a provider, arbiter or escalation boundary as an
/// `Err`; they are recorded in signal details, logged, or carried in a
/// caller-visible reply variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingFault {
    #[error("{provider} provider failed: {message}")]
    ProviderFailure {
        provider: SignalSource,
        message: String,
    },

    #[error("classifier output malformed: {0}")]
    ClassificationMalformed(String),

    #[error("handler `{0}` is not registered")]
    UnknownHandler(HandlerId),

    #[error("escalation gave no usable verdict after {rounds} round(s)")]
    EscalationExhausted { rounds: u32 },
}

impl RoutingFault {
    /// Stable short code for logs and signal details
    pub fn code(&self) -> &'static str {
        match self {
            RoutingFault::ProviderFailure { .. } => "provider_failure",
            RoutingFault::ClassificationMalformed(_) => "classification_malformed",
            RoutingFault::UnknownHandler(_) => "unknown_handler",
            RoutingFault::EscalationExhausted { .. } => "escalation_exhausted",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name}={value:?} is not a valid {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{field} must lie in [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("handler `{0}` is declared twice in the catalog")]
    DuplicateHandler(HandlerId),

    #[error("invalid pattern {pattern:?} for handler `{handler}`: {reason}")]
    InvalidPattern {
        handler: HandlerId,
        pattern: String,
        reason: String,
    },
}
