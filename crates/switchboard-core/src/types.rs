//! Core types for turn routing

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Identifier of a task handler (e.g. `agent-card-control`)
pub type HandlerId = String;

/// Session-scoped facts, overwrite-only
pub type Facts = BTreeMap<String, Value>;

/// Free-form diagnostics attached to a signal
pub type Details = BTreeMap<String, Value>;

/// Inbound channel of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Web,
    Mobile,
    Ivr,
    Whatsapp,
}

/// Identity of the person speaking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    #[serde(default)]
    pub kyc_verified: bool,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kyc_verified: false,
            scopes: Vec::new(),
        }
    }
}

/// One message of recent conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Caller-supplied turn metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    /// Short recent history, oldest first
    #[serde(default)]
    pub recent_messages: Vec<HistoryMessage>,
    /// Facts the caller already knows (profile, channel context, ...)
    #[serde(default)]
    pub facts: Facts,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

/// Immutable inbound unit, created once per message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: String,
    pub session_id: String,
    pub channel: Channel,
    pub actor: Actor,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Option<Vec<Value>>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub metadata: TurnMetadata,
}

impl Turn {
    /// Minimal web turn, mostly useful for tests and the CLI
    pub fn text(
        turn_id: impl Into<String>,
        session_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            turn_id: turn_id.into(),
            session_id: session_id.into(),
            channel: Channel::Web,
            actor: Actor::new("anonymous"),
            text: text.into(),
            attachments: None,
            locale: None,
            metadata: TurnMetadata::default(),
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryMessage>) -> Self {
        self.metadata.recent_messages = history;
        self
    }

    /// Text with surrounding whitespace removed; empty means "nothing to route"
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// Which provider produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Lexical,
    Vector,
    Model,
    Drift,
}

impl SignalSource {
    /// Fixed evaluation and reporting order
    pub const ALL: [SignalSource; 4] = [
        SignalSource::Lexical,
        SignalSource::Vector,
        SignalSource::Model,
        SignalSource::Drift,
    ];

    /// Tie-break rank: higher wins equal-confidence proposals.
    pub fn tie_rank(self) -> u8 {
        match self {
            SignalSource::Drift => 0,
            SignalSource::Lexical => 1,
            SignalSource::Vector => 2,
            SignalSource::Model => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalSource::Lexical => "lexical",
            SignalSource::Vector => "vector",
            SignalSource::Model => "model",
            SignalSource::Drift => "drift",
        }
    }
}

impl std::fmt::Display for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider's opinion on which handler should own a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub source: SignalSource,
    pub candidate: Option<HandlerId>,
    pub confidence: f64,
    #[serde(default)]
    pub details: Details,
}

impl Signal {
    /// Signal with no candidate and zero confidence
    pub fn null(source: SignalSource) -> Self {
        Self {
            source,
            candidate: None,
            confidence: 0.0,
            details: Details::new(),
        }
    }

    pub fn proposing(source: SignalSource, candidate: impl Into<HandlerId>, confidence: f64) -> Self {
        Self {
            source,
            candidate: Some(candidate.into()),
            confidence: clamp_unit(confidence),
            details: Details::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn is_null(&self) -> bool {
        self.candidate.is_none()
    }
}

/// Question put back to the user when no handler can be chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyPayload {
    pub question: String,
}

impl ClarifyPayload {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

/// Outcome of arbitration: a handler or a clarification, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Handler(HandlerId),
    Clarify(ClarifyPayload),
}

impl Route {
    pub fn handler(&self) -> Option<&str> {
        match self {
            Route::Handler(id) => Some(id),
            Route::Clarify(_) => None,
        }
    }

    pub fn clarify(&self) -> Option<&ClarifyPayload> {
        match self {
            Route::Handler(_) => None,
            Route::Clarify(payload) => Some(payload),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterDecision {
    #[serde(flatten)]
    pub route: Route,
    pub confidence: f64,
    /// All collected signals, in lexical, vector, model, drift order
    pub signals: Vec<Signal>,
}

impl RouterDecision {
    pub fn handler(&self) -> Option<&str> {
        self.route.handler()
    }

    pub fn clarify(&self) -> Option<&ClarifyPayload> {
        self.route.clarify()
    }

    pub fn signal(&self, source: SignalSource) -> Option<&Signal> {
        self.signals.iter().find(|s| s.source == source)
    }

    /// Compact `lex=agent(0.67)` summary used in logs
    pub fn signal_summary(&self) -> String {
        self.signals
            .iter()
            .map(|s| {
                format!(
                    "{}={}({:.2})",
                    &s.source.as_str()[..3],
                    s.candidate.as_deref().unwrap_or("-"),
                    s.confidence
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of one handler invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerOutcome {
    pub reply: String,
    #[serde(default)]
    pub terminal: bool,
    /// Short topic tag such as `card_block` or `faq`
    #[serde(default)]
    pub resolved_topic: Option<String>,
    /// Facts to merge into session scope
    #[serde(default)]
    pub facts: Option<Facts>,
}

impl HandlerOutcome {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: text.into(),
            ..Self::default()
        }
    }

    pub fn terminal(text: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            reply: text.into(),
            terminal: true,
            resolved_topic: Some(topic.into()),
            facts: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.resolved_topic = Some(topic.into());
        self
    }

    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.facts
            .get_or_insert_with(Facts::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Clamp a confidence into [0, 1]; NaN becomes 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
