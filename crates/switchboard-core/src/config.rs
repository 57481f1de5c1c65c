//! Configuration for arbitration, escalation and session handling

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

pub const GENERIC_CLARIFY_QUESTION: &str =
    "Could you clarify whether you want card help, an appointment, or an FAQ?";

/// Minimum confidence each provider must clear to take part in arbitration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub lexical_min: f64,
    pub vector_min: f64,
    pub model_min: f64,
    pub drift_min: f64,
}

impl Thresholds {
    pub fn new() -> Self {
        Self {
            lexical_min: 0.35,
            vector_min: 0.55,
            model_min: 0.70,
            drift_min: 0.60,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new()
    }
}

/// Arbiter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Per-provider admission thresholds
    pub thresholds: Thresholds,

    /// Below this the arbiter asks for clarification
    pub final_min: f64,

    /// Model pick replaces the provisional pick when ahead by at least this
    pub model_override_margin: f64,

    /// Vector pick replaces the provisional pick when ahead by at least this
    pub vector_override_margin: f64,

    /// Question returned with the clarify sentinel
    pub clarify_question: String,
}

impl ArbiterConfig {
    pub fn new() -> Self {
        Self {
            thresholds: Thresholds::new(),
            final_min: 0.65,
            model_override_margin: 0.15,
            vector_override_margin: 0.10,
            clarify_question: GENERIC_CLARIFY_QUESTION.to_string(),
        }
    }

    /// Defaults with `ROUTER_*` environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        override_f64("ROUTER_KW_MIN", &mut config.thresholds.lexical_min)?;
        override_f64("ROUTER_SEM_MIN", &mut config.thresholds.vector_min)?;
        override_f64("ROUTER_LLM_MIN", &mut config.thresholds.model_min)?;
        override_f64("ROUTER_DRIFT_MIN", &mut config.thresholds.drift_min)?;
        override_f64("ROUTER_FINAL_MIN", &mut config.final_min)?;
        override_f64("ROUTER_LLM_WIN_DELTA", &mut config.model_override_margin)?;
        override_f64("ROUTER_SEM_WIN_DELTA", &mut config.vector_override_margin)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("lexical_min", self.thresholds.lexical_min)?;
        check_unit("vector_min", self.thresholds.vector_min)?;
        check_unit("model_min", self.thresholds.model_min)?;
        check_unit("drift_min", self.thresholds.drift_min)?;
        check_unit("final_min", self.final_min)?;
        check_unit("model_override_margin", self.model_override_margin)?;
        check_unit("vector_override_margin", self.vector_override_margin)?;
        Ok(())
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Escalation tier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Escalate when the arbiter's confidence is below this
    pub escalate_below: f64,

    /// Cap on generative rounds before falling back to clarify
    pub max_rounds: u32,

    pub clarify_question: String,
}

impl EscalationConfig {
    pub fn new() -> Self {
        Self {
            escalate_below: 0.75,
            max_rounds: 3,
            clarify_question: "Could you clarify what you need?".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        override_f64("ROUTER_ESCALATE_BELOW", &mut config.escalate_below)?;
        override_parsed(
            "ROUTER_ESCALATE_MAX_ROUNDS",
            "positive integer",
            &mut config.max_rounds,
        )?;
        if config.max_rounds == 0 {
            return Err(ConfigError::InvalidEnv {
                name: "ROUTER_ESCALATE_MAX_ROUNDS",
                value: config.max_rounds.to_string(),
                expected: "positive integer",
            });
        }
        check_unit("escalate_below", config.escalate_below)?;
        Ok(config)
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Session state machine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long after a terminal outcome an acknowledgement closes the task
    pub ack_window_secs: i64,

    /// Canned reply for the acknowledgement short-circuit
    pub closing_reply: String,

    /// Suggested caller text when nothing could be routed
    pub unroutable_reply: String,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            ack_window_secs: 120,
            closing_reply:
                "Great, I'll close this issue. If you need anything else, just tell me."
                    .to_string(),
            unroutable_reply: "Sorry, I couldn't route that. Could you rephrase?".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        override_parsed(
            "ROUTER_ACK_WINDOW_SECS",
            "integer",
            &mut config.ack_window_secs,
        )?;
        Ok(config)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn override_f64(name: &'static str, target: &mut f64) -> Result<(), ConfigError> {
    override_parsed(name, "number", target)
}

fn override_parsed<T: std::str::FromStr>(
    name: &'static str,
    expected: &'static str,
    target: &mut T,
) -> Result<(), ConfigError> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(());
    };
    match raw.trim().parse::<T>() {
        Ok(value) => {
            *target = value;
            Ok(())
        }
        Err(_) => Err(ConfigError::InvalidEnv {
            name,
            value: raw,
            expected,
        }),
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}
