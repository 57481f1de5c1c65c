//! Signal provider contract

use crate::error::RoutingFault;
use crate::types::{Facts, HistoryMessage, Signal, SignalSource};
use serde::{Deserialize, Serialize};

/// Session-derived context the arbiter routes against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingContext {
    /// Facts promoted into session scope
    #[serde(default)]
    pub facts: Facts,
    /// Topic of the last terminal outcome
    #[serde(default)]
    pub last_topic: Option<String>,
    /// Clarification asked on the previous turn
    #[serde(default)]
    pub pending_question: Option<String>,
}

/// Read-only view handed to each provider for one turn
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    pub history: &'a [HistoryMessage],
    pub facts: &'a Facts,
    pub last_topic: Option<&'a str>,
    pub pending_question: Option<&'a str>,
}

impl<'a> SignalContext<'a> {
    pub fn empty(facts: &'a Facts) -> Self {
        Self {
            history: &[],
            facts,
            last_topic: None,
            pending_question: None,
        }
    }
}

/// One independent routing opinion source
pub trait SignalProvider: Send + Sync {
    fn source(&self) -> SignalSource;

    /// Fallible evaluation; errors are absorbed by [`SignalProvider::evaluate`]
    fn try_evaluate(&self, text: &str, ctx: &SignalContext<'_>) -> anyhow::Result<Signal>;

    /// Never fails: internal errors degrade to a null signal with the failure in details.
    fn evaluate(&self, text: &str, ctx: &SignalContext<'_>) -> Signal {
        let source = self.source();
        if text.trim().is_empty() {
            return Signal::null(source);
        }
        match self.try_evaluate(text, ctx) {
            Ok(mut signal) => {
                signal.source = source;
                signal.confidence = crate::types::clamp_unit(signal.confidence);
                signal
            }
            Err(err) => {
                let fault = RoutingFault::ProviderFailure {
                    provider: source,
                    message: format!("{err:#}"),
                };
                tracing::warn!(source = %source, error = %fault, "signal provider failed");
                Signal::null(source)
                    .with_detail("error", fault.to_string())
                    .with_detail("fault", fault.code())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl SignalProvider for Failing {
        fn source(&self) -> SignalSource {
            SignalSource::Vector
        }

        fn try_evaluate(&self, _text: &str, _ctx: &SignalContext<'_>) -> anyhow::Result<Signal> {
            anyhow::bail!("embedding backend unavailable")
        }
    }

    struct Mislabelled;

    impl SignalProvider for Mislabelled {
        fn source(&self) -> SignalSource {
            SignalSource::Model
        }

        fn try_evaluate(&self, _text: &str, _ctx: &SignalContext<'_>) -> anyhow::Result<Signal> {
            Ok(Signal {
                source: SignalSource::Lexical,
                candidate: Some("agent-faq".to_string()),
                confidence: 3.0,
                details: Default::default(),
            })
        }
    }

    #[test]
    fn test_failure_degrades_to_null_signal() {
        let facts = Facts::new();
        let signal = Failing.evaluate("block my card", &SignalContext::empty(&facts));
        assert_eq!(signal.source, SignalSource::Vector);
        assert!(signal.candidate.is_none());
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.details["fault"], "provider_failure");
        assert!(signal.details["error"]
            .as_str()
            .unwrap()
            .contains("embedding backend unavailable"));
    }

    #[test]
    fn test_empty_text_never_reaches_provider() {
        let facts = Facts::new();
        let signal = Failing.evaluate("   ", &SignalContext::empty(&facts));
        assert!(signal.details.is_empty());
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn test_source_and_confidence_normalized() {
        let facts = Facts::new();
        let signal = Mislabelled.evaluate("hello", &SignalContext::empty(&facts));
        assert_eq!(signal.source, SignalSource::Model);
        assert_eq!(signal.confidence, 1.0);
    }
}
