//! Escalation tier: a bounded generative continue / handoff / clarify decision

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use switchboard_core::{
    json_object_span, Catalog, ChatModel, ChatPrompt, ClarifyPayload,
    EscalationConfig, HandlerId, Route, RoutingFault, Turn,
};

const SYSTEM: &str = "Routing supervisor for a multi-agent assistant. \
Decide to CONTINUE with the current agent, HANDOFF to another agent, or CLARIFY.\n\
Rules:\n\
- If the user's new message is an acknowledgement, thanks or closure, do NOT ask follow-ups.\n\
- If the message needs a clearly different capability than the active topic, HANDOFF to the best agent.\n\
- If on-topic, CONTINUE with the current agent.\n\
- If unclear, CLARIFY with one short question.\n\
Return STRICT JSON: {\"decision\":\"continue|handoff|clarify\",\"agent\":null|\"agent-name\",\"confidence\":0..1,\"question\":null|\"...\"}.";

/// The arbiter's best guess, passed along as a hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorSuggestion {
    pub handler: HandlerId,
    pub confidence: f64,
}

/// Escalation result; `fault` is set when the tier fell back to the generic question.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub route: Route,
    pub confidence: f64,
    pub rounds: u32,
    pub fault: Option<RoutingFault>,
}

impl Escalation {
    pub fn handler(&self) -> Option<&str> {
        self.route.handler()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Verdict {
    Continue,
    Handoff,
    Clarify,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    decision: Verdict,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    question: Option<String>,
}

pub struct Escalator {
    model: Arc<dyn ChatModel>,
    handlers: Vec<HandlerId>,
    config: EscalationConfig,
}

impl Escalator {
    pub fn new(model: Arc<dyn ChatModel>, catalog: &Catalog, config: EscalationConfig) -> Self {
        Self {
            model,
            handlers: catalog.handler_ids(),
            config,
        }
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    /// Whether an arbiter confidence is low enough to call the tier
    pub fn should_escalate(&self, confidence: f64) -> bool {
        confidence < self.config.escalate_below
    }

    /// Ask the model for a verdict, feeding back rejected replies until
    /// `max_rounds` is spent. Never fails: the fallback is the generic question.
    pub fn escalate(
        &self,
        turn: &Turn,
        active_handler: Option<&str>,
        active_topic: Option<&str>,
        prior: Option<&PriorSuggestion>,
    ) -> Escalation {
        let mut rejected: Vec<serde_json::Value> = Vec::new();
        let mut rounds = 0;

        while rounds < self.config.max_rounds {
            rounds += 1;
            let prompt = self.build_prompt(turn, active_handler, active_topic, prior, &rejected);
            let raw = match self.model.complete(&prompt) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(
                        turn_id = %turn.turn_id,
                        round = rounds,
                        error = %e,
                        "escalation model call failed"
                    );
                    break;
                }
            };

            match self.interpret(&raw, active_handler) {
                Ok((route, confidence)) => {
                    tracing::info!(
                        turn_id = %turn.turn_id,
                        stage = "escalation",
                        handler = route.handler().unwrap_or("-"),
                        clarify = route.clarify().is_some(),
                        confidence,
                        rounds,
                        "escalation verdict"
                    );
                    return Escalation {
                        route,
                        confidence,
                        rounds,
                        fault: None,
                    };
                }
                Err(reason) => {
                    tracing::debug!(round = rounds, %reason, "escalation reply rejected");
                    rejected.push(json!({"reply": raw, "problem": reason}));
                }
            }
        }

        let fault = RoutingFault::EscalationExhausted { rounds };
        tracing::warn!(turn_id = %turn.turn_id, error = %fault, "escalation fell back to clarify");
        Escalation {
            route: Route::Clarify(ClarifyPayload::new(self.config.clarify_question.clone())),
            confidence: 0.0,
            rounds,
            fault: Some(fault),
        }
    }

    fn build_prompt(
        &self,
        turn: &Turn,
        active_handler: Option<&str>,
        active_topic: Option<&str>,
        prior: Option<&PriorSuggestion>,
        rejected: &[serde_json::Value],
    ) -> ChatPrompt {
        let mut context = json!({
            "TEXT": turn.trimmed_text(),
            "ACTIVE_AGENT": active_handler,
            "ACTIVE_TOPIC": active_topic,
            "AGENTS": self.handlers,
            "SEM_SUGGESTION": prior,
        });
        if !rejected.is_empty() {
            context["REJECTED_REPLIES"] = json!(rejected);
        }
        ChatPrompt::json(
            SYSTEM,
            format!("Decide routing for this message based on context and rules:\n{context}"),
        )
    }

    /// Validate one raw reply against the verdict rules.
    fn interpret(&self, raw: &str, active_handler: Option<&str>) -> Result<(Route, f64), String> {
        let span = json_object_span(raw).ok_or_else(|| "reply is not a JSON object".to_string())?;
        let verdict: RawVerdict =
            serde_json::from_str(span).map_err(|e| format!("invalid verdict: {e}"))?;

        let confidence = match verdict.confidence {
            None => 0.0,
            Some(c) if c.is_finite() && (0.0..=1.0).contains(&c) => c,
            Some(c) => return Err(format!("confidence {c} outside [0, 1]")),
        };

        match verdict.decision {
            Verdict::Continue => active_handler
                .map(|h| (Route::Handler(h.to_string()), confidence))
                .ok_or_else(|| "continue requires an active agent and there is none".to_string()),
            Verdict::Handoff => {
                let agent = verdict
                    .agent
                    .filter(|a| !a.trim().is_empty())
                    .ok_or_else(|| "handoff must name an agent".to_string())?;
                if self.handlers.iter().any(|h| *h == agent) {
                    Ok((Route::Handler(agent), confidence))
                } else {
                    Err(format!(
                        "agent `{agent}` does not exist; choose one of {}",
                        self.handlers.join(", ")
                    ))
                }
            }
            Verdict::Clarify => {
                let question = verdict
                    .question
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .unwrap_or_else(|| self.config.clarify_question.clone());
                Ok((Route::Clarify(ClarifyPayload::new(question)), confidence))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_signals::testing::ScriptedModel;

    fn escalator(model: Arc<ScriptedModel>) -> Escalator {
        Escalator::new(model, &Catalog::banking(), EscalationConfig::new())
    }

    fn turn(text: &str) -> Turn {
        Turn::text("t1", "s1", text)
    }

    #[test]
    fn test_should_escalate_threshold() {
        let esc = escalator(Arc::new(ScriptedModel::new(Vec::<String>::new())));
        assert!(esc.should_escalate(0.0));
        assert!(esc.should_escalate(0.74));
        assert!(!esc.should_escalate(0.75));
        assert!(!esc.should_escalate(0.9));
    }

    #[test]
    fn test_handoff_to_catalog_handler() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"decision":"handoff","agent":"agent-appointment","confidence":0.8,"question":null}"#,
        ]));
        let result = escalator(model).escalate(&turn("book a visit"), None, None, None);
        assert_eq!(result.handler(), Some("agent-appointment"));
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.rounds, 1);
        assert!(result.fault.is_none());
    }

    #[test]
    fn test_continue_returns_active_handler() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"decision":"continue","agent":null,"confidence":0.7}"#,
        ]));
        let result = escalator(model).escalate(
            &turn("and the other one too"),
            Some("agent-card-control"),
            Some("card_block"),
            None,
        );
        assert_eq!(result.handler(), Some("agent-card-control"));
    }

    #[test]
    fn test_clarify_without_question_gets_generic() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"decision":"clarify","agent":null,"confidence":0.4,"question":null}"#,
        ]));
        let result = escalator(model).escalate(&turn("hmm"), None, None, None);
        assert_eq!(
            result.route.clarify().map(|c| c.question.as_str()),
            Some("Could you clarify what you need?")
        );
        assert!(result.fault.is_none());
    }

    #[test]
    fn test_clarify_keeps_model_question() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"decision":"clarify","question":"Which card do you mean?","confidence":0.5}"#,
        ]));
        let result = escalator(model).escalate(&turn("that one"), None, None, None);
        assert_eq!(
            result.route.clarify().map(|c| c.question.as_str()),
            Some("Which card do you mean?")
        );
    }

    #[test]
    fn test_invalid_replies_are_fed_back() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"decision":"continue","confidence":0.9}"#,
            r#"{"decision":"handoff","agent":"agent-mortgage","confidence":0.9}"#,
            r#"{"decision":"handoff","agent":"agent-faq","confidence":0.85}"#,
        ]));
        let result = escalator(model.clone()).escalate(&turn("what are the fees"), None, None, None);
        assert_eq!(result.handler(), Some("agent-faq"));
        assert_eq!(result.rounds, 3);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(!prompts[0].user.contains("REJECTED_REPLIES"));
        assert!(prompts[1].user.contains("continue requires an active agent"));
        assert!(prompts[2].user.contains("agent-mortgage"));
    }

    #[test]
    fn test_exhausted_rounds_fall_back() {
        let model = Arc::new(ScriptedModel::new(["nope", "still nope", "{}", "unused"]));
        let result = escalator(model.clone()).escalate(&turn("???"), None, None, None);
        assert_eq!(
            result.route.clarify().map(|c| c.question.as_str()),
            Some("Could you clarify what you need?")
        );
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.fault, Some(RoutingFault::EscalationExhausted { rounds: 3 }));
        assert_eq!(model.calls(), 3);
    }

    #[test]
    fn test_model_error_falls_back() {
        let model = Arc::new(ScriptedModel::new(Vec::<String>::new()).then_fail("timeout"));
        let result = escalator(model).escalate(&turn("help"), None, None, None);
        assert!(result.route.clarify().is_some());
        assert_eq!(result.fault, Some(RoutingFault::EscalationExhausted { rounds: 1 }));
    }

    #[test]
    fn test_prior_suggestion_in_prompt() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"decision":"handoff","agent":"agent-faq","confidence":0.8}"#,
        ]));
        let prior = PriorSuggestion {
            handler: "agent-faq".to_string(),
            confidence: 0.6,
        };
        escalator(model.clone()).escalate(&turn("fees?"), None, Some("card_block"), Some(&prior));
        let prompt = &model.prompts()[0];
        assert!(prompt.json_mode);
        assert!(prompt.user.contains("\"SEM_SUGGESTION\":{\"confidence\":0.6,\"handler\":\"agent-faq\"}"));
        assert!(prompt.user.contains("\"ACTIVE_TOPIC\":\"card_block\""));
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"decision":"handoff","agent":"agent-faq","confidence":7}"#,
            r#"{"decision":"handoff","agent":"agent-faq","confidence":0.7}"#,
        ]));
        let result = escalator(model).escalate(&turn("fees"), None, None, None);
        assert_eq!(result.rounds, 2);
        assert_eq!(result.confidence, 0.7);
    }
}
