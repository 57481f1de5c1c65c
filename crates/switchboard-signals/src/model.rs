//! Generative-model intent classification over a fixed label set

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use switchboard_core::{
    json_object_span, Catalog, ChatModel, ChatPrompt, FewShot, HandlerId, RoutingFault, Signal,
    SignalContext, SignalProvider, SignalSource,
};

/// How many recent messages are sent along with the turn
pub const HISTORY_LIMIT: usize = 8;

/// Parsed classifier verdict
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Classification {
    #[serde(alias = "intent")]
    pub label: String,
    pub confidence: f64,
    #[serde(default)]
    pub slots: Map<String, Value>,
}

impl Classification {
    /// Parse a raw model reply; `Err` carries the reason it is malformed.
    pub fn parse(raw: &str, labels: &[String]) -> Result<Self, RoutingFault> {
        let span = json_object_span(raw)
            .ok_or_else(|| RoutingFault::ClassificationMalformed("no JSON object".to_string()))?;
        let parsed: Classification = serde_json::from_str(span)
            .map_err(|e| RoutingFault::ClassificationMalformed(e.to_string()))?;
        if !parsed.confidence.is_finite() || !(0.0..=1.0).contains(&parsed.confidence) {
            return Err(RoutingFault::ClassificationMalformed(format!(
                "confidence {} outside [0, 1]",
                parsed.confidence
            )));
        }
        if !labels.iter().any(|l| *l == parsed.label) {
            return Err(RoutingFault::ClassificationMalformed(format!(
                "label `{}` not in the allowed set",
                parsed.label
            )));
        }
        Ok(parsed)
    }
}

pub struct ModelProvider {
    model: Arc<dyn ChatModel>,
    labels: Vec<String>,
    label_map: BTreeMap<String, HandlerId>,
    few_shots: Vec<FewShot>,
}

impl ModelProvider {
    pub fn new(model: Arc<dyn ChatModel>, catalog: &Catalog) -> Self {
        Self {
            model,
            labels: catalog.label_set(),
            label_map: catalog.label_map(),
            few_shots: catalog.few_shots.clone(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an intent classifier for a multi-agent assistant. \
             Given the user's latest message, RECENT_MESSAGES and SESSION_FACTS, return a single top intent \
             with confidence (0..1) and slots.\n\
             Return STRICT JSON with keys: {{\"label\", \"confidence\", \"slots\"}}.\n\
             Allowed labels: {}.\n\
             Rules:\n\
             - Disambiguate short follow-ups using RECENT_MESSAGES, SESSION_FACTS and LAST_TOPIC.\n\
             - Acknowledgements such as 'thanks', 'ok' or 'yes' after a resolution are smalltalk or closing.\n\
             - Only use high confidence (>0.75) when certain.\n\
             Respond with JSON only.",
            self.labels.join(", ")
        )
    }

    /// Prompt sent for one turn
    pub fn build_prompt(&self, text: &str, ctx: &SignalContext<'_>) -> ChatPrompt {
        let skip = ctx.history.len().saturating_sub(HISTORY_LIMIT);
        let few_shots: Vec<Value> = self
            .few_shots
            .iter()
            .map(|shot| {
                json!({
                    "USER_TEXT": shot.user_text,
                    "RECENT_MESSAGES": shot.recent_messages,
                    "SESSION_FACTS": shot.session_facts,
                    "LAST_TOPIC": shot.last_topic.as_deref().unwrap_or(""),
                    "EXPECT": {"label": shot.label, "confidence": shot.confidence},
                })
            })
            .collect();
        let context = json!({
            "USER_TEXT": text,
            "RECENT_MESSAGES": &ctx.history[skip..],
            "SESSION_FACTS": ctx.facts,
            "LAST_TOPIC": ctx.last_topic.unwrap_or(""),
            "PENDING_QUESTION": ctx.pending_question,
            "FEWSHOTS": few_shots,
        });
        ChatPrompt::json(
            self.system_prompt(),
            format!(
                "Classify the intent based on the following JSON context. \
                 Return {{\"label\":\"...\",\"confidence\":0..1,\"slots\":{{...}}}}.\n{context}"
            ),
        )
    }
}

impl SignalProvider for ModelProvider {
    fn source(&self) -> SignalSource {
        SignalSource::Model
    }

    fn try_evaluate(&self, text: &str, ctx: &SignalContext<'_>) -> anyhow::Result<Signal> {
        let prompt = self.build_prompt(text, ctx);
        let raw = self.model.complete(&prompt)?;

        let classification = match Classification::parse(&raw, &self.labels) {
            Ok(c) => c,
            Err(fault) => {
                tracing::warn!(error = %fault, "classifier output rejected");
                return Ok(Signal::null(SignalSource::Model)
                    .with_detail("fault", fault.code())
                    .with_detail("error", fault.to_string()));
            }
        };

        tracing::debug!(
            label = %classification.label,
            confidence = classification.confidence,
            "model intent"
        );

        let signal = match self.label_map.get(&classification.label) {
            Some(handler) => {
                Signal::proposing(SignalSource::Model, handler.clone(), classification.confidence)
            }
            None => Signal::null(SignalSource::Model)
                .with_detail("raw_confidence", classification.confidence),
        };
        Ok(signal
            .with_detail("label", classification.label)
            .with_detail("slots", Value::Object(classification.slots)))
    }
}
