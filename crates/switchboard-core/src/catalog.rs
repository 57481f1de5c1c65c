//! Handler catalog: the immutable per-handler routing data built at startup

use crate::error::ConfigError;
use crate::types::{Facts, HandlerId, HistoryMessage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Classifier labels that never map to a handler
pub const RESERVED_LABELS: [&str; 3] = ["smalltalk", "closing", "other"];

/// Routing data for one handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerProfile {
    pub id: HandlerId,

    /// Topic tag this handler resolves (drift compares against it)
    pub topic: String,

    /// Ordered lexical patterns (regex, matched case-insensitively)
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Example phrases for vector matching
    #[serde(default)]
    pub exemplars: Vec<String>,

    /// Descriptions of the topic for drift detection; exemplars are used when empty
    #[serde(default)]
    pub topic_exemplars: Vec<String>,

    /// Classifier labels owned by this handler
    #[serde(default)]
    pub labels: Vec<String>,
}

impl HandlerProfile {
    pub fn drift_exemplars(&self) -> &[String] {
        if self.topic_exemplars.is_empty() {
            &self.exemplars
        } else {
            &self.topic_exemplars
        }
    }
}

/// Worked example handed to the model classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShot {
    pub user_text: String,
    #[serde(default)]
    pub recent_messages: Vec<HistoryMessage>,
    #[serde(default)]
    pub session_facts: Facts,
    #[serde(default)]
    pub last_topic: Option<String>,
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub handlers: Vec<HandlerProfile>,
    #[serde(default)]
    pub few_shots: Vec<FewShot>,
}

impl Catalog {
    pub fn new(handlers: Vec<HandlerProfile>) -> Self {
        Self {
            handlers,
            few_shots: Vec::new(),
        }
    }

    /// Load a catalog from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for handler in &self.handlers {
            if !seen.insert(handler.id.as_str()) {
                return Err(ConfigError::DuplicateHandler(handler.id.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&HandlerProfile> {
        self.handlers.iter().find(|h| h.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn handler_ids(&self) -> Vec<HandlerId> {
        self.handlers.iter().map(|h| h.id.clone()).collect()
    }


    /// Static label -> handler table for the model classifier
    pub fn label_map(&self) -> BTreeMap<String, HandlerId> {
        let mut map = BTreeMap::new();
        for handler in &self.handlers {
            for label in &handler.labels {
                map.entry(label.clone()).or_insert_with(|| handler.id.clone());
            }
        }
        map
    }

    /// Full label set offered to the classifier: handler labels, then reserved ones
    pub fn label_set(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for handler in &self.handlers {
            for label in &handler.labels {
                if !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }
        for reserved in RESERVED_LABELS {
            if !labels.iter().any(|l| l == reserved) {
                labels.push(reserved.to_string());
            }
        }
        labels
    }

    /// Card control, appointment booking and FAQ handlers
    pub fn banking() -> Self {
        let handlers = vec![
            HandlerProfile {
                id: "agent-card-control".to_string(),
                topic: "card_block".to_string(),
                patterns: strings(&[
                    r"\b(block|freeze|lock)\b",
                    r"\b(card|stolen|lost|fraud)\b",
                    r"\b(replacement|reissue)\b",
                ]),
                exemplars: strings(&[
                    "my card is lost",
                    "stolen card",
                    "block my card",
                    "freeze my card",
                    "fraud on my card",
                    "order a replacement",
                    "order a new one",
                ]),
                topic_exemplars: strings(&[
                    "block or freeze a payment card due to lost stolen or fraud",
                ]),
                labels: strings(&["card_block", "card_replacement"]),
            },
            HandlerProfile {
                id: "agent-appointment".to_string(),
                topic: "appointment_booking".to_string(),
                patterns: strings(&[r"\b(appointment|schedule|book|meeting|visit)\b"]),
                exemplars: strings(&[
                    "book an appointment",
                    "schedule a meeting",
                    "branch visit tomorrow",
                    "set up a visit",
                    "book a slot",
                ]),
                topic_exemplars: strings(&["book or schedule a branch appointment"]),
                labels: strings(&["appointment_booking"]),
            },
            HandlerProfile {
                id: "agent-faq".to_string(),
                topic: "faq".to_string(),
                patterns: strings(&[r"\b(limit|fees?|cutoff|how (do|to)|where|what)\b"]),
                exemplars: strings(&[
                    "what is atm limit",
                    "how much can I withdraw",
                    "transfer cutoff time",
                    "fees and limits",
                ]),
                topic_exemplars: strings(&["ask general banking information limits fees rates"]),
                labels: strings(&["faq"]),
            },
        ];

        let mut blocked = Facts::new();
        blocked.insert("card_blocked".to_string(), serde_json::Value::Bool(true));

        let few_shots = vec![
            FewShot {
                user_text: "order a new one please".to_string(),
                recent_messages: vec![HistoryMessage::assistant("Your card is now blocked.")],
                session_facts: blocked,
                last_topic: Some("card_block".to_string()),
                label: "card_replacement".to_string(),
                confidence: 0.85,
            },
            FewShot {
                user_text: "book me a slot at the branch".to_string(),
                recent_messages: Vec::new(),
                session_facts: Facts::new(),
                last_topic: None,
                label: "appointment_booking".to_string(),
                confidence: 0.8,
            },
            FewShot {
                user_text: "ok thanks".to_string(),
                recent_messages: vec![HistoryMessage::assistant("Resolved.")],
                session_facts: Facts::new(),
                last_topic: Some("card_block".to_string()),
                label: "smalltalk".to_string(),
                confidence: 0.8,
            },
        ];

        Self {
            handlers,
            few_shots,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
