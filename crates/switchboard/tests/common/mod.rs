#![allow(dead_code)]

use std::sync::Arc;
use switchboard_core::{Arbiter, ArbiterConfig, Catalog, Embedder, RoutingContext, Turn};
use switchboard_signals::testing::{KeywordEmbedder, ScriptedModel};
use switchboard_signals::{build_providers, DEFAULT_DRIFT_THRESHOLD, DEFAULT_VECTOR_FLOOR};

pub fn arbiter_with(embedder: Arc<dyn Embedder>, model: Arc<ScriptedModel>) -> Arbiter {
    let providers = build_providers(
        &Catalog::banking(),
        embedder,
        model,
        DEFAULT_VECTOR_FLOOR,
        DEFAULT_DRIFT_THRESHOLD,
    )
    .unwrap();
    Arbiter::new(ArbiterConfig::new(), providers)
}

/// Banking catalog with the keyword embedder and a model that always fails
pub fn banking_arbiter() -> Arbiter {
    arbiter_with(
        Arc::new(KeywordEmbedder::banking()),
        Arc::new(ScriptedModel::new(Vec::<String>::new())),
    )
}

pub fn turn(text: &str) -> Turn {
    Turn::text("t1", "s1", text)
}

pub fn after_topic(topic: &str) -> RoutingContext {
    RoutingContext {
        last_topic: Some(topic.to_string()),
        ..RoutingContext::default()
    }
}
