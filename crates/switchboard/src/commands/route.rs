use std::path::Path;
use std::sync::Arc;
use switchboard_core::{
    Arbiter, ArbiterConfig, ChatModel, DisabledModel, Embedder, RoutingContext, Turn,
};
use switchboard_models::{AzureConfig, CachedChatModel, FastEmbedder, HttpChatModel};
use switchboard_signals::{build_providers, DEFAULT_DRIFT_THRESHOLD, DEFAULT_VECTOR_FLOOR};

pub fn run(text: &str, catalog: Option<&Path>, last_topic: Option<&str>) -> anyhow::Result<()> {
    let catalog = super::load_catalog(catalog)?;
    let config = ArbiterConfig::from_env()?;

    let embedder: Arc<dyn Embedder> = Arc::new(FastEmbedder::new()?);
    let model = chat_model()?;
    let providers = build_providers(
        &catalog,
        embedder,
        model,
        DEFAULT_VECTOR_FLOOR,
        DEFAULT_DRIFT_THRESHOLD,
    )?;
    let arbiter = Arbiter::new(config, providers);

    let turn = Turn::text("cli-1", "cli", text);
    let ctx = RoutingContext {
        last_topic: last_topic.map(str::to_string),
        ..RoutingContext::default()
    };
    let decision = arbiter.decide(&turn, &ctx);
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

/// HTTP chat model when Azure settings are present, otherwise a model that always fails
fn chat_model() -> anyhow::Result<Arc<dyn ChatModel>> {
    match AzureConfig::from_env()? {
        Some(config) => {
            tracing::info!(deployment = %config.deployment, "using chat deployment");
            let http: Arc<dyn ChatModel> = Arc::new(HttpChatModel::new(config)?);
            Ok(Arc::new(CachedChatModel::from_env(http)?))
        }
        None => {
            tracing::info!("no chat deployment configured; model signal disabled");
            Ok(Arc::new(DisabledModel))
        }
    }
}
