use std::path::Path;
use switchboard_core::{ArbiterConfig, EscalationConfig, SessionConfig};
use switchboard_signals::{DEFAULT_DRIFT_THRESHOLD, DEFAULT_VECTOR_FLOOR};

pub fn run(catalog: Option<&Path>) -> anyhow::Result<()> {
    let output = effective(catalog)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn effective(catalog: Option<&Path>) -> anyhow::Result<serde_json::Value> {
    let catalog = super::load_catalog(catalog)?;
    Ok(serde_json::json!({
        "arbiter": ArbiterConfig::from_env()?,
        "escalation": EscalationConfig::from_env()?,
        "session": SessionConfig::from_env()?,
        "vector_floor": DEFAULT_VECTOR_FLOOR,
        "drift_threshold": DEFAULT_DRIFT_THRESHOLD,
        "labels": catalog.label_set(),
        "catalog": catalog,
    }))
}
