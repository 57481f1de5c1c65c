//! Vector similarity against per-handler exemplar phrases

use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use switchboard_core::{
    cosine_similarity, Catalog, Embedder, HandlerId, Signal, SignalContext, SignalProvider,
    SignalSource,
};

pub const DEFAULT_VECTOR_FLOOR: f64 = 0.55;

struct HandlerExemplars {
    handler: HandlerId,
    vectors: Vec<Vec<f32>>,
}

/// Nearest-exemplar matcher. Exemplars are embedded once, at construction.
pub struct VectorProvider {
    embedder: Arc<dyn Embedder>,
    exemplars: Vec<HandlerExemplars>,
    dim: Option<usize>,
    floor: f64,
}

impl VectorProvider {
    pub fn new(embedder: Arc<dyn Embedder>, catalog: &Catalog, floor: f64) -> anyhow::Result<Self> {
        let mut exemplars = Vec::with_capacity(catalog.handlers.len());
        let mut dim = None;

        for profile in &catalog.handlers {
            if profile.exemplars.is_empty() {
                continue;
            }
            let vectors = embedder.embed(&profile.exemplars)?;
            anyhow::ensure!(
                vectors.len() == profile.exemplars.len(),
                "embedder returned {} vectors for {} exemplars of `{}`",
                vectors.len(),
                profile.exemplars.len(),
                profile.id
            );
            for v in &vectors {
                let expected = *dim.get_or_insert(v.len());
                anyhow::ensure!(
                    v.len() == expected,
                    "inconsistent embedding size {} (expected {expected})",
                    v.len()
                );
            }
            exemplars.push(HandlerExemplars {
                handler: profile.id.clone(),
                vectors,
            });
        }

        tracing::debug!(handlers = exemplars.len(), "vector exemplars embedded");
        Ok(Self {
            embedder,
            exemplars,
            dim,
            floor,
        })
    }
}

impl SignalProvider for VectorProvider {
    fn source(&self) -> SignalSource {
        SignalSource::Vector
    }

    fn try_evaluate(&self, text: &str, _ctx: &SignalContext<'_>) -> anyhow::Result<Signal> {
        if self.exemplars.is_empty() {
            return Ok(Signal::null(SignalSource::Vector));
        }

        let query = self.embedder.embed_one(text)?;
        if let Some(dim) = self.dim {
            anyhow::ensure!(
                query.len() == dim,
                "query embedding has {} dimensions, exemplars have {dim}",
                query.len()
            );
        }

        let mut scores: BTreeMap<&str, f64> = BTreeMap::new();
        let mut best: Option<(&str, f64)> = None;
        for entry in &self.exemplars {
            let score = entry
                .vectors
                .iter()
                .map(|v| cosine_similarity(&query, v))
                .fold(-1.0f64, f64::max);
            scores.insert(entry.handler.as_str(), score);
            let better = match best {
                None => true,
                Some((_, best_score)) => score > best_score,
            };
            if better {
                best = Some((entry.handler.as_str(), score));
            }
        }

        let Some((handler, score)) = best else {
            return Ok(Signal::null(SignalSource::Vector));
        };

        let signal = if score < self.floor {
            Signal::null(SignalSource::Vector)
        } else {
            Signal::proposing(SignalSource::Vector, handler, score)
        };
        Ok(signal
            .with_detail("scores", json!(scores))
            .with_detail("best_handler", handler)
            .with_detail("best_score", score))
    }
}
