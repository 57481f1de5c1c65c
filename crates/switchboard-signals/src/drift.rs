//! Topic drift detection against the session's last resolved topic

use std::sync::Arc;
use switchboard_core::{
    centroid, cosine_similarity, Catalog, Embedder, HandlerId, Signal, SignalContext,
    SignalProvider, SignalSource,
};

pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.50;

struct TopicCentroid {
    topic: String,
    owner: HandlerId,
    vector: Vec<f32>,
}

/// Flags a topic shift when the turn moves away from the last resolved topic
/// and proposes the owner of the closest other topic.
pub struct DriftProvider {
    embedder: Arc<dyn Embedder>,
    topics: Vec<TopicCentroid>,
    threshold: f64,
}

impl DriftProvider {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        catalog: &Catalog,
        threshold: f64,
    ) -> anyhow::Result<Self> {
        let mut topics = Vec::new();
        for profile in &catalog.handlers {
            let exemplars = profile.drift_exemplars();
            if exemplars.is_empty() {
                continue;
            }
            let vectors = embedder.embed(exemplars)?;
            let vector = centroid(&vectors).ok_or_else(|| {
                anyhow::anyhow!("no usable exemplar embeddings for topic `{}`", profile.topic)
            })?;
            topics.push(TopicCentroid {
                topic: profile.topic.clone(),
                owner: profile.id.clone(),
                vector,
            });
        }
        Ok(Self {
            embedder,
            topics,
            threshold,
        })
    }

    fn no_shift() -> Signal {
        Signal::null(SignalSource::Drift).with_detail("is_shift", false)
    }
}

impl SignalProvider for DriftProvider {
    fn source(&self) -> SignalSource {
        SignalSource::Drift
    }

    fn try_evaluate(&self, text: &str, ctx: &SignalContext<'_>) -> anyhow::Result<Signal> {
        let Some(last_topic) = ctx.last_topic.filter(|t| !t.is_empty()) else {
            return Ok(Self::no_shift());
        };
        let Some(anchor) = self.topics.iter().find(|t| t.topic == last_topic) else {
            return Ok(Self::no_shift().with_detail("unknown_topic", last_topic));
        };

        let current = self.embedder.embed_one(text)?;
        // Cosine is undefined for a zero vector; nothing to compare
        if current.iter().all(|x| *x == 0.0) {
            return Ok(Self::no_shift().with_detail("degenerate_embedding", true));
        }
        anyhow::ensure!(
            current.len() == anchor.vector.len(),
            "query embedding has {} dimensions, topics have {}",
            current.len(),
            anchor.vector.len()
        );

        let similarity = cosine_similarity(&anchor.vector, &current);
        let is_shift = similarity < self.threshold;

        let mut closest: Option<(&TopicCentroid, f64)> = None;
        for topic in self.topics.iter().filter(|t| t.topic != last_topic) {
            let sim = cosine_similarity(&topic.vector, &current);
            let better = match closest {
                None => true,
                Some((_, best)) => sim > best,
            };
            if better {
                closest = Some((topic, sim));
            }
        }

        tracing::debug!(
            last_topic,
            similarity,
            is_shift,
            suggest = closest.map(|(t, _)| t.topic.as_str()).unwrap_or("-"),
            "topic drift"
        );

        let signal = match (is_shift, closest) {
            (true, Some((topic, sim))) => {
                Signal::proposing(SignalSource::Drift, topic.owner.clone(), 1.0 - similarity)
                    .with_detail("suggested_topic", topic.topic.clone())
                    .with_detail("suggested_similarity", sim)
            }
            _ => Signal::null(SignalSource::Drift),
        };
        Ok(signal
            .with_detail("is_shift", is_shift)
            .with_detail("similarity", similarity))
    }
}
