//! External model capabilities consumed by the router

use serde::{Deserialize, Serialize};

/// Text embedding capability: one fixed-length vector per input string
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Prompt for a generative model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
    /// Ask the model for a JSON object response
    pub json_mode: bool,
    pub temperature: f32,
}

impl ChatPrompt {
    pub fn json(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json_mode: true,
            temperature: 0.0,
        }
    }

    /// Cache key covering everything that influences the response
    pub fn cache_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.system, self.user, self.json_mode, self.temperature
        )
    }
}

/// Generative model capability returning raw assistant text
pub trait ChatModel: Send + Sync {
    fn complete(&self, prompt: &ChatPrompt) -> anyhow::Result<String>;
}

/// Model used when no generative backend is configured; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledModel;

impl ChatModel for DisabledModel {
    fn complete(&self, _prompt: &ChatPrompt) -> anyhow::Result<String> {
        anyhow::bail!("no chat model configured")
    }
}

/// The outermost `{...}` span of a model reply, tolerating code fences and prose.
pub fn json_object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Cosine similarity clamped to [-1, 1]; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm_a < 1e-8 || norm_b < 1e-8 {
        return 0.0;
    }
    let sim = dot / (norm_a * norm_b);
    if sim.is_nan() {
        0.0
    } else {
        sim.clamp(-1.0, 1.0)
    }
}

/// Element-wise mean of equally sized vectors
pub fn centroid(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dim = first.len();
    if vectors.iter().any(|v| v.len() != dim) {
        return None;
    }
    let mut sum = vec![0.0f32; dim];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    Some(sum.into_iter().map(|x| x / n).collect())
}
