//! Local sentence embeddings via fastembed

use fastembed::TextEmbedding;
use std::sync::Mutex;
use switchboard_core::Embedder;

/// Default fastembed model, loaded (and downloaded on first use) at construction.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedder {
    pub fn new() -> anyhow::Result<Self> {
        let model = TextEmbedding::try_new(Default::default())
            .map_err(|e| anyhow::anyhow!("failed to load embedding model: {e}"))?;
        tracing::info!("embedding model loaded");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow::anyhow!("embedding model lock poisoned"))?;
        let vectors = model
            .embed(texts.to_vec(), None)
            .map_err(|e| anyhow::anyhow!("embedding failed: {e}"))?;
        anyhow::ensure!(
            vectors.len() == texts.len(),
            "embedding model returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        );
        Ok(vectors)
    }
}
