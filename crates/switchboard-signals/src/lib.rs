//! Signal providers: lexical patterns, exemplar similarity, model classification and topic drift

mod drift;
mod lexical;
mod model;
mod vector;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use drift::{DriftProvider, DEFAULT_DRIFT_THRESHOLD};
pub use lexical::LexicalProvider;
pub use model::{Classification, ModelProvider, HISTORY_LIMIT};
pub use vector::{VectorProvider, DEFAULT_VECTOR_FLOOR};

use std::sync::Arc;
use switchboard_core::{Catalog, ChatModel, Embedder, Providers};

/// Build the four standard providers for a catalog.
///
/// Exemplars and topic centroids are embedded here, once.
pub fn build_providers(
    catalog: &Catalog,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    vector_floor: f64,
    drift_threshold: f64,
) -> anyhow::Result<Providers> {
    Ok(Providers {
        lexical: Box::new(LexicalProvider::new(catalog)?),
        vector: Box::new(VectorProvider::new(embedder.clone(), catalog, vector_floor)?),
        model: Box::new(ModelProvider::new(model, catalog)),
        drift: Box::new(DriftProvider::new(embedder, catalog, drift_threshold)?),
    })
}
