pub mod config;
pub mod route;
pub mod version;

use std::path::Path;
use switchboard_core::Catalog;

/// Catalog from a JSON file, or the built-in banking catalog
pub(crate) fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
    match path {
        Some(path) => Catalog::load(path),
        None => Ok(Catalog::banking()),
    }
}
