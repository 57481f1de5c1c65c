//! Embedding and chat model adapters for the router's capability traits

mod cache;
mod chat;
mod embed;

pub use cache::{CachedChatModel, DEFAULT_CACHE_TTL_SECS};
pub use chat::{AzureConfig, HttpChatModel};
pub use embed::FastEmbedder;
