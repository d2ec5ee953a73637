/// Embedding provider trait
use async_trait::async_trait;

/// Trait for embedding providers
///
/// The stable vector-production contract consumed by ingestion and
/// retrieval. Implementations never fail: degraded output is reported
/// through their own channels (see `EmbeddingAdapter::stats`).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single query text
    async fn embed_query(&self, text: &str) -> Vec<f32>;

    /// Generate embeddings for many texts, one per input, same order
    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}
