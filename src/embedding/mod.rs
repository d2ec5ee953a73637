mod adapter;
/// Embedding adapter for remote, non-standard embedding providers
///
/// This module turns ordered text batches into fixed-dimension vectors.
/// Architecture:
/// - EmbeddingProvider trait: the stable vector-production contract
/// - EmbeddingTransport trait: one request/response exchange with a provider
/// - HttpTransport: reqwest-backed transport (POST <api_base>/embeddings)
/// - Schema detection: ordered list of known response layouts
/// - Per-batch retry state machine with zero-vector fallback
mod provider;
mod retry;
mod schema;
mod transport;

pub use adapter::{AdapterStats, EmbeddedBatch, EmbeddingAdapter, StatsSnapshot};
pub use provider::EmbeddingProvider;
pub use retry::{BackoffPolicy, BatchState};
pub use schema::{detect_vectors, ResponseShape};
pub use transport::{build_request_body, EmbeddingTransport, HttpTransport};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on configured retries per batch
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("Invalid embedding configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unrecognized response schema: {0}")]
    Schema(String),
}

impl EmbeddingError {
    /// Whether the adapter retries this error (and falls back once exhausted)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Schema(_))
    }
}

/// Shape of the `input` field sent to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// `"input": ["text 1", "text 2"]`
    Flat,
    /// `"input": {"contents": [{"text": "text 1"}, ...]}`
    Contents,
    /// `"input": [{"text": "text 1"}, ...]`
    TextObjects,
}

/// Configuration for the embedding adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider base URL (e.g., "http://localhost:9015/v1")
    pub api_base: String,
    /// Path appended to `api_base`
    pub endpoint_path: String,
    /// Environment variable holding the bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Model name sent with every request
    pub model: String,
    /// Embedding dimension, fixed for the adapter's lifetime
    pub dimension: usize,
    /// Texts per provider request
    pub batch_size: usize,
    /// Retries after the first failed attempt of a batch
    pub max_retries: u32,
    /// Delay policy between attempts
    pub backoff: BackoffPolicy,
    /// Base delay between attempts
    pub retry_delay_ms: u64,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Batches in flight at once (1 = sequential)
    pub concurrency: usize,
    /// Request body layout
    pub input_format: InputFormat,
    /// Deadline for a whole embed call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:9015/v1".to_string(),
            endpoint_path: "/embeddings".to_string(),
            api_key_env: None,
            model: "multimodal-embedding-v1".to_string(),
            dimension: 1536,
            batch_size: 10,
            max_retries: 3,
            backoff: BackoffPolicy::Fixed,
            retry_delay_ms: 1000,
            timeout_secs: 60,
            concurrency: 1,
            input_format: InputFormat::Contents,
            deadline_secs: None,
        }
    }
}

impl EmbeddingConfig {
    /// Fail fast on values the adapter cannot run with
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "dimension must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(EmbeddingError::InvalidConfig(format!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, self.max_retries
            )));
        }
        if self.model.is_empty() {
            return Err(EmbeddingError::InvalidConfig(
                "model cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Full provider URL
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        )
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// True when every component is exactly zero (the fallback sentinel)
pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}
