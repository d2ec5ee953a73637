#![allow(dead_code)]
/// Shared test fixtures: in-process embedding transports and configs
use async_trait::async_trait;
use ragkit::chunking::Document;
use ragkit::config::Config;
use ragkit::embedding::{EmbeddingConfig, EmbeddingError, EmbeddingTransport, InputFormat};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Dimension of the concept space
pub const CONCEPT_DIM: usize = 12;

/// Map a token to its concept axis; synonyms share an axis
fn concept(token: &str) -> Option<usize> {
    match token {
        "car" | "automobile" | "vehicle" => Some(0),
        "engine" | "motor" => Some(1),
        "oil" => Some(2),
        "bread" | "loaf" | "sourdough" => Some(3),
        "crust" => Some(4),
        "crackling" => Some(5),
        "oven" => Some(6),
        "telescope" => Some(7),
        "galaxy" => Some(8),
        "starter" => Some(9),
        "tire" | "tires" => Some(10),
        "redshift" => Some(11),
        _ => None,
    }
}

/// Bag-of-concepts embedding; texts without known words embed to zero
pub fn concept_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; CONCEPT_DIM];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if let Some(axis) = concept(token) {
            vector[axis] += 1.0;
        }
    }
    vector
}

fn input_texts(body: &Value) -> Vec<String> {
    body["input"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|t| t.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Deterministic "semantic" provider answering in the `embeddings` layout
///
/// Expects `InputFormat::Flat` request bodies.
#[derive(Default)]
pub struct ConceptTransport {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingTransport for ConceptTransport {
    async fn send(&self, body: &Value) -> Result<Value, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let vectors: Vec<Vec<f32>> = input_texts(body).iter().map(|t| concept_vector(t)).collect();
        Ok(json!({ "embeddings": vectors }))
    }
}

/// Provider that is always unreachable
pub struct DownTransport;

#[async_trait]
impl EmbeddingTransport for DownTransport {
    async fn send(&self, _body: &Value) -> Result<Value, EmbeddingError> {
        Err(EmbeddingError::Transport("connection refused".to_string()))
    }
}

/// Provider that fails every request containing one of `poisoned`
///
/// Successful responses use `[text length, 1, 0, ...]` vectors.
pub struct PoisonedTransport {
    pub dimension: usize,
    pub poisoned: Vec<String>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl PoisonedTransport {
    pub fn new(dimension: usize, poisoned: &[&str]) -> Self {
        Self {
            dimension,
            poisoned: poisoned.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl EmbeddingTransport for PoisonedTransport {
    async fn send(&self, body: &Value) -> Result<Value, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let texts = input_texts(body);
        if texts.iter().any(|t| self.poisoned.contains(t)) {
            return Err(EmbeddingError::Transport("HTTP 503: overloaded".to_string()));
        }

        let vectors: Vec<Vec<f32>> = texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; self.dimension];
                v[0] = t.chars().count() as f32;
                v[1] = 1.0;
                v
            })
            .collect();
        Ok(json!({ "embeddings": vectors }))
    }
}

/// Fast-retrying adapter config for in-process transports
pub fn embedding_config(dimension: usize, batch_size: usize, max_retries: u32) -> EmbeddingConfig {
    EmbeddingConfig {
        dimension,
        batch_size,
        max_retries,
        retry_delay_ms: 1,
        input_format: InputFormat::Flat,
        ..EmbeddingConfig::default()
    }
}

/// Knowledge base config over the concept space
pub fn concept_config() -> Config {
    let mut config = Config::default();
    config.embedding = embedding_config(CONCEPT_DIM, 4, 1);
    config.chunking.max_length = 100;
    config.chunking.overlap = 20;
    config
}

/// Three documents that each split into two chunks at 100/20
pub fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "cars",
            "Regular oil changes keep a car engine healthy for years.\n\n\
             Rotate the tires every season so the treads wear evenly and grip well.",
        ),
        Document::new(
            "cooking",
            "Sourdough bread needs a lively starter and patient proofing.\n\n\
             Bake the loaf in a hot dutch oven for a crackling crust.",
        )
        .with_metadata("category", "food"),
        Document::new(
            "space",
            "The telescope captured faint light from a distant galaxy.\n\n\
             Astronomers measured redshift to estimate how fast it recedes.",
        ),
    ]
}
