//! Batching, retrying, fail-soft embedding adapter

use super::{
    build_request_body, detect_vectors, BatchState, EmbeddingConfig, EmbeddingError,
    EmbeddingProvider, EmbeddingTransport, HttpTransport,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Failure and retry counters, shared by all calls on one adapter
#[derive(Debug, Default)]
pub struct AdapterStats {
    batches_succeeded: AtomicU64,
    batches_failed: AtomicU64,
    retries: AtomicU64,
    texts_degraded: AtomicU64,
}

/// Point-in-time copy of `AdapterStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub batches_succeeded: u64,
    pub batches_failed: u64,
    pub retries: u64,
    pub texts_degraded: u64,
}

impl AdapterStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches_succeeded: self.batches_succeeded.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            texts_degraded: self.texts_degraded.load(Ordering::Relaxed),
        }
    }
}

/// Vectors for one `embed_batch` call plus which of them are fallbacks
#[derive(Debug, Clone)]
pub struct EmbeddedBatch {
    pub vectors: Vec<Vec<f32>>,
    /// `degraded[i]` is true when `vectors[i]` is a zero-vector fallback
    pub degraded: Vec<bool>,
}

impl EmbeddedBatch {
    pub fn degraded_count(&self) -> usize {
        self.degraded.iter().filter(|d| **d).count()
    }
}

/// Terminal outcome of one batch
enum BatchOutcome {
    Success(Vec<Vec<f32>>),
    Fallback,
}

/// Embedding adapter over an `EmbeddingTransport`
///
/// Partitions input into `batch_size` batches, sends one request per batch
/// (up to `concurrency` in flight), detects the response layout, retries
/// failed batches and substitutes zero vectors for batches that exhaust
/// their retries. Output always has the input's length and order.
pub struct EmbeddingAdapter {
    config: EmbeddingConfig,
    transport: Arc<dyn EmbeddingTransport>,
    stats: AdapterStats,
}

impl EmbeddingAdapter {
    /// Create an adapter over a custom transport
    pub fn new(
        config: EmbeddingConfig,
        transport: Arc<dyn EmbeddingTransport>,
    ) -> Result<Self, EmbeddingError> {
        config.validate()?;

        info!(
            "Initializing embedding adapter: {} ({}D, batch size {}, {} retries, concurrency {})",
            config.model, config.dimension, config.batch_size, config.max_retries, config.concurrency
        );

        Ok(Self {
            config,
            transport,
            stats: AdapterStats::default(),
        })
    }

    /// Create an adapter talking HTTP to `config.endpoint_url()`
    pub fn from_config(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::new(config, Arc::new(transport))
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.config.dimension]
    }

    /// Embed texts, reporting which outputs are fallbacks
    ///
    /// `deadline` bounds the whole call (defaults to `deadline_secs` from
    /// configuration). Batches not finished by then are abandoned and
    /// treated as failed.
    pub async fn embed_batch_detailed(
        &self,
        texts: &[String],
        deadline: Option<Instant>,
    ) -> EmbeddedBatch {
        if texts.is_empty() {
            return EmbeddedBatch {
                vectors: Vec::new(),
                degraded: Vec::new(),
            };
        }

        let batches: Vec<&[String]> = texts.chunks(self.config.batch_size).collect();
        let mut slots: Vec<Option<BatchOutcome>> = batches.iter().map(|_| None).collect();
        let deadline = deadline.or_else(|| self.config.deadline().map(|d| Instant::now() + d));

        debug!(
            "Embedding {} texts in {} batches",
            texts.len(),
            batches.len()
        );

        // Collected eagerly: a lazy `map` over borrowed batches fails the
        // `Send` bound of the async_trait futures
        let jobs: Vec<_> = batches
            .iter()
            .copied()
            .enumerate()
            .map(|(index, batch)| async move { (index, self.run_batch(index, batch).await) })
            .collect();
        let mut pending = stream::iter(jobs).buffer_unordered(self.config.concurrency);

        match deadline {
            Some(deadline) => {
                let expired = tokio::time::sleep_until(deadline);
                tokio::pin!(expired);
                loop {
                    tokio::select! {
                        next = pending.next() => match next {
                            Some((index, outcome)) => slots[index] = Some(outcome),
                            None => break,
                        },
                        _ = &mut expired => {
                            warn!("Embedding deadline exceeded, abandoning unfinished batches");
                            break;
                        }
                    }
                }
            }
            None => {
                while let Some((index, outcome)) = pending.next().await {
                    slots[index] = Some(outcome);
                }
            }
        }
        drop(pending);

        let mut vectors = Vec::with_capacity(texts.len());
        let mut degraded = Vec::with_capacity(texts.len());

        for (index, (batch, slot)) in batches.iter().zip(slots).enumerate() {
            match slot {
                Some(BatchOutcome::Success(batch_vectors)) => {
                    vectors.extend(batch_vectors);
                    degraded.extend(std::iter::repeat(false).take(batch.len()));
                }
                Some(BatchOutcome::Fallback) => {
                    vectors.extend((0..batch.len()).map(|_| self.zero_vector()));
                    degraded.extend(std::iter::repeat(true).take(batch.len()));
                }
                None => {
                    self.record_fallback(batch.len());
                    warn!(
                        "Batch {} did not finish before the deadline, using zero vectors",
                        index
                    );
                    vectors.extend((0..batch.len()).map(|_| self.zero_vector()));
                    degraded.extend(std::iter::repeat(true).take(batch.len()));
                }
            }
        }

        EmbeddedBatch { vectors, degraded }
    }

    /// Drive one batch through the retry state machine
    async fn run_batch(&self, index: usize, texts: &[String]) -> BatchOutcome {
        let mut state = BatchState::Pending;

        loop {
            state = match state {
                BatchState::Requesting { attempt } => {
                    let result = self.request(texts).await;
                    BatchState::after_attempt(attempt, result, self.config.max_retries)
                }
                BatchState::Retrying { attempt, ref error } => {
                    let delay = self
                        .config
                        .backoff
                        .delay(self.config.retry_delay(), attempt);
                    warn!(
                        "Batch {} attempt {}/{} failed: {}; retrying in {:?}",
                        index,
                        attempt,
                        self.config.max_retries + 1,
                        error,
                        delay
                    );
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    state.advance()
                }
                BatchState::Exhausted {
                    attempts,
                    ref error,
                } => {
                    warn!(
                        "Batch {} failed after {} attempts: {}; using zero vectors for {} texts",
                        index,
                        attempts,
                        error,
                        texts.len()
                    );
                    self.record_fallback(texts.len());
                    state.advance()
                }
                BatchState::Success { vectors, attempts } => {
                    debug!("Batch {} embedded in {} attempt(s)", index, attempts);
                    self.stats.batches_succeeded.fetch_add(1, Ordering::Relaxed);
                    return BatchOutcome::Success(vectors);
                }
                BatchState::Fallback { .. } => return BatchOutcome::Fallback,
                BatchState::Pending => state.advance(),
            };
        }
    }

    fn record_fallback(&self, texts: usize) {
        self.stats.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .texts_degraded
            .fetch_add(texts as u64, Ordering::Relaxed);
    }

    /// One request: build body, send, detect schema
    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = build_request_body(&self.config.model, texts, self.config.input_format);
        let response = self.transport.send(&body).await?;
        let (shape, vectors) = detect_vectors(&response, texts.len(), self.config.dimension)?;
        debug!("Detected response shape {:?}", shape);
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingAdapter {
    async fn embed_query(&self, text: &str) -> Vec<f32> {
        let texts = [text.to_string()];
        let mut batch = self.embed_batch_detailed(&texts, None).await;
        batch.vectors.pop().unwrap_or_else(|| self.zero_vector())
    }

    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        self.embed_batch_detailed(texts, None).await.vectors
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
