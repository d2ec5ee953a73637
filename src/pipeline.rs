/// Ingestion and retrieval over one chunk corpus
use crate::chunking::{Document, TextSplitter};
use crate::config::Config;
use crate::embedding::{EmbeddingAdapter, EmbeddingTransport, HttpTransport, StatsSnapshot};
use crate::error::Result;
use crate::index::{build_vector_store, KeywordIndex, VectorStore};
use crate::retrieval::{HybridRetriever, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of one `ingest` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    /// Chunks stored with a zero-vector fallback embedding
    pub degraded_chunks: usize,
    pub duration_ms: u64,
}

/// Knowledge base: chunker, embedding adapter, vector store and keyword
/// index wired together
///
/// Write path: documents -> chunks -> vectors -> store + keyword index.
/// Read path: query -> hybrid retriever.
pub struct KnowledgeBase {
    splitter: TextSplitter,
    adapter: Arc<EmbeddingAdapter>,
    store: Arc<dyn VectorStore>,
    keyword_index: Arc<KeywordIndex>,
    retriever: HybridRetriever,
    default_k: usize,
}

impl KnowledgeBase {
    /// Build from configuration with the HTTP embedding transport
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.embedding)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build from configuration over a custom embedding transport
    pub fn with_transport(config: &Config, transport: Arc<dyn EmbeddingTransport>) -> Result<Self> {
        let adapter = Arc::new(EmbeddingAdapter::new(config.embedding.clone(), transport)?);
        let store: Arc<dyn VectorStore> =
            Arc::from(build_vector_store(&config.store, config.embedding.dimension));
        let keyword_index = Arc::new(KeywordIndex::in_memory()?);

        Self::new(
            config.chunking.build()?,
            adapter,
            store,
            keyword_index,
            config,
        )
    }

    /// Assemble from prebuilt parts
    pub fn new(
        splitter: TextSplitter,
        adapter: Arc<EmbeddingAdapter>,
        store: Arc<dyn VectorStore>,
        keyword_index: Arc<KeywordIndex>,
        config: &Config,
    ) -> Result<Self> {
        let retriever = HybridRetriever::new(
            adapter.clone(),
            store.clone(),
            keyword_index.clone(),
            config.retrieval.clone(),
        )?;

        Ok(Self {
            splitter,
            adapter,
            store,
            keyword_index,
            retriever,
            default_k: config.retrieval.top_k,
        })
    }

    /// Chunk, embed and index documents
    ///
    /// Each document's previous chunks are removed from both indexes first,
    /// so re-ingesting a document replaces it. Embedding failures do not
    /// fail the call; affected chunks are stored with zero vectors and
    /// counted in `degraded_chunks`.
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        let start = std::time::Instant::now();

        info!("Ingesting {} documents", documents.len());

        for document in documents {
            let removed = self.remove(&document.id)?;
            if removed > 0 {
                debug!("Replacing {} chunks of document {}", removed, document.id);
            }
        }

        let chunks = self.splitter.split_all(documents);
        let texts: Vec<String> = chunks.iter().map(|c| c.text().to_string()).collect();

        let deadline = self.adapter.config().deadline().map(|d| Instant::now() + d);
        let embedded = self.adapter.embed_batch_detailed(&texts, deadline).await;
        let degraded_chunks = embedded.degraded_count();
        if degraded_chunks > 0 {
            warn!(
                "{} of {} chunks stored with fallback embeddings",
                degraded_chunks,
                chunks.len()
            );
        }

        self.store.add(&chunks, &embedded.vectors)?;
        self.keyword_index.index_documents(&chunks)?;

        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Ingestion complete: {} documents, {} chunks, {} degraded, {}ms",
            documents.len(),
            chunks.len(),
            degraded_chunks,
            duration_ms
        );

        Ok(IngestReport {
            documents: documents.len(),
            chunks: chunks.len(),
            degraded_chunks,
            duration_ms,
        })
    }

    /// Remove a document's chunks from both indexes
    ///
    /// Returns the number of chunks removed from the vector store.
    pub fn remove(&self, document_id: &str) -> Result<usize> {
        let removed = self.store.delete_by_document(document_id)?;
        self.keyword_index.delete_by_document(document_id)?;
        Ok(removed)
    }

    /// Hybrid retrieval of the top `k` chunks
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        Ok(self.retriever.retrieve(query, k).await?)
    }

    /// Hybrid retrieval with the configured `top_k`
    pub async fn retrieve_default(&self, query: &str) -> Result<RetrievalResult> {
        self.retrieve(query, self.default_k).await
    }

    /// Number of chunks in the vector store
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Embedding adapter counters
    pub fn stats(&self) -> StatsSnapshot {
        self.adapter.stats()
    }

    pub fn adapter(&self) -> &EmbeddingAdapter {
        &self.adapter
    }
}
