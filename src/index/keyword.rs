/// Tantivy keyword index for lexical retrieval
use crate::chunking::Chunk;
use crate::retrieval::{rank_order, RetrievalSource, ScoredChunk};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError, Term};
use thiserror::Error;
use tracing::debug;

/// Writer memory budget
const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),

    #[error("Stored chunk is unreadable: {0}")]
    PayloadError(#[from] serde_json::Error),
}

/// Schema fields
#[derive(Clone, Copy)]
struct Fields {
    document_id: Field,
    chunk_key: Field,
    text: Field,
    payload: Field,
}

impl Fields {
    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("document_id", STRING);
        builder.add_text_field("chunk_key", STRING);
        builder.add_text_field("text", TEXT);
        builder.add_text_field("payload", STORED);
        builder.build()
    }

    fn resolve(schema: &Schema) -> Result<Self, KeywordIndexError> {
        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                KeywordIndexError::InitializationError(format!("Missing '{}' field in schema", name))
            })
        };

        Ok(Self {
            document_id: field("document_id")?,
            chunk_key: field("chunk_key")?,
            text: field("text")?,
            payload: field("payload")?,
        })
    }
}

/// BM25 keyword index over chunk text
///
/// Chunks are keyed by `document_id#sequence`; indexing a chunk id that
/// is already present replaces it. Searches see the last committed state.
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
}

impl KeywordIndex {
    /// Create an index held entirely in memory
    pub fn in_memory() -> Result<Self, KeywordIndexError> {
        let index = Index::create_in_ram(Fields::schema());
        Self::from_index(index)
    }

    /// Open an on-disk index, creating it if the directory holds none
    pub fn open(index_path: &Path) -> Result<Self, KeywordIndexError> {
        let index = if index_path.join("meta.json").exists() {
            Index::open_in_dir(index_path)?
        } else {
            std::fs::create_dir_all(index_path)?;
            Index::create_in_dir(index_path, Fields::schema())?
        };
        Self::from_index(index)
    }

    fn from_index(index: Index) -> Result<Self, KeywordIndexError> {
        let fields = Fields::resolve(&index.schema())?;

        let writer: IndexWriter = index.writer(WRITER_HEAP_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    /// Add chunks, replacing any already indexed under the same chunk id
    pub fn index_documents(&self, chunks: &[Chunk]) -> Result<(), KeywordIndexError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for chunk in chunks {
            let key = chunk.id().to_string();
            writer.delete_term(Term::from_field_text(self.fields.chunk_key, &key));
            writer.add_document(doc!(
                self.fields.document_id => chunk.document_id(),
                self.fields.chunk_key => key,
                self.fields.text => chunk.text(),
                self.fields.payload => serde_json::to_string(chunk)?,
            ))?;
        }
        self.commit(&mut writer)?;

        debug!("Indexed {} chunks for keyword search", chunks.len());
        Ok(())
    }

    /// Remove every chunk of a document, returning how many were removed
    pub fn delete_by_document(&self, document_id: &str) -> Result<usize, KeywordIndexError> {
        let term = Term::from_field_text(self.fields.document_id, document_id);

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let existing = self
            .reader
            .searcher()
            .search(&TermQuery::new(term.clone(), IndexRecordOption::Basic), &Count)?;
        if existing == 0 {
            return Ok(0);
        }

        writer.delete_term(term);
        self.commit(&mut writer)?;
        Ok(existing)
    }

    fn commit(&self, writer: &mut IndexWriter) -> Result<(), KeywordIndexError> {
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Up to `k` chunks by descending BM25 score
    ///
    /// The query is parsed leniently (operators and phrases are honored,
    /// malformed syntax degrades to plain terms). Ties are broken by chunk
    /// id ascending. An empty index or blank query yields no results.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, KeywordIndexError> {
        let searcher = self.reader.searcher();
        let total = searcher.num_docs() as usize;
        if k == 0 || total == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
        let (parsed, _errors) = parser.parse_query_lenient(query);

        // Collect every hit so equal scores can be ordered by chunk id
        let hits = searcher.search(&parsed, &TopDocs::with_limit(total))?;

        let mut results = Vec::with_capacity(hits.len());
        for (score, address) in hits {
            let stored: TantivyDocument = searcher.doc(address)?;
            let payload = stored
                .get_first(self.fields.payload)
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    KeywordIndexError::InitializationError("Missing stored chunk".to_string())
                })?;
            let chunk: Chunk = serde_json::from_str(payload)?;
            results.push(ScoredChunk::new(chunk, score, RetrievalSource::Keyword));
        }

        results.sort_by(|a, b| rank_order(a.score, a.id(), b.score, b.id()));
        results.truncate(k);
        Ok(results)
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
