//! Document and chunk types shared by the ingestion and retrieval paths

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Metadata attached to documents and chunks
///
/// Ordered map so that serialized chunks are stable across runs.
pub type Metadata = BTreeMap<String, Value>;

/// Stable chunk identifier: `(document_id, sequence_index)`
///
/// Ordering is lexicographic on the document id, then the sequence index.
/// Retrieval uses this ordering to break score ties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub document_id: String,
    pub sequence: usize,
}

impl ChunkId {
    pub fn new(document_id: impl Into<String>, sequence: usize) -> Self {
        Self {
            document_id: document_id.into(),
            sequence,
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.sequence)
    }
}

/// A source document supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry (builder style)
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A bounded span of one document, the unit of embedding and retrieval
///
/// Chunks are immutable once produced. Offsets are character offsets into
/// the source document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    id: ChunkId,
    text: String,
    start: usize,
    end: usize,
    metadata: Metadata,
}

impl Chunk {
    /// Build a chunk from its parts
    ///
    /// `metadata` is stored as given; the splitter is responsible for
    /// merging document metadata with chunk-specific entries.
    pub fn new(id: ChunkId, text: impl Into<String>, span: Range<usize>, metadata: Metadata) -> Self {
        Self {
            id,
            text: text.into(),
            start: span.start,
            end: span.end,
            metadata,
        }
    }

    pub fn id(&self) -> &ChunkId {
        &self.id
    }

    pub fn document_id(&self) -> &str {
        &self.id.document_id
    }

    pub fn sequence(&self) -> usize {
        self.id.sequence
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Character span in the source document
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Length in characters (not bytes)
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Short preview of the text for display (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        if self.char_len() <= max_chars {
            self.text.clone()
        } else {
            let head: String = self.text.chars().take(max_chars).collect();
            format!("{}...", head)
        }
    }
}
