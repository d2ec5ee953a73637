//! Document chunking
//!
//! Splits document text into overlapping, bounded chunks that are embedded
//! and indexed independently. Breakpoints are chosen from a prioritized
//! separator list (paragraph, line, sentence end, whitespace) with a hard
//! character cut as the last resort.

mod splitter;
mod types;

pub use splitter::{split, TextSplitter};
pub use types::{Chunk, ChunkId, Document, Metadata};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Invalid chunking configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for text splitting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub max_length: usize,
    /// Characters shared by consecutive chunks
    pub overlap: usize,
    /// Separator priority override (highest first)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separators: Option<Vec<String>>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_length: 500,
            overlap: 50,
            separators: None,
        }
    }
}

impl ChunkingConfig {
    /// Build the splitter described by this configuration
    pub fn build(&self) -> Result<TextSplitter, ChunkError> {
        match &self.separators {
            Some(separators) => {
                TextSplitter::with_separators(self.max_length, self.overlap, separators)
            }
            None => TextSplitter::new(self.max_length, self.overlap),
        }
    }
}
