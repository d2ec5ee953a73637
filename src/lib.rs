//! ragkit - Embedding, chunking and hybrid retrieval core
//!
//! Normalizes a non-standard embedding provider into fixed-dimension
//! vectors (batching, retries, schema detection, zero-vector fallback),
//! splits documents into overlapping chunks, and retrieves them by fusing
//! vector similarity with BM25 keyword scores.

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod retrieval;

pub use error::{RagError, Result};
