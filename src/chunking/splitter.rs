/// Recursive-separator text splitter with fixed character overlap
use super::{Chunk, ChunkError, ChunkId, Document, Metadata};
use serde_json::Value;

/// Breakpoint tiers, highest priority first
///
/// Within one tier the rightmost occurrence wins. The final fallback
/// (character boundary) is the hard cut and has no entry here.
const DEFAULT_TIERS: &[&[&str]] = &[
    &["\n\n"],
    &["\n"],
    &[". ", "! ", "? ", "。", "！", "？", "；"],
    &[" ", "\t"],
];

/// Splits documents into overlapping chunks of at most `max_length` characters
#[derive(Debug, Clone)]
pub struct TextSplitter {
    max_length: usize,
    overlap: usize,
    tiers: Vec<Vec<Vec<char>>>,
}

impl TextSplitter {
    /// Create a splitter with the default separator tiers
    ///
    /// Fails with `InvalidConfig` when `max_length == 0` or
    /// `overlap >= max_length`.
    pub fn new(max_length: usize, overlap: usize) -> Result<Self, ChunkError> {
        let tiers = DEFAULT_TIERS
            .iter()
            .map(|tier| tier.iter().map(|s| s.chars().collect()).collect())
            .collect();
        Self::with_tiers(max_length, overlap, tiers)
    }

    /// Create a splitter with a custom separator priority list
    ///
    /// Each separator becomes its own tier, in the given order. Empty
    /// strings are ignored (the character-boundary cut is always last).
    pub fn with_separators(
        max_length: usize,
        overlap: usize,
        separators: &[String],
    ) -> Result<Self, ChunkError> {
        let tiers = separators
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| vec![s.chars().collect()])
            .collect();
        Self::with_tiers(max_length, overlap, tiers)
    }

    fn with_tiers(
        max_length: usize,
        overlap: usize,
        tiers: Vec<Vec<Vec<char>>>,
    ) -> Result<Self, ChunkError> {
        if max_length == 0 {
            return Err(ChunkError::InvalidConfig(
                "max_length must be greater than 0".to_string(),
            ));
        }
        if overlap >= max_length {
            return Err(ChunkError::InvalidConfig(format!(
                "overlap ({}) must be smaller than max_length ({})",
                overlap, max_length
            )));
        }

        Ok(Self {
            max_length,
            overlap,
            tiers,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split one document into an ordered sequence of chunks
    ///
    /// Consecutive chunks share exactly `overlap` characters, so
    /// `c0 + c1[overlap..] + c2[overlap..] + ...` reproduces the text.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();

        if total == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let end = if total - start <= self.max_length {
                total
            } else {
                self.find_cut(&chars, start)
            };

            let sequence = chunks.len();
            let text: String = chars[start..end].iter().collect();
            let metadata = chunk_metadata(document, sequence, start, end, &text);
            chunks.push(Chunk::new(
                ChunkId::new(document.id.clone(), sequence),
                text,
                start..end,
                metadata,
            ));

            if end == total {
                break;
            }
            start = end - self.overlap;
        }

        tracing::debug!(
            "Split document {} ({} chars) into {} chunks",
            document.id,
            total,
            chunks.len()
        );

        chunks
    }

    /// Split many documents, preserving input order
    pub fn split_all<'a, I>(&self, documents: I) -> Vec<Chunk>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        documents
            .into_iter()
            .flat_map(|doc| self.split(doc))
            .collect()
    }

    /// Pick the end (exclusive) of the chunk starting at `start`
    ///
    /// A breakpoint is only usable when it leaves more than `overlap`
    /// characters in the chunk, otherwise the next window would not advance.
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let window_end = start + self.max_length;
        let min_cut = start + self.overlap + 1;

        for tier in &self.tiers {
            let best = tier
                .iter()
                .filter_map(|sep| rightmost_cut(chars, start, window_end, sep))
                .filter(|&cut| cut >= min_cut)
                .max();

            if let Some(cut) = best {
                return cut;
            }
        }

        window_end
    }
}

/// Position just past the rightmost occurrence of `sep` inside the window
fn rightmost_cut(chars: &[char], start: usize, window_end: usize, sep: &[char]) -> Option<usize> {
    if sep.is_empty() || window_end - start < sep.len() {
        return None;
    }

    (start..=window_end - sep.len())
        .rev()
        .find(|&pos| chars[pos..pos + sep.len()] == *sep)
        .map(|pos| pos + sep.len())
}

fn chunk_metadata(
    document: &Document,
    sequence: usize,
    start: usize,
    end: usize,
    text: &str,
) -> Metadata {
    let mut metadata = document.metadata.clone();
    let hash = blake3::hash(text.as_bytes()).to_hex();

    metadata.insert("document_id".to_string(), Value::from(document.id.clone()));
    metadata.insert("chunk_index".to_string(), Value::from(sequence));
    metadata.insert("start".to_string(), Value::from(start));
    metadata.insert("end".to_string(), Value::from(end));
    metadata.insert("content_hash".to_string(), Value::from(&hash[..16]));
    metadata
}

/// Convenience form: split one document with a default-tier splitter
pub fn split(
    document: &Document,
    max_length: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkError> {
    Ok(TextSplitter::new(max_length, overlap)?.split(document))
}
