//! Response schema detection
//!
//! Providers return vectors under different layouts. Each known layout is a
//! matcher; matchers are tried in a fixed order and the first one that
//! yields exactly one vector per input text (of the configured dimension)
//! wins.

use super::EmbeddingError;
use serde_json::{Map, Value};

/// Known response layouts, in detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"data": [{"embedding": [...]}, ...]}`
    OpenAiData,
    /// `{"embeddings": [[...], ...]}`
    Embeddings,
    /// `{"result": {"vectors": [[...], ...]}}`
    ResultVectors,
    /// `{"output": {"embeddings": [[...], ...]}}`
    OutputEmbeddings,
    /// `{"embedding": [...]}`, only when one vector is expected
    SingleEmbedding,
    /// Any mapping with exactly one key holding a list of numeric lists
    SingleKey,
}

impl ResponseShape {
    pub const DETECTION_ORDER: [ResponseShape; 6] = [
        ResponseShape::OpenAiData,
        ResponseShape::Embeddings,
        ResponseShape::ResultVectors,
        ResponseShape::OutputEmbeddings,
        ResponseShape::SingleEmbedding,
        ResponseShape::SingleKey,
    ];

    /// Try to extract `expected` vectors with this layout
    pub fn extract(self, body: &Value, expected: usize) -> Option<Vec<Vec<f32>>> {
        let object = body.as_object()?;

        let vectors = match self {
            ResponseShape::OpenAiData => object
                .get("data")?
                .as_array()?
                .iter()
                .map(|item| numeric_list(item.get("embedding")?))
                .collect::<Option<Vec<_>>>()?,
            ResponseShape::Embeddings => vector_list(object.get("embeddings")?)?,
            ResponseShape::ResultVectors => vector_list(object.get("result")?.get("vectors")?)?,
            ResponseShape::OutputEmbeddings => {
                vector_list(object.get("output")?.get("embeddings")?)?
            }
            ResponseShape::SingleEmbedding => {
                if expected != 1 {
                    return None;
                }
                vec![numeric_list(object.get("embedding")?)?]
            }
            ResponseShape::SingleKey => single_key(object)?,
        };

        (vectors.len() == expected).then_some(vectors)
    }
}

/// Detect the response layout and extract one vector per input
///
/// Fails with `Schema` when no layout yields `expected` vectors of
/// `dimension` components.
pub fn detect_vectors(
    body: &Value,
    expected: usize,
    dimension: usize,
) -> Result<(ResponseShape, Vec<Vec<f32>>), EmbeddingError> {
    for shape in ResponseShape::DETECTION_ORDER {
        if let Some(vectors) = shape.extract(body, expected) {
            if vectors.iter().all(|v| v.len() == dimension) {
                return Ok((shape, vectors));
            }
            tracing::debug!(
                "Shape {:?} matched but vector dimension differs from {}",
                shape,
                dimension
            );
        }
    }

    let keys: Vec<&str> = body
        .as_object()
        .map(|o| o.keys().map(String::as_str).collect())
        .unwrap_or_default();

    Err(EmbeddingError::Schema(format!(
        "expected {} vectors of dimension {}, response keys: {:?}",
        expected, dimension, keys
    )))
}

fn single_key(object: &Map<String, Value>) -> Option<Vec<Vec<f32>>> {
    if object.len() != 1 {
        return None;
    }
    object.values().next().and_then(vector_list)
}

fn vector_list(value: &Value) -> Option<Vec<Vec<f32>>> {
    value.as_array()?.iter().map(numeric_list).collect()
}

fn numeric_list(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|n| n.as_f64().map(|f| f as f32))
        .collect()
}
