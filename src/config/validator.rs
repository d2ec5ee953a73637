use crate::config::{Config, SCHEMA_VERSION};
use crate::embedding::MAX_RETRIES_LIMIT;
use crate::error::{RagError, Result, ValidationError};
use crate::index::StoreBackend;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        // Validate schema version
        Self::validate_schema_version(config, &mut errors);

        // Validate embedding settings
        Self::validate_embedding(config, &mut errors);

        // Validate chunking settings
        Self::validate_chunking(config, &mut errors);

        // Validate vector store settings
        Self::validate_store(config, &mut errors);

        // Validate retrieval settings
        Self::validate_retrieval(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RagError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        if embedding.api_base.trim().is_empty() {
            errors.push(ValidationError::new(
                "embedding.api_base",
                "API base URL cannot be empty",
            ));
        }

        // Validate model name is not empty
        if embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }

        // Validate batch size
        if embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if embedding.concurrency == 0 {
            errors.push(ValidationError::new(
                "embedding.concurrency",
                "Concurrency must be greater than 0",
            ));
        }

        if embedding.max_retries > MAX_RETRIES_LIMIT {
            errors.push(ValidationError::new(
                "embedding.max_retries",
                format!(
                    "Max retries must be at most {}, got {}",
                    MAX_RETRIES_LIMIT, embedding.max_retries
                ),
            ));
        }

        if embedding.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "embedding.timeout_secs",
                "Request timeout must be greater than 0",
            ));
        }

        if embedding.deadline_secs == Some(0) {
            errors.push(ValidationError::new(
                "embedding.deadline_secs",
                "Deadline must be greater than 0 when set",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let chunking = &config.chunking;

        if chunking.max_length == 0 {
            errors.push(ValidationError::new(
                "chunking.max_length",
                "Max length must be greater than 0",
            ));
        } else if chunking.overlap >= chunking.max_length {
            errors.push(ValidationError::new(
                "chunking.overlap",
                format!(
                    "Overlap must be smaller than max_length ({}), got {}",
                    chunking.max_length, chunking.overlap
                ),
            ));
        }

        if let Some(separators) = &chunking.separators {
            if separators.iter().any(String::is_empty) {
                errors.push(ValidationError::new(
                    "chunking.separators",
                    "Separators cannot be empty strings",
                ));
            }
        }
    }

    fn validate_store(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.store.backend != StoreBackend::Hnsw {
            return;
        }

        // Validate HNSW parameters
        let params = [
            ("store.hnsw_m", config.store.hnsw_m),
            ("store.hnsw_ef_construction", config.store.hnsw_ef_construction),
            ("store.hnsw_ef_search", config.store.hnsw_ef_search),
            ("store.hnsw_capacity", config.store.hnsw_capacity),
        ];
        for (path, value) in params {
            if value == 0 {
                errors.push(ValidationError::new(path, "Must be greater than 0"));
            }
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }

        if retrieval.candidate_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.candidate_multiplier",
                "Candidate multiplier must be at least 1",
            ));
        }

        let weights = [
            ("retrieval.vector_weight", retrieval.vector_weight),
            ("retrieval.keyword_weight", retrieval.keyword_weight),
        ];
        for (path, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                errors.push(ValidationError::new(
                    path,
                    format!("Weight must be a non-negative number, got {}", weight),
                ));
            }
        }
        if retrieval.vector_weight == 0.0 && retrieval.keyword_weight == 0.0 {
            errors.push(ValidationError::new(
                "retrieval.vector_weight",
                "Vector and keyword weights cannot both be 0",
            ));
        }

        if !retrieval.rrf_k.is_finite() || retrieval.rrf_k < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                format!("RRF constant must be non-negative, got {}", retrieval.rrf_k),
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.mmr_lambda) {
            errors.push(ValidationError::new(
                "retrieval.mmr_lambda",
                format!(
                    "MMR lambda must be between 0.0 and 1.0, got {}",
                    retrieval.mmr_lambda
                ),
            ));
        }

        if !retrieval.score_threshold.is_finite() || retrieval.score_threshold < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.score_threshold",
                format!(
                    "Score threshold must be a non-negative number, got {}",
                    retrieval.score_threshold
                ),
            ));
        } else if retrieval.score_threshold > retrieval.max_fused_score() {
            errors.push(ValidationError::new(
                "retrieval.score_threshold",
                format!(
                    "Score threshold {} exceeds the highest {:?} fusion score {:.4}; every result would be dropped",
                    retrieval.score_threshold,
                    retrieval.fusion,
                    retrieval.max_fused_score()
                ),
            ));
        }

        if retrieval.mmr_fetch_k < retrieval.top_k {
            errors.push(ValidationError::new(
                "retrieval.mmr_fetch_k",
                format!(
                    "MMR fetch_k ({}) must be at least top_k ({})",
                    retrieval.mmr_fetch_k, retrieval.top_k
                ),
            ));
        }
    }
}
