//! Configuration management for ragkit
//!
//! Configuration is layered: TOML file, then an optional named profile,
//! then `RAGKIT_SECTION__KEY` environment overrides, then validation.

use crate::chunking::ChunkingConfig;
use crate::embedding::EmbeddingConfig;
use crate::error::{RagError, Result};
use crate::index::StoreConfig;
use crate::retrieval::RetrievalConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod validator;

pub use validator::ConfigValidator;

/// Schema version written by this release
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Prefix of environment variable overrides
const ENV_PREFIX: &str = "RAGKIT_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at: current_timestamp(),
            last_modified: current_timestamp(),
        }
    }
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_overlap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_weight: Option<f32>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load configuration with a specific profile applied
    ///
    /// Environment overrides still take precedence over the profile.
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_profile(profile)?;
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML without overrides or validation
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RagError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RagError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(api_base) = overrides.embedding_api_base {
            self.embedding.api_base = api_base;
        }
        if let Some(concurrency) = overrides.embedding_concurrency {
            self.embedding.concurrency = concurrency;
        }
        if let Some(max_length) = overrides.chunk_max_length {
            self.chunking.max_length = max_length;
        }
        if let Some(overlap) = overrides.chunk_overlap {
            self.chunking.overlap = overlap;
        }
        if let Some(top_k) = overrides.top_k {
            self.retrieval.top_k = top_k;
        }
        if let Some(weight) = overrides.vector_weight {
            self.retrieval.vector_weight = weight;
        }
        if let Some(weight) = overrides.keyword_weight {
            self.retrieval.keyword_weight = weight;
        }

        tracing::debug!("Applied profile {}", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: RAGKIT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `RAGKIT_SECTION__KEY` style overrides from any source
    pub fn apply_overrides<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.as_ref().strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, value.as_ref()) {
                    tracing::warn!("Failed to apply env override {}: {}", key.as_ref(), e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EMBEDDING__API_BASE" => self.embedding.api_base = value.to_string(),
            "EMBEDDING__ENDPOINT_PATH" => self.embedding.endpoint_path = value.to_string(),
            "EMBEDDING__API_KEY_ENV" => self.embedding.api_key_env = Some(value.to_string()),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__DIMENSION" => self.embedding.dimension = parse_value(path, value)?,
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_value(path, value)?,
            "EMBEDDING__MAX_RETRIES" => self.embedding.max_retries = parse_value(path, value)?,
            "EMBEDDING__RETRY_DELAY_MS" => {
                self.embedding.retry_delay_ms = parse_value(path, value)?
            }
            "EMBEDDING__TIMEOUT_SECS" => self.embedding.timeout_secs = parse_value(path, value)?,
            "EMBEDDING__CONCURRENCY" => self.embedding.concurrency = parse_value(path, value)?,
            "EMBEDDING__BACKOFF" => self.embedding.backoff = parse_enum(path, value)?,
            "EMBEDDING__INPUT_FORMAT" => self.embedding.input_format = parse_enum(path, value)?,
            "EMBEDDING__DEADLINE_SECS" => {
                self.embedding.deadline_secs = Some(parse_value(path, value)?)
            }
            "CHUNKING__MAX_LENGTH" => self.chunking.max_length = parse_value(path, value)?,
            "CHUNKING__OVERLAP" => self.chunking.overlap = parse_value(path, value)?,
            "STORE__BACKEND" => self.store.backend = parse_enum(path, value)?,
            "STORE__METRIC" => self.store.metric = parse_enum(path, value)?,
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_value(path, value)?,
            "RETRIEVAL__VECTOR_WEIGHT" => self.retrieval.vector_weight = parse_value(path, value)?,
            "RETRIEVAL__KEYWORD_WEIGHT" => {
                self.retrieval.keyword_weight = parse_value(path, value)?
            }
            "RETRIEVAL__FUSION" => self.retrieval.fusion = parse_enum(path, value)?,
            "RETRIEVAL__SEARCH_TYPE" => self.retrieval.search_type = parse_enum(path, value)?,
            "RETRIEVAL__SCORE_THRESHOLD" => {
                self.retrieval.score_threshold = parse_value(path, value)?
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RagError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("ragkit").join("config.toml"))
    }
}

fn parse_value<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| RagError::InvalidConfigValue {
        path: path.to_string(),
        message: format!(
            "Cannot parse '{}' as {}",
            value,
            std::any::type_name::<T>()
        ),
    })
}

/// Parse a snake_case enum variant name
fn parse_enum<T: DeserializeOwned>(path: &str, value: &str) -> Result<T> {
    let name = serde_json::Value::String(value.trim().to_lowercase());
    serde_json::from_value(name).map_err(|e| RagError::InvalidConfigValue {
        path: path.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DistanceMetric, StoreBackend};
    use crate::retrieval::SearchType;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
        assert_eq!(config.meta.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [embedding]
            model = "custom-model"
            dimension = 768

            [retrieval]
            search_type = "mmr"
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding.model, "custom-model");
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.embedding.batch_size, 10);
        assert_eq!(config.chunking.max_length, 500);
        assert_eq!(config.retrieval.search_type, SearchType::Mmr);
        assert_eq!(config.retrieval.top_k, 4);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.store.backend = StoreBackend::Hnsw;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.store.backend, StoreBackend::Hnsw);
        assert_eq!(loaded.embedding.dimension, config.embedding.dimension);
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = Config::load(&temp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, RagError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vec![
            ("RAGKIT_EMBEDDING__MODEL", "env-model"),
            ("RAGKIT_EMBEDDING__BATCH_SIZE", "25"),
            ("RAGKIT_STORE__METRIC", "L2"),
            ("RAGKIT_RETRIEVAL__VECTOR_WEIGHT", "0.8"),
            ("RAGKIT_EMBEDDING__DIMENSION", "not-a-number"),
            ("OTHER_VAR", "ignored"),
        ]);

        assert_eq!(config.embedding.model, "env-model");
        assert_eq!(config.embedding.batch_size, 25);
        assert_eq!(config.store.metric, DistanceMetric::L2);
        assert_eq!(config.retrieval.vector_weight, 0.8);
        // Unparseable values are skipped
        assert_eq!(config.embedding.dimension, 1536);
    }

    #[test]
    fn test_profile() {
        let mut config = Config::from_toml(
            r#"
            [profiles.fast]
            embedding_concurrency = 4
            top_k = 8
            "#,
        )
        .unwrap();

        config.apply_profile("fast").unwrap();
        assert_eq!(config.embedding.concurrency, 4);
        assert_eq!(config.retrieval.top_k, 8);

        assert!(config.apply_profile("missing").is_err());
    }
}
