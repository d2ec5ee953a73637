//! Provider transport: request body construction and the HTTP client

use super::{EmbeddingConfig, EmbeddingError, InputFormat};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Maximum characters of an error body kept in transport errors
const ERROR_BODY_PREVIEW: usize = 200;

/// One request/response exchange with an embedding provider
///
/// Implementations return the decoded JSON body; interpreting it is the
/// adapter's job.
#[async_trait]
pub trait EmbeddingTransport: Send + Sync {
    async fn send(&self, body: &Value) -> Result<Value, EmbeddingError>;
}

/// Build the provider request body for one batch
pub fn build_request_body(model: &str, texts: &[String], format: InputFormat) -> Value {
    let input = match format {
        InputFormat::Flat => json!(texts),
        InputFormat::Contents => {
            let contents: Vec<Value> = texts.iter().map(|t| json!({ "text": t })).collect();
            json!({ "contents": contents })
        }
        InputFormat::TextObjects => {
            let contents: Vec<Value> = texts.iter().map(|t| json!({ "text": t })).collect();
            json!(contents)
        }
    };

    json!({
        "model": model,
        "input": input,
        "parameters": {},
    })
}

/// HTTP transport backed by reqwest
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    /// Create a transport from adapter configuration
    ///
    /// The bearer token is read from `api_key_env` when configured.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EmbeddingError::InvalidConfig(format!("HTTP client: {}", e)))?;

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());

        tracing::info!(
            "Embedding transport: {} (model {}, auth: {})",
            config.endpoint_url(),
            config.model,
            if api_key.is_some() { "bearer" } else { "none" }
        );

        Ok(Self {
            client,
            url: config.endpoint_url(),
            api_key,
        })
    }

    /// Override the bearer token
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EmbeddingTransport for HttpTransport {
    async fn send(&self, body: &Value) -> Result<Value, EmbeddingError> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Transport(format!("request timed out: {}", e))
            } else {
                EmbeddingError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(EmbeddingError::Transport(format!(
                "API returned {}: {}",
                status, preview
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| EmbeddingError::Schema(format!("response is not valid JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts() -> Vec<String> {
        vec!["busy street".to_string(), "traffic".to_string()]
    }

    #[test]
    fn test_flat_body() {
        let body = build_request_body("m", &texts(), InputFormat::Flat);
        assert_eq!(body["model"], "m");
        assert_eq!(body["input"], json!(["busy street", "traffic"]));
        assert_eq!(body["parameters"], json!({}));
    }

    #[test]
    fn test_contents_body() {
        let body = build_request_body("m", &texts(), InputFormat::Contents);
        assert_eq!(
            body["input"],
            json!({ "contents": [{ "text": "busy street" }, { "text": "traffic" }] })
        );
    }

    #[test]
    fn test_text_objects_body() {
        let body = build_request_body("m", &texts(), InputFormat::TextObjects);
        assert_eq!(body["input"][1]["text"], "traffic");
    }

    #[test]
    fn test_http_transport_url() {
        let config = EmbeddingConfig::default();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.url(), "http://localhost:9015/v1/embeddings");
    }
}
