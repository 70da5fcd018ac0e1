use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::EmbeddingBackend;
use crate::circuit_breaker::CircuitBreaker;
use crate::{SemanticConfig, SemanticError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiProviderKind {
    HuggingFace,
    OpenAI,
    Custom,
}

impl ApiProviderKind {
    fn from_name(name: &str) -> Self {
        match name {
            "hf" | "huggingface" => ApiProviderKind::HuggingFace,
            "openai" | "gpt" => ApiProviderKind::OpenAI,
            _ => ApiProviderKind::Custom,
        }
    }
}

/// Remote embedding backend speaking the OpenAI, Hugging Face, or a plain `{"text": ..}` shape.
///
/// One instance owns one pooled HTTP client and one circuit breaker; share it behind an `Arc`.
#[derive(Debug)]
pub struct ApiEmbedder {
    client: reqwest::Client,
    url: String,
    auth_header: Option<String>,
    model_name: String,
    provider: ApiProviderKind,
    provider_name: String,
    breaker: Option<CircuitBreaker>,
}

impl ApiEmbedder {
    pub fn from_config(cfg: &SemanticConfig) -> Result<Self, SemanticError> {
        let url = cfg
            .api_url
            .clone()
            .ok_or_else(|| SemanticError::InvalidConfig("api_url is required for api mode".into()))?;
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| SemanticError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        let provider_name = cfg.provider_name();

        Ok(Self {
            client,
            url,
            auth_header: cfg.api_auth_header.clone(),
            model_name: cfg.model_name.clone(),
            provider: ApiProviderKind::from_name(&provider_name),
            provider_name,
            breaker: cfg.circuit_breaker.map(CircuitBreaker::new),
        })
    }

    fn payload(&self, text: &str) -> Value {
        build_api_payload(self.provider, text, &self.model_name)
    }

    async fn send(&self, payload: Value) -> Result<Value, SemanticError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(header) = self.auth_header.as_deref() {
            request = request.header("Authorization", header);
        }

        let response = request
            .json(&payload)
            .send()
            .await
            .map_err(|e| SemanticError::Unavailable(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SemanticError::Unavailable(format!(
                "HTTP error {status}: {body}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SemanticError::Malformed(format!("invalid JSON response: {e}")))
    }
}

#[async_trait]
impl EmbeddingBackend for ApiEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        let permit = match &self.breaker {
            Some(cb) => match cb.try_acquire() {
                Some(permit) => Some(permit),
                None => return Err(SemanticError::CircuitOpen(self.provider_name.clone())),
            },
            None => None,
        };

        // Dropping this future mid-request drops the permit with it.
        let outcome = match self.send(self.payload(text)).await {
            Ok(response) => first_embedding(response),
            Err(e) => Err(e),
        };

        if let Some(permit) = permit {
            match &outcome {
                Ok(_) => permit.succeeded(),
                Err(_) => permit.failed(),
            }
        }
        outcome
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

fn build_api_payload(provider: ApiProviderKind, text: &str, model_name: &str) -> Value {
    match provider {
        ApiProviderKind::HuggingFace => json!({ "inputs": text }),
        ApiProviderKind::OpenAI => json!({ "input": text, "model": model_name }),
        ApiProviderKind::Custom => json!({ "text": text }),
    }
}

fn first_embedding(response: Value) -> Result<Vec<f32>, SemanticError> {
    parse_embeddings_from_value(response)?
        .into_iter()
        .next()
        .ok_or_else(|| SemanticError::Malformed("API response did not contain embeddings".into()))
}

fn parse_embeddings_from_value(value: Value) -> Result<Vec<Vec<f32>>, SemanticError> {
    match value {
        Value::Object(mut map) => {
            if let Some(embeddings) = map.remove("embeddings") {
                return parse_embedding_collection(embeddings);
            }
            if let Some(embedding) = map.remove("embedding") {
                return parse_embedding_vector(embedding).map(|v| vec![v]);
            }

            if let Some(Value::Array(items)) = map.remove("data") {
                return items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(mut obj) => obj
                            .remove("embedding")
                            .ok_or_else(|| {
                                SemanticError::Malformed(
                                    "missing `embedding` field in data item".into(),
                                )
                            })
                            .and_then(parse_embedding_vector),
                        _ => Err(SemanticError::Malformed(
                            "unexpected entry inside `data` array".into(),
                        )),
                    })
                    .collect();
            }

            Err(SemanticError::Malformed(
                "unsupported API response shape".into(),
            ))
        }
        other => parse_embedding_collection(other),
    }
}

fn parse_embedding_collection(value: Value) -> Result<Vec<Vec<f32>>, SemanticError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                Ok(Vec::new())
            } else if items.iter().all(|item| matches!(item, Value::Array(_))) {
                items.into_iter().map(parse_embedding_vector).collect()
            } else {
                parse_embedding_vector(Value::Array(items)).map(|vec| vec![vec])
            }
        }
        other => parse_embedding_vector(other).map(|vec| vec![vec]),
    }
}

fn parse_embedding_vector(value: Value) -> Result<Vec<f32>, SemanticError> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|entry| match entry {
                Value::Number(num) => num
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| SemanticError::Malformed("non-finite embedding value".into())),
                other => Err(SemanticError::Malformed(format!(
                    "embedding entries must be numbers, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(SemanticError::Malformed(format!(
            "embedding vector must be an array, got {other:?}"
        ))),
    }
}
