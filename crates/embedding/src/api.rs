use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::normalize::l2_normalize_in_place;
use crate::resilience::{execute_with_retry, CircuitBreaker};
use crate::{
    ApiProviderKind, EmbeddingConfig, EmbeddingError, EmbeddingOutput, EmbeddingProvider,
    EmbeddingUsage,
};

/// HTTP embedding provider speaking the OpenAI, Hugging Face or custom JSON shape.
#[derive(Debug, Clone)]
pub struct ApiEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    cfg: EmbeddingConfig,
    breaker: Arc<CircuitBreaker>,
}

impl ApiEmbeddingProvider {
    pub fn new(cfg: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let url = cfg
            .api_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                EmbeddingError::InvalidConfig("api_url is required for api mode".into())
            })?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| {
                EmbeddingError::InvalidConfig(format!("failed to build HTTP client: {e}"))
            })?;
        let breaker = Arc::new(CircuitBreaker::new(
            cfg.api_provider.as_str(),
            cfg.circuit_breaker,
        ));
        Ok(Self {
            client,
            url,
            cfg,
            breaker,
        })
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.cfg.timeout_secs)
    }

    async fn post(&self, payload: &Value) -> Result<Value, EmbeddingError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(header) = self.cfg.api_auth_header.as_deref() {
            request = request.header("Authorization", header);
        }

        let response = request.json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(format!("invalid JSON response: {e}")))
    }

    async fn send(&self, payload: &Value) -> Result<Value, EmbeddingError> {
        let timeout = self.timeout();
        tokio::time::timeout(timeout, self.post(payload))
            .await
            .map_err(|_| EmbeddingError::Timeout(timeout))?
    }
}

#[async_trait]
impl EmbeddingProvider for ApiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<EmbeddingOutput, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let resilient = self.cfg.enable_resilience;
        if resilient && !self.breaker.allow_request() {
            return Err(EmbeddingError::CircuitOpen(self.breaker.name().to_string()));
        }

        let payload = build_payload(self.cfg.api_provider, text, &self.cfg.model_name);
        let result = if resilient {
            let outcome = execute_with_retry(
                &self.cfg.retry,
                EmbeddingError::is_retryable,
                |attempt| {
                    if attempt > 0 {
                        tracing::warn!(
                            provider = self.breaker.name(),
                            attempt,
                            "retrying embedding request"
                        );
                    }
                    self.send(&payload)
                },
            )
            .await;
            outcome.into_result()
        } else {
            self.send(&payload).await
        };

        let response = match result {
            Ok(value) => {
                if resilient {
                    self.breaker.record_success();
                }
                value
            }
            Err(err) => {
                if resilient {
                    self.breaker.record_failure();
                }
                return Err(err);
            }
        };

        let usage = parse_usage(&response);
        let mut vector = parse_embeddings_from_value(response)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("response did not contain embeddings".into())
            })?;
        if vector.is_empty() {
            return Err(EmbeddingError::InvalidResponse("embedding vector is empty".into()));
        }
        if let Some(expected) = self.cfg.dimension {
            if vector.len() != expected {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {expected} dimensions, provider returned {}",
                    vector.len()
                )));
            }
        }
        if self.cfg.normalize {
            l2_normalize_in_place(&mut vector);
        }

        Ok(EmbeddingOutput {
            vector,
            model: self.cfg.model_name.clone(),
            usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.cfg.model_name
    }

    fn dimension(&self) -> Option<usize> {
        self.cfg.dimension
    }
}

fn build_payload(provider: ApiProviderKind, text: &str, model: &str) -> Value {
    match provider {
        ApiProviderKind::HuggingFace => json!({ "inputs": text }),
        ApiProviderKind::OpenAi => json!({ "input": text, "model": model }),
        ApiProviderKind::Custom => json!({ "text": text }),
    }
}

fn parse_usage(value: &Value) -> EmbeddingUsage {
    value
        .get("usage")
        .cloned()
        .and_then(|usage| serde_json::from_value(usage).ok())
        .unwrap_or_default()
}

fn parse_embeddings_from_value(value: Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
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
                                EmbeddingError::InvalidResponse(
                                    "missing `embedding` field in data item".into(),
                                )
                            })
                            .and_then(parse_embedding_vector),
                        _ => Err(EmbeddingError::InvalidResponse(
                            "unexpected entry inside `data` array".into(),
                        )),
                    })
                    .collect();
            }
            Err(EmbeddingError::InvalidResponse(
                "unsupported API response shape".into(),
            ))
        }
        other => parse_embedding_collection(other),
    }
}

fn parse_embedding_collection(value: Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    match value {
        Value::Array(items) if items.is_empty() => Ok(Vec::new()),
        Value::Array(items) if items.iter().all(Value::is_array) => {
            items.into_iter().map(parse_embedding_vector).collect()
        }
        other => parse_embedding_vector(other).map(|v| vec![v]),
    }
}

fn parse_embedding_vector(value: Value) -> Result<Vec<f32>, EmbeddingError> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|entry| match entry {
                Value::Number(num) => num
                    .as_f64()
                    .map(|f| f as f32)
                    .filter(|f| f.is_finite())
                    .ok_or_else(|| {
                        EmbeddingError::InvalidResponse("non-finite embedding value".into())
                    }),
                other => Err(EmbeddingError::InvalidResponse(format!(
                    "embedding entries must be numbers, got {other}"
                ))),
            })
            .collect(),
        other => Err(EmbeddingError::InvalidResponse(format!(
            "embedding vector must be an array, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderMode;

    #[test]
    fn payload_shapes_per_provider() {
        assert_eq!(
            build_payload(ApiProviderKind::OpenAi, "hi", "m"),
            json!({"input": "hi", "model": "m"})
        );
        assert_eq!(
            build_payload(ApiProviderKind::HuggingFace, "hi", "m"),
            json!({"inputs": "hi"})
        );
        assert_eq!(
            build_payload(ApiProviderKind::Custom, "hi", "m"),
            json!({"text": "hi"})
        );
    }

    #[test]
    fn parses_openai_shape_with_usage() {
        let body = json!({
            "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 7, "total_tokens": 7}
        });
        assert_eq!(parse_usage(&body).total_tokens, 7);
        let vectors = parse_embeddings_from_value(body).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3]]);
    }

    #[test]
    fn parses_hf_and_custom_shapes() {
        assert_eq!(
            parse_embeddings_from_value(json!([[1.0, 2.0]])).unwrap(),
            vec![vec![1.0, 2.0]]
        );
        assert_eq!(
            parse_embeddings_from_value(json!([1.0, 2.0])).unwrap(),
            vec![vec![1.0, 2.0]]
        );
        assert_eq!(
            parse_embeddings_from_value(json!({"embedding": [3.0]})).unwrap(),
            vec![vec![3.0]]
        );
        assert_eq!(
            parse_embeddings_from_value(json!({"embeddings": [[4.0], [5.0]]})).unwrap(),
            vec![vec![4.0], vec![5.0]]
        );
        assert_eq!(parse_usage(&json!([1.0])), EmbeddingUsage::default());
    }

    #[test]
    fn rejects_unsupported_shapes() {
        assert!(parse_embeddings_from_value(json!({"result": 1})).is_err());
        assert!(parse_embeddings_from_value(json!({"data": [1]})).is_err());
        assert!(parse_embeddings_from_value(json!(["a", "b"])).is_err());
    }

    #[test]
    fn requires_url() {
        let cfg = EmbeddingConfig {
            mode: ProviderMode::Api,
            ..Default::default()
        };
        assert!(matches!(
            ApiEmbeddingProvider::new(cfg),
            Err(EmbeddingError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn open_breaker_fails_fast() {
        let cfg = EmbeddingConfig {
            mode: ProviderMode::Api,
            api_url: Some("http://127.0.0.1:9/embed".into()),
            ..Default::default()
        };
        let provider = ApiEmbeddingProvider::new(cfg).unwrap();
        for _ in 0..5 {
            provider.circuit_breaker().record_failure();
        }
        let err = provider.embed("hello").await.unwrap_err();
        assert_eq!(err, EmbeddingError::CircuitOpen("custom".into()));
    }
}
