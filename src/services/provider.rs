use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum ProviderError {
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider response has no message content")]
    MalformedResponse,
    #[error("provider call timed out")]
    Timeout,
}

/// Text-generation capability used by quiz generation. Implementations may return
/// arbitrary text; callers never trust its shape.
#[async_trait]
pub(crate) trait TextGenerationProvider: Send + Sync {
    async fn complete(
        &self,
        system_instruction: &str,
        user_content: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError>;
}

/// OpenAI-compatible `chat/completions` client.
#[derive(Debug, Clone)]
pub(crate) struct ChatCompletionsProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatCompletionsProvider {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let ai = settings.ai();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(ai.request_timeout_seconds))
            .build()
            .map_err(|err| anyhow::anyhow!("Failed to build provider HTTP client: {err}"))?;

        Ok(Self {
            client,
            api_key: ai.api_key.clone(),
            base_url: ai.base_url.trim_end_matches('/').to_string(),
            model: ai.model.clone(),
        })
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerationProvider for ChatCompletionsProvider {
    async fn complete(
        &self,
        system_instruction: &str,
        user_content: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_instruction},
                {"role": "user", "content": user_content}
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let timer = Instant::now();
        let result = self.send(&payload).await;
        let status = match &result {
            Ok(_) => "success",
            Err(ProviderError::Timeout) => "timeout",
            Err(_) => "error",
        };
        metrics::counter!("quiz_provider_requests_total", "status" => status).increment(1);
        metrics::histogram!("quiz_provider_duration_seconds")
            .record(timer.elapsed().as_secs_f64());

        match &result {
            Ok(content) => tracing::debug!(
                model = %self.model,
                chars = content.len(),
                elapsed_ms = timer.elapsed().as_millis() as u64,
                "Provider completion received"
            ),
            Err(err) => tracing::warn!(model = %self.model, error = %err, "Provider call failed"),
        }

        result
    }
}

impl ChatCompletionsProvider {
    async fn send(&self, payload: &Value) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .ok_or(ProviderError::MalformedResponse)
    }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Transport(err.to_string())
    }
}

fn extract_error_message(body: &Value) -> String {
    body.get("error")
        .and_then(|error| error.get("message").and_then(Value::as_str).or_else(|| error.as_str()))
        .or_else(|| body.get("detail").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}/v1/")
    }

    fn provider(base_url: String) -> ChatCompletionsProvider {
        ChatCompletionsProvider {
            client: Client::new(),
            api_key: "test-key".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: "test-model".to_string(),
        }
    }

    #[tokio::test]
    async fn complete_returns_first_choice_content() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|value| value.to_str().ok()),
                    Some("Bearer test-key")
                );
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "Text: hello");
                assert_eq!(body["max_tokens"], 600);
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "  {\"questions\": []}  "}}]
                }))
            }),
        );
        let base_url = spawn_server(router).await;

        let content =
            provider(base_url).complete("system", "Text: hello", 600, 0.3).await.expect("content");

        assert_eq!(content, "{\"questions\": []}");
    }

    #[tokio::test]
    async fn complete_maps_non_success_status() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error": {"message": "rate limited"}})),
                )
            }),
        );
        let base_url = spawn_server(router).await;

        let err = provider(base_url).complete("system", "user", 100, 0.3).await.unwrap_err();

        match err {
            ProviderError::Status { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_rejects_missing_content() {
        let router = Router::new()
            .route("/v1/chat/completions", post(|| async { Json(json!({"choices": []})) }));
        let base_url = spawn_server(router).await;

        let err = provider(base_url).complete("system", "user", 100, 0.3).await.unwrap_err();

        assert!(matches!(err, ProviderError::MalformedResponse));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let err = provider(format!("http://{addr}"))
            .complete("system", "user", 100, 0.3)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Transport(_)));
    }
}
