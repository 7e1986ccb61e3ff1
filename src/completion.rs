//! Completion API client (OpenAI-compatible text completions).

use crate::error::{CompletionError, Result};
use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;

/// Completion seam: a rendered prompt in, generated text out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Fixed model parameters sent with every request. The bot never
/// renegotiates parameters per request.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-instruct".into(),
            temperature: 0.7,
            max_tokens: 2048,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// HTTP client for an OpenAI-compatible `/v1/completions` endpoint.
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    params: ModelParams,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    text: String,
}

impl OpenAiClient {
    pub fn new(base_url: String, api_key: String, params: ModelParams) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .with_context(|| "failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
            params,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/completions", self.base_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": self.params.model,
            "prompt": prompt,
            "temperature": self.params.temperature,
            "max_tokens": self.params.max_tokens,
            "top_p": self.params.top_p,
            "frequency_penalty": self.params.frequency_penalty,
            "presence_penalty": self.params.presence_penalty,
        });

        let response = self
            .http_client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Transport(error.to_string())
                }
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|error| {
            CompletionError::Transport(format!("failed to read response body: {error}"))
        })?;

        if status.as_u16() == 429 {
            return Err(CompletionError::RateLimited(extract_api_message(&response_text)).into());
        }
        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message: extract_api_message(&response_text),
            }
            .into());
        }

        let parsed: CompletionResponse = serde_json::from_str(&response_text)
            .map_err(|error| CompletionError::MalformedResponse(error.to_string()))?;

        // First non-empty choice wins; an all-empty response is a failure.
        parsed
            .choices
            .into_iter()
            .map(|choice| choice.text)
            .find(|text| !text.is_empty())
            .ok_or_else(|| CompletionError::EmptyCompletion.into())
    }
}

fn extract_api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| "unknown error".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn client(base_url: String) -> OpenAiClient {
        OpenAiClient::new(base_url, "test-key".into(), ModelParams::default()).unwrap()
    }

    fn unwrap_completion_error(error: Error) -> CompletionError {
        match error {
            Error::Completion(inner) => inner,
            other => panic!("expected completion error, got {other}"),
        }
    }

    #[tokio::test]
    async fn returns_first_non_empty_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"text":""},{"text":"Paris."},{"text":"also Paris"}]}"#)
            .create_async()
            .await;

        let reply = client(server.url())
            .complete("User: capital of France?\nBot:")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply, "Paris.");
    }

    #[tokio::test]
    async fn rate_limit_is_classified_retryable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/completions")
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"message":"Rate limit reached"}}"#)
            .create_async()
            .await;

        let error = client(server.url()).complete("hi").await.unwrap_err();

        let error = unwrap_completion_error(error);
        assert!(matches!(error, CompletionError::RateLimited(_)));
        assert!(error.retryable());
    }

    #[tokio::test]
    async fn server_error_is_retryable_client_error_is_not() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/completions")
            .with_status(500)
            .with_body(r#"{"error":{"message":"internal"}}"#)
            .create_async()
            .await;

        let error = unwrap_completion_error(client(server.url()).complete("hi").await.unwrap_err());
        assert!(matches!(error, CompletionError::Api { status: 500, .. }));
        assert!(error.retryable());

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/completions")
            .with_status(400)
            .with_body(r#"{"error":{"message":"bad prompt"}}"#)
            .create_async()
            .await;

        let error = unwrap_completion_error(client(server.url()).complete("hi").await.unwrap_err());
        assert!(matches!(error, CompletionError::Api { status: 400, .. }));
        assert!(!error.retryable());
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/completions")
            .with_status(200)
            .with_body("<html>gateway error</html>")
            .create_async()
            .await;

        let error = unwrap_completion_error(client(server.url()).complete("hi").await.unwrap_err());
        assert!(matches!(error, CompletionError::MalformedResponse(_)));
        assert!(!error.retryable());
    }

    #[tokio::test]
    async fn all_empty_choices_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"text":""},{"text":""}]}"#)
            .create_async()
            .await;

        let error = unwrap_completion_error(client(server.url()).complete("hi").await.unwrap_err());
        assert!(matches!(error, CompletionError::EmptyCompletion));
    }
}
