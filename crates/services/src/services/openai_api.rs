//! OpenAI chat completions client, the fallback review writer.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Error)]
pub enum OpenAiApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing api key: OPENAI_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("response contained no text")]
    EmptyCompletion,
}

impl OpenAiApiError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

impl ChatResponse {
    fn text(&self) -> Option<String> {
        let content = &self.choices.first()?.message.content;
        if content.is_empty() {
            None
        } else {
            Some(content.clone())
        }
    }
}

/// OpenAI chat completions client
#[derive(Debug, Clone)]
pub struct OpenAiApiClient {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl OpenAiApiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
    const TEMPERATURE: f32 = 0.9;

    /// Create a new client using the OPENAI_API_KEY environment variable
    pub fn from_env() -> Result<Self, OpenAiApiError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| OpenAiApiError::MissingApiKey)?;
        Self::new(SecretString::from(api_key), None)
    }

    /// Create a new client with the given API key
    pub fn new(api_key: SecretString, model: Option<String>) -> Result<Self, OpenAiApiError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("reviewtap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OpenAiApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Send a completion request, retrying transient failures.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<String, OpenAiApiError> {
        let request = self.build_request(prompt, system, max_tokens);

        let response = (|| async { self.send_request(&request).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &OpenAiApiError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "OpenAI API call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;

        response.text().ok_or(OpenAiApiError::EmptyCompletion)
    }

    fn build_request(&self, prompt: &str, system: Option<&str>, max_tokens: u32) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
            temperature: Self::TEMPERATURE,
        }
    }

    async fn send_request(&self, request: &ChatRequest) -> Result<ChatResponse, OpenAiApiError> {
        let res = self
            .http
            .post(OPENAI_API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<ChatResponse>()
                .await
                .map_err(|e| OpenAiApiError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(OpenAiApiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(OpenAiApiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(OpenAiApiError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> OpenAiApiError {
    if e.is_timeout() {
        OpenAiApiError::Timeout
    } else {
        OpenAiApiError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> OpenAiApiClient {
        OpenAiApiClient::new(SecretString::from("test-key".to_string()), None).unwrap()
    }

    #[test]
    fn test_build_request_with_system() {
        let client = test_client();
        let request = client.build_request("write a review", Some("be brief"), 320);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], DEFAULT_MODEL);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "be brief");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "write a review");
        assert_eq!(value["max_tokens"], 320);
    }

    #[test]
    fn test_build_request_without_system() {
        let client = test_client();
        let request = client.build_request("hello", None, 100);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_response_text() {
        let raw = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "Lovely spot, will return."}}
            ]
        }"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text().as_deref(), Some("Lovely spot, will return."));
    }

    #[test]
    fn test_parse_empty_response() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(response.text().is_none());
    }
}
