//! Gemini API client for review text generation.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Error)]
pub enum GeminiApiError {
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
    #[error("missing api key: GEMINI_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("response contained no text")]
    EmptyCompletion,
}

impl GeminiApiError {
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
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part { text: text.into() }],
        }
    }

    fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GeminiResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text = content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() { None } else { Some(text) }
    }
}

/// Gemini generateContent client
#[derive(Debug, Clone)]
pub struct GeminiApiClient {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl GeminiApiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
    const TEMPERATURE: f32 = 0.9;

    /// Create a new client using the GEMINI_API_KEY environment variable
    pub fn from_env() -> Result<Self, GeminiApiError> {
        let api_key =
            std::env::var("GEMINI_API_KEY").map_err(|_| GeminiApiError::MissingApiKey)?;
        Self::new(SecretString::from(api_key), None)
    }

    /// Create a new client with the given API key
    pub fn new(api_key: SecretString, model: Option<String>) -> Result<Self, GeminiApiError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("reviewtap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GeminiApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Send a generation request, retrying transient failures.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_output_tokens: u32,
    ) -> Result<String, GeminiApiError> {
        let request = build_request(prompt, system, max_output_tokens, Self::TEMPERATURE);

        let response = (|| async { self.send_request(&request).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &GeminiApiError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "Gemini API call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;

        response.text().ok_or(GeminiApiError::EmptyCompletion)
    }

    async fn send_request(
        &self,
        request: &GeminiRequest,
    ) -> Result<GeminiResponse, GeminiApiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            GEMINI_API_BASE,
            self.model,
            self.api_key.expose_secret()
        );

        let res = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<GeminiResponse>()
                .await
                .map_err(|e| GeminiApiError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(GeminiApiError::InvalidApiKey)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(GeminiApiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(GeminiApiError::Http { status, body })
            }
        }
    }
}

fn build_request(
    prompt: &str,
    system: Option<&str>,
    max_output_tokens: u32,
    temperature: f32,
) -> GeminiRequest {
    GeminiRequest {
        contents: vec![Content::user(prompt)],
        system_instruction: system.map(Content::system),
        generation_config: GenerationConfig {
            temperature,
            max_output_tokens,
        },
    }
}

fn map_reqwest_error(e: reqwest::Error) -> GeminiApiError {
    if e.is_timeout() {
        GeminiApiError::Timeout
    } else {
        GeminiApiError::Transport(e.to_string())
    }
}
