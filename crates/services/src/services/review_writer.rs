//! Provider-agnostic seam between the generation loop and the LLM clients.

use async_trait::async_trait;
use db::models::generated_review::ReviewProvider;
use thiserror::Error;

use super::gemini_api::{GeminiApiClient, GeminiApiError};
use super::openai_api::{OpenAiApiClient, OpenAiApiError};

#[derive(Debug, Clone, Error)]
pub enum ReviewWriterError {
    #[error("gemini: {0}")]
    Gemini(#[from] GeminiApiError),
    #[error("openai: {0}")]
    OpenAi(#[from] OpenAiApiError),
}

/// A backend able to draft one review text from a prompt.
#[async_trait]
pub trait ReviewWriter: Send + Sync {
    fn provider(&self) -> ReviewProvider;

    async fn write_review(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ReviewWriterError>;
}

#[async_trait]
impl ReviewWriter for GeminiApiClient {
    fn provider(&self) -> ReviewProvider {
        ReviewProvider::Gemini
    }

    async fn write_review(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ReviewWriterError> {
        Ok(self.generate(prompt, Some(system), max_tokens).await?)
    }
}

#[async_trait]
impl ReviewWriter for OpenAiApiClient {
    fn provider(&self) -> ReviewProvider {
        ReviewProvider::Openai
    }

    async fn write_review(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ReviewWriterError> {
        Ok(self.generate(prompt, Some(system), max_tokens).await?)
    }
}
