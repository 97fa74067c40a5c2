use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::review_card::ReviewTone;

/// Which backend produced a review text
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display,
)]
#[sqlx(type_name = "review_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewProvider {
    Gemini,
    Openai,
    Canned,
}

/// Target character-count band for generated text
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LengthBand {
    Short,
    #[default]
    Medium,
    Long,
}

impl LengthBand {
    pub fn char_range(&self) -> RangeInclusive<usize> {
        match self {
            LengthBand::Short => 80..=160,
            LengthBand::Medium => 160..=300,
            LengthBand::Long => 300..=500,
        }
    }

    pub fn contains(&self, chars: usize) -> bool {
        self.char_range().contains(&chars)
    }
}

/// One review text handed to a customer, kept for history and the
/// uniqueness window.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct GeneratedReview {
    pub id: Uuid,
    pub card_id: Uuid,
    pub rating: i32,
    pub language: String,
    pub tone: ReviewTone,
    pub service_tags: String,
    pub content: String,
    pub char_count: i32,
    pub provider: ReviewProvider,
    pub content_hash: String,
    #[ts(type = "number")]
    pub ngram_hash: i64,
    pub attempts: i32,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateGeneratedReview {
    pub card_id: Uuid,
    pub rating: i32,
    pub language: String,
    pub tone: ReviewTone,
    pub service_tags: Vec<String>,
    pub content: String,
    pub provider: ReviewProvider,
    pub content_hash: String,
    pub ngram_hash: i64,
    pub attempts: i32,
}

/// Body of `POST /api/public/cards/{slug}/reviews`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct GenerateReviewRequest {
    pub rating: i32,
    pub language: Option<String>,
    pub tone: Option<ReviewTone>,
    pub service_tags: Option<Vec<String>>,
    pub length: Option<LengthBand>,
}

/// Generated text plus the link the customer is sent to afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct GeneratedReviewResponse {
    pub review: GeneratedReview,
    pub maps_url: String,
}

impl GeneratedReview {
    pub fn parsed_service_tags(&self) -> Vec<String> {
        serde_json::from_str(&self.service_tags).unwrap_or_default()
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateGeneratedReview,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let service_tags = serde_json::to_string(&data.service_tags).unwrap_or_else(|_| "[]".into());
        let char_count = data.content.chars().count() as i32;

        sqlx::query_as::<_, GeneratedReview>(
            r#"INSERT INTO generated_reviews (id, card_id, rating, language, tone, service_tags, content, char_count, provider, content_hash, ngram_hash, attempts)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING id, card_id, rating, language, tone, service_tags, content, char_count, provider, content_hash, ngram_hash, attempts, synced, created_at"#,
        )
        .bind(id)
        .bind(data.card_id)
        .bind(data.rating)
        .bind(&data.language)
        .bind(data.tone)
        .bind(service_tags)
        .bind(&data.content)
        .bind(char_count)
        .bind(data.provider)
        .bind(&data.content_hash)
        .bind(data.ngram_hash)
        .bind(data.attempts)
        .fetch_one(pool)
        .await
    }

    /// Most recent reviews for a card, newest first. Serves both the
    /// uniqueness window and the owner's history view.
    pub async fn find_recent_by_card(
        pool: &SqlitePool,
        card_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, GeneratedReview>(
            r#"SELECT id, card_id, rating, language, tone, service_tags, content, char_count, provider, content_hash, ngram_hash, attempts, synced, created_at
               FROM generated_reviews
               WHERE card_id = $1
               ORDER BY created_at DESC
               LIMIT $2"#,
        )
        .bind(card_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_card(pool: &SqlitePool, card_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM generated_reviews WHERE card_id = $1",
        )
        .bind(card_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_unsynced(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, GeneratedReview>(
            r#"SELECT id, card_id, rating, language, tone, service_tags, content, char_count, provider, content_hash, ngram_hash, attempts, synced, created_at
               FROM generated_reviews
               WHERE synced = 0
               ORDER BY created_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn mark_synced(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE generated_reviews SET synced = 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete_by_card<'e, E>(executor: E, card_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM generated_reviews WHERE card_id = $1")
            .bind(card_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
