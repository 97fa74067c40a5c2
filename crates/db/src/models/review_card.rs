use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::slug;
use uuid::Uuid;

/// Voice the generated review text should be written in
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "review_tone", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewTone {
    #[default]
    Friendly,
    Professional,
    Casual,
    Grateful,
}

/// A business profile behind one physical review card.
///
/// `service_tags` and `languages` are stored as raw JSON arrays and parsed
/// lazily via the `parsed_*` helpers.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ReviewCard {
    pub id: Uuid,
    pub business_name: String,
    pub category: String,
    pub maps_url: String,
    pub slug: String,
    pub service_tags: String,
    pub languages: String,
    pub default_language: String,
    pub tone: ReviewTone,
    pub enabled: bool,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateReviewCard {
    pub business_name: String,
    pub category: String,
    pub maps_url: String,
    pub service_tags: Vec<String>,
    pub languages: Vec<String>,
    pub default_language: Option<String>,
    pub tone: Option<ReviewTone>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateReviewCard {
    pub business_name: Option<String>,
    pub category: Option<String>,
    pub maps_url: Option<String>,
    pub service_tags: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub default_language: Option<String>,
    pub tone: Option<ReviewTone>,
}

/// What an anonymous visitor scanning a card is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PublicCardView {
    pub slug: String,
    pub business_name: String,
    pub category: String,
    pub maps_url: String,
    pub service_tags: Vec<String>,
    pub languages: Vec<String>,
    pub default_language: String,
    pub tone: ReviewTone,
}

impl From<&ReviewCard> for PublicCardView {
    fn from(card: &ReviewCard) -> Self {
        Self {
            slug: card.slug.clone(),
            business_name: card.business_name.clone(),
            category: card.category.clone(),
            maps_url: card.maps_url.clone(),
            service_tags: card.parsed_service_tags(),
            languages: card.parsed_languages(),
            default_language: card.default_language.clone(),
            tone: card.tone,
        }
    }
}

impl ReviewCard {
    pub fn parsed_service_tags(&self) -> Vec<String> {
        serde_json::from_str(&self.service_tags).unwrap_or_default()
    }

    pub fn parsed_languages(&self) -> Vec<String> {
        serde_json::from_str(&self.languages).unwrap_or_default()
    }

    pub fn offers_language(&self, language: &str) -> bool {
        self.default_language == language
            || self.parsed_languages().iter().any(|l| l == language)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateReviewCard,
        id: Uuid,
        slug: &str,
    ) -> Result<Self, sqlx::Error> {
        let service_tags = serde_json::to_string(&data.service_tags).unwrap_or_else(|_| "[]".into());
        let languages = serde_json::to_string(&data.languages).unwrap_or_else(|_| "[]".into());
        let default_language = data
            .default_language
            .clone()
            .or_else(|| data.languages.first().cloned())
            .unwrap_or_else(|| "en".to_string());
        let tone = data.tone.unwrap_or_default();

        sqlx::query_as::<_, ReviewCard>(
            r#"INSERT INTO review_cards (id, business_name, category, maps_url, slug, service_tags, languages, default_language, tone)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, business_name, category, maps_url, slug, service_tags, languages, default_language, tone, enabled, synced, created_at, updated_at"#,
        )
        .bind(id)
        .bind(&data.business_name)
        .bind(&data.category)
        .bind(&data.maps_url)
        .bind(slug)
        .bind(service_tags)
        .bind(languages)
        .bind(default_language)
        .bind(tone)
        .fetch_one(pool)
        .await
    }

    /// Create with a freshly generated slug, retrying on the UNIQUE constraint.
    pub async fn create_with_unique_slug(
        pool: &SqlitePool,
        data: &CreateReviewCard,
    ) -> Result<Self, sqlx::Error> {
        let mut last_err = None;
        for _ in 0..5 {
            let candidate = slug::generate(slug::SLUG_LEN);
            match Self::create(pool, data, Uuid::new_v4(), &candidate).await {
                Ok(card) => return Ok(card),
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    last_err = Some(sqlx::Error::Database(db_err));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(sqlx::Error::RowNotFound))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ReviewCard>(
            r#"SELECT id, business_name, category, maps_url, slug, service_tags, languages, default_language, tone, enabled, synced, created_at, updated_at
               FROM review_cards
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ReviewCard>(
            r#"SELECT id, business_name, category, maps_url, slug, service_tags, languages, default_language, tone, enabled, synced, created_at, updated_at
               FROM review_cards
               WHERE slug = $1"#,
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ReviewCard>(
            r#"SELECT id, business_name, category, maps_url, slug, service_tags, languages, default_language, tone, enabled, synced, created_at, updated_at
               FROM review_cards
               ORDER BY created_at DESC"#,
        )
        .fetch_all(pool)
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        business_name: String,
        category: String,
        maps_url: String,
        service_tags: Vec<String>,
        languages: Vec<String>,
        default_language: String,
        tone: ReviewTone,
    ) -> Result<Self, sqlx::Error> {
        let service_tags = serde_json::to_string(&service_tags).unwrap_or_else(|_| "[]".into());
        let languages = serde_json::to_string(&languages).unwrap_or_else(|_| "[]".into());

        sqlx::query_as::<_, ReviewCard>(
            r#"UPDATE review_cards
               SET business_name = $2, category = $3, maps_url = $4, service_tags = $5, languages = $6, default_language = $7, tone = $8,
                   synced = 0, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, business_name, category, maps_url, slug, service_tags, languages, default_language, tone, enabled, synced, created_at, updated_at"#,
        )
        .bind(id)
        .bind(business_name)
        .bind(category)
        .bind(maps_url)
        .bind(service_tags)
        .bind(languages)
        .bind(default_language)
        .bind(tone)
        .fetch_one(pool)
        .await
    }

    pub async fn set_enabled(
        pool: &SqlitePool,
        id: Uuid,
        enabled: bool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ReviewCard>(
            r#"UPDATE review_cards
               SET enabled = $2, synced = 0, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, business_name, category, maps_url, slug, service_tags, languages, default_language, tone, enabled, synced, created_at, updated_at"#,
        )
        .bind(id)
        .bind(enabled)
        .fetch_one(pool)
        .await
    }

    /// Delete a card and its generated reviews in one transaction. A
    /// tombstone is written alongside so the remote copy gets removed too
    /// instead of resurrecting the card on the next hydration.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        super::generated_review::GeneratedReview::delete_by_card(&mut *tx, id).await?;
        let result = sqlx::query("DELETE FROM review_cards WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() > 0 {
            super::card_tombstone::CardTombstone::create(&mut *tx, id).await?;
        }
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    pub async fn find_unsynced(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ReviewCard>(
            r#"SELECT id, business_name, category, maps_url, slug, service_tags, languages, default_language, tone, enabled, synced, created_at, updated_at
               FROM review_cards
               WHERE synced = 0
               ORDER BY updated_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn mark_synced(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE review_cards SET synced = 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Merge a remote copy into the local store. The remote row only wins
    /// when its `updated_at` is strictly newer, and a card deleted locally
    /// stays deleted until its tombstone has been pushed. Returns whether
    /// anything was written.
    pub async fn upsert_from_remote(
        pool: &SqlitePool,
        remote: &ReviewCard,
    ) -> Result<bool, sqlx::Error> {
        if super::card_tombstone::CardTombstone::exists(pool, remote.id).await? {
            return Ok(false);
        }
        match Self::find_by_id(pool, remote.id).await? {
            None => {
                sqlx::query(
                    r#"INSERT INTO review_cards (id, business_name, category, maps_url, slug, service_tags, languages, default_language, tone, enabled, synced, created_at, updated_at)
                       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 1, $11, $12)"#,
                )
                .bind(remote.id)
                .bind(&remote.business_name)
                .bind(&remote.category)
                .bind(&remote.maps_url)
                .bind(&remote.slug)
                .bind(&remote.service_tags)
                .bind(&remote.languages)
                .bind(&remote.default_language)
                .bind(remote.tone)
                .bind(remote.enabled)
                .bind(remote.created_at)
                .bind(remote.updated_at)
                .execute(pool)
                .await?;
                Ok(true)
            }
            Some(local) if remote.updated_at > local.updated_at => {
                sqlx::query(
                    r#"UPDATE review_cards
                       SET business_name = $2, category = $3, maps_url = $4, slug = $5, service_tags = $6, languages = $7, default_language = $8, tone = $9, enabled = $10,
                           synced = 1, updated_at = $11
                       WHERE id = $1"#,
                )
                .bind(remote.id)
                .bind(&remote.business_name)
                .bind(&remote.category)
                .bind(&remote.maps_url)
                .bind(&remote.slug)
                .bind(&remote.service_tags)
                .bind(&remote.languages)
                .bind(&remote.default_language)
                .bind(remote.tone)
                .bind(remote.enabled)
                .bind(remote.updated_at)
                .execute(pool)
                .await?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }
}
