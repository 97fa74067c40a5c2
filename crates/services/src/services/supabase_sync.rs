//! Best-effort replication of the local store to Supabase.
//!
//! SQLite remains the source of truth for serving requests. Rows carry a
//! `synced` flag; this service drains unsynced rows to PostgREST on an
//! interval and hydrates cards back on boot. Local deletes leave a
//! tombstone that the same loop replays as a remote DELETE. Conflicting
//! card edits resolve by last-writer-wins on `updated_at`.

use std::sync::Arc;
use std::time::Duration;

use db::models::card_tombstone::CardTombstone;
use db::models::generated_review::GeneratedReview;
use db::models::review_card::ReviewCard;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const REVIEW_CARDS_TABLE: &str = "review_cards";
const GENERATED_REVIEWS_TABLE: &str = "generated_reviews";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SupabaseSyncError {
    #[error("failed to build http client: {0}")]
    ClientBuild(String),
    #[error("supabase request failed: {0}")]
    Transport(String),
    #[error("supabase request timed out")]
    Timeout,
    #[error("supabase rejected the service key")]
    Unauthorized,
    #[error("supabase api error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("unexpected supabase response: {0}")]
    InvalidResponse(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct SupabaseSyncService {
    pool: SqlitePool,
    http: Client,
    base_url: String,
    service_key: SecretString,
    poll_interval: Duration,
}

impl SupabaseSyncService {
    pub fn new(
        pool: SqlitePool,
        base_url: &str,
        service_key: SecretString,
        poll_interval: Duration,
    ) -> Result<Self, SupabaseSyncError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("reviewtap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SupabaseSyncError::ClientBuild(e.to_string()))?;
        Ok(Self {
            pool,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            poll_interval,
        })
    }

    /// Run the push loop until the process exits.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sync_once().await {
                    warn!("sync pass failed: {}", e);
                }
            }
        })
    }

    /// One push pass. Rows that fail to upload stay unsynced and are
    /// retried on the next tick; likewise a tombstone survives until its
    /// remote delete goes through.
    pub async fn sync_once(&self) -> Result<(), SupabaseSyncError> {
        let tombstones = CardTombstone::list_all(&self.pool).await?;
        let mut cards_deleted = 0usize;
        for tombstone in &tombstones {
            match self.delete_remote_card(tombstone.card_id).await {
                Ok(()) => {
                    CardTombstone::delete(&self.pool, tombstone.card_id).await?;
                    cards_deleted += 1;
                }
                Err(e) => {
                    warn!(card_id = %tombstone.card_id, "failed to delete remote review card: {}", e)
                }
            }
        }

        let cards = ReviewCard::find_unsynced(&self.pool).await?;
        let mut cards_pushed = 0usize;
        for card in &cards {
            match self.push(REVIEW_CARDS_TABLE, card).await {
                Ok(()) => {
                    ReviewCard::mark_synced(&self.pool, card.id).await?;
                    cards_pushed += 1;
                }
                Err(e) => warn!(card_id = %card.id, "failed to push review card: {}", e),
            }
        }

        let reviews = GeneratedReview::find_unsynced(&self.pool).await?;
        let mut reviews_pushed = 0usize;
        for review in &reviews {
            match self.push(GENERATED_REVIEWS_TABLE, review).await {
                Ok(()) => {
                    GeneratedReview::mark_synced(&self.pool, review.id).await?;
                    reviews_pushed += 1;
                }
                Err(e) => warn!(review_id = %review.id, "failed to push generated review: {}", e),
            }
        }

        if cards_pushed > 0 || reviews_pushed > 0 || cards_deleted > 0 {
            info!(
                cards_pushed,
                reviews_pushed,
                cards_deleted,
                "pushed local changes to supabase"
            );
        } else {
            debug!("nothing to sync");
        }
        Ok(())
    }

    /// Pull remote cards into the local store, keeping whichever side
    /// changed last. Returns how many rows were written locally.
    pub async fn hydrate(&self) -> Result<usize, SupabaseSyncError> {
        let url = format!("{}/rest/v1/{}?select=*", self.base_url, REVIEW_CARDS_TABLE);
        let res = self
            .http
            .get(&url)
            .header("apikey", self.service_key.expose_secret())
            .bearer_auth(self.service_key.expose_secret())
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let res = check_status(res).await?;
        let remote: Vec<ReviewCard> = res
            .json()
            .await
            .map_err(|e| SupabaseSyncError::InvalidResponse(e.to_string()))?;

        let mut applied = 0usize;
        for card in &remote {
            if ReviewCard::upsert_from_remote(&self.pool, card).await? {
                applied += 1;
            }
        }
        info!(fetched = remote.len(), applied, "hydrated review cards from supabase");
        Ok(applied)
    }

    /// Remove a deleted card from the remote store, reviews first so the
    /// foreign key never dangles.
    async fn delete_remote_card(&self, card_id: uuid::Uuid) -> Result<(), SupabaseSyncError> {
        self.delete_rows(GENERATED_REVIEWS_TABLE, "card_id", card_id)
            .await?;
        self.delete_rows(REVIEW_CARDS_TABLE, "id", card_id).await
    }

    async fn delete_rows(
        &self,
        table: &str,
        column: &str,
        id: uuid::Uuid,
    ) -> Result<(), SupabaseSyncError> {
        let url = format!("{}/rest/v1/{}?{}=eq.{}", self.base_url, table, column, id);
        let res = self
            .http
            .delete(&url)
            .header("apikey", self.service_key.expose_secret())
            .bearer_auth(self.service_key.expose_secret())
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(res).await?;
        Ok(())
    }

    /// PostgREST upsert keyed on the table's primary key.
    async fn push<T: Serialize>(&self, table: &str, row: &T) -> Result<(), SupabaseSyncError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let res = self
            .http
            .post(&url)
            .header("apikey", self.service_key.expose_secret())
            .bearer_auth(self.service_key.expose_secret())
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row])
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(res).await?;
        Ok(())
    }
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, SupabaseSyncError> {
    let status = res.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SupabaseSyncError::Unauthorized);
    }
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(SupabaseSyncError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(res)
}

fn map_reqwest_error(e: reqwest::Error) -> SupabaseSyncError {
    if e.is_timeout() {
        SupabaseSyncError::Timeout
    } else {
        SupabaseSyncError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::DBService;

    #[tokio::test]
    async fn test_new_trims_trailing_slash() {
        let db = DBService::memory().await.unwrap();
        let service = SupabaseSyncService::new(
            db.pool.clone(),
            "https://example.supabase.co/",
            SecretString::from("key".to_string()),
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(service.base_url, "https://example.supabase.co");
    }
}
