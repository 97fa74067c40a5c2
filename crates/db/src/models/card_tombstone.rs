use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

/// Record of a locally deleted card whose remote copy still has to be
/// removed. The sync loop drains these against Supabase; hydration
/// consults them so a stale remote row cannot re-insert the card.
#[derive(Debug, Clone, FromRow)]
pub struct CardTombstone {
    pub card_id: Uuid,
    pub deleted_at: DateTime<Utc>,
}

impl CardTombstone {
    pub async fn create<'e, E>(executor: E, card_id: Uuid) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("INSERT OR IGNORE INTO card_tombstones (card_id) VALUES ($1)")
            .bind(card_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CardTombstone>(
            "SELECT card_id, deleted_at FROM card_tombstones ORDER BY deleted_at ASC",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn exists(pool: &SqlitePool, card_id: Uuid) -> Result<bool, sqlx::Error> {
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT card_id FROM card_tombstones WHERE card_id = $1")
                .bind(card_id)
                .fetch_optional(pool)
                .await?;
        Ok(found.is_some())
    }

    /// Remove a tombstone once the remote copy is confirmed gone.
    pub async fn delete(pool: &SqlitePool, card_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM card_tombstones WHERE card_id = $1")
            .bind(card_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
