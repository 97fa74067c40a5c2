use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::info;

pub mod models;

#[derive(Clone)]
pub struct DBService {
    pub pool: SqlitePool,
}

impl DBService {
    /// Open (creating if necessary) the local store and run pending migrations.
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        let (options, max_connections) = if database_path == ":memory:" {
            // A pooled in-memory database is one database per connection,
            // so the pool must stay at a single connection.
            (SqliteConnectOptions::from_str("sqlite::memory:")?, 1)
        } else {
            (
                SqliteConnectOptions::new()
                    .filename(database_path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal),
                5,
            )
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options.foreign_keys(true))
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(path = %database_path, "local store ready");

        Ok(Self { pool })
    }

    /// In-memory store, used by tests.
    pub async fn memory() -> Result<Self, sqlx::Error> {
        Self::new(":memory:").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_apply_cleanly() {
        let db = DBService::memory().await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"review_cards"));
        assert!(names.contains(&"generated_reviews"));
        assert!(names.contains(&"card_tombstones"));
    }
}
