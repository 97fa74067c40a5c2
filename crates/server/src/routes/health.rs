//! Liveness probe, checks the database connection too.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct HealthStatus {
    pub database: String,
    pub sync: String,
}

pub async fn health(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<HealthStatus>>, ApiError> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db().pool)
        .await?;
    let sync = if state.sync().is_some() {
        "enabled"
    } else {
        "local-only"
    };
    Ok(ResponseJson(ApiResponse::success(HealthStatus {
        database: "ok".to_string(),
        sync: sync.to_string(),
    })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/health", get(health))
}
