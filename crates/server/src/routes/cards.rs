//! Owner-facing card management. Every route here requires a session.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::generated_review::GeneratedReview;
use db::models::review_card::{CreateReviewCard, ReviewCard, UpdateReviewCard};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, session::AuthSession};

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 200;

pub async fn list_cards(
    _session: AuthSession,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<ReviewCard>>>, ApiError> {
    let cards = ReviewCard::list_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(cards)))
}

pub async fn create_card(
    _session: AuthSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateReviewCard>,
) -> Result<ResponseJson<ApiResponse<ReviewCard>>, ApiError> {
    let card = ReviewCard::create_with_unique_slug(&state.db().pool, &payload).await?;
    state.spawn_sync();
    Ok(ResponseJson(ApiResponse::success(card)))
}

pub async fn get_card(
    _session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ReviewCard>>, ApiError> {
    let card = ReviewCard::find_by_id(&state.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("review card"))?;
    Ok(ResponseJson(ApiResponse::success(card)))
}

/// Partial update; omitted fields keep their current values.
pub async fn update_card(
    _session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReviewCard>,
) -> Result<ResponseJson<ApiResponse<ReviewCard>>, ApiError> {
    let existing = ReviewCard::find_by_id(&state.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("review card"))?;

    let service_tags = payload
        .service_tags
        .unwrap_or_else(|| existing.parsed_service_tags());
    let languages = payload
        .languages
        .unwrap_or_else(|| existing.parsed_languages());

    let card = ReviewCard::update(
        &state.db().pool,
        id,
        payload.business_name.unwrap_or(existing.business_name),
        payload.category.unwrap_or(existing.category),
        payload.maps_url.unwrap_or(existing.maps_url),
        service_tags,
        languages,
        payload.default_language.unwrap_or(existing.default_language),
        payload.tone.unwrap_or(existing.tone),
    )
    .await?;
    state.spawn_sync();
    Ok(ResponseJson(ApiResponse::success(card)))
}

pub async fn delete_card(
    _session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let deleted = ReviewCard::delete(&state.db().pool, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("review card"));
    }
    state.spawn_sync();
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn enable_card(
    _session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ReviewCard>>, ApiError> {
    let card = ReviewCard::set_enabled(&state.db().pool, id, true).await?;
    state.spawn_sync();
    Ok(ResponseJson(ApiResponse::success(card)))
}

pub async fn disable_card(
    _session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ReviewCard>>, ApiError> {
    let card = ReviewCard::set_enabled(&state.db().pool, id, false).await?;
    state.spawn_sync();
    Ok(ResponseJson(ApiResponse::success(card)))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Recent generated reviews for one card, newest first.
pub async fn card_reviews(
    _session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<GeneratedReview>>>, ApiError> {
    ReviewCard::find_by_id(&state.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("review card"))?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let reviews = GeneratedReview::find_recent_by_card(&state.db().pool, id, limit).await?;
    Ok(ResponseJson(ApiResponse::success(reviews)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/cards", get(list_cards).post(create_card))
        .route(
            "/cards/{id}",
            get(get_card).put(update_card).delete(delete_card),
        )
        .route("/cards/{id}/enable", post(enable_card))
        .route("/cards/{id}/disable", post(disable_card))
        .route("/cards/{id}/reviews", get(card_reviews))
}
