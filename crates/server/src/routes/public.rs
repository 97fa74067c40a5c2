//! Unauthenticated routes behind the card slug a customer scans.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::generated_review::{GenerateReviewRequest, GeneratedReviewResponse};
use db::models::review_card::{PublicCardView, ReviewCard};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Card details shown on the public review form. Disabled cards are
/// indistinguishable from missing ones.
pub async fn get_public_card(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ResponseJson<ApiResponse<PublicCardView>>, ApiError> {
    let card = ReviewCard::find_by_slug(&state.db().pool, &slug)
        .await?
        .filter(|card| card.enabled)
        .ok_or(ApiError::NotFound("review card"))?;
    Ok(ResponseJson(ApiResponse::success(PublicCardView::from(
        &card,
    ))))
}

/// Generate one review text for a customer.
pub async fn generate_review(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<GenerateReviewRequest>,
) -> Result<ResponseJson<ApiResponse<GeneratedReviewResponse>>, ApiError> {
    let card = ReviewCard::find_by_slug(&state.db().pool, &slug)
        .await?
        .ok_or(ApiError::NotFound("review card"))?;
    let review = state.generation().generate(&card, &payload).await?;
    state.spawn_sync();
    Ok(ResponseJson(ApiResponse::success(GeneratedReviewResponse {
        review,
        maps_url: card.maps_url,
    })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/public/cards/{slug}", get(get_public_card))
        .route("/public/cards/{slug}/reviews", post(generate_review))
}
