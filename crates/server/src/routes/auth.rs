//! Owner login.

use axum::{Json, Router, extract::State, response::Json as ResponseJson, routing::post};
use services::services::auth::{LoginRequest, LoginResponse};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Exchange the owner credential pair for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<LoginResponse>>, ApiError> {
    let token = state.auth().login(&payload.mobile, &payload.password)?;
    Ok(ResponseJson(ApiResponse::success(LoginResponse { token })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}
