//! Bearer-token extractor guarding owner routes.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use utils::{response::ApiResponse, token::Claims};

use crate::AppState;

/// Present in a handler's arguments, rejects the request with 401 unless a
/// valid owner token was sent.
pub struct AuthSession(pub Claims);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .unwrap_or_default();
        if token.is_empty() {
            return Err(unauthorized("missing bearer token"));
        }
        match state.auth().verify(token) {
            Ok(claims) => Ok(AuthSession(claims)),
            Err(_) => Err(unauthorized("invalid or expired token")),
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error(message)),
    )
        .into_response()
}
