pub mod auth;
pub mod cards;
pub mod health;
pub mod public;

use axum::Router;

use crate::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/api",
        Router::new()
            .merge(auth::router(state))
            .merge(cards::router(state))
            .merge(public::router(state))
            .merge(health::router(state)),
    )
}
