mod health;
mod research;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/research", post(research::research))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
