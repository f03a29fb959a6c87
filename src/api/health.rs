use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Liveness {
    ok: bool,
}

/// Liveness only; never touches the provider.
pub async fn health() -> Json<Liveness> {
    Json(Liveness { ok: true })
}
