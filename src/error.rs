use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors that end a research request. Parse failures never surface here.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("upstream generation failed: {0:#}")]
    Upstream(anyhow::Error),
}

impl ResearchError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResearchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ResearchError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ResearchError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "research request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
