use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::info;

use crate::error::ResearchError;
use crate::research::report::TrendReport;
use crate::research::request::ResearchRequest;
use crate::state::AppState;

/// `POST /api/research`
pub async fn research(
    State(state): State<AppState>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<TrendReport>, ResearchError> {
    let Json(request) =
        payload.map_err(|rejection| ResearchError::InvalidRequest(rejection.body_text()))?;

    info!(
        topic = request.topic(),
        industries = request.industries.len(),
        channels = request.channels.len(),
        mode = %request.mode,
        "research request received"
    );

    let report = state.engine.research(&request).await?;
    Ok(Json(report))
}
