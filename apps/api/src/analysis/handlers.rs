use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::analysis::manager::ScanOptions;
use crate::errors::AppError;
use crate::models::analysis::AnalysisRecord;
use crate::resume::store::get_resume_document;
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ScanRequestBody {
    pub user_id: Uuid,
    /// Re-scan this record instead of creating a new one.
    pub analysis_id: Option<Uuid>,
    pub job_description: Option<String>,
    pub job_application_id: Option<String>,
}

/// POST /api/v1/analyses
/// Returns 202 with the `pending` record; scoring continues in the background.
pub async fn handle_request_scan(
    State(state): State<AppState>,
    Json(req): Json<ScanRequestBody>,
) -> Result<(StatusCode, Json<AnalysisRecord>), AppError> {
    let resume = get_resume_document(&state.db, req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No resume found for this user".to_string()))?;

    let record = state
        .analyses
        .request_scan(
            req.user_id,
            resume,
            ScanOptions {
                analysis_id: req.analysis_id,
                job_description: req.job_description,
                job_application_id: req.job_application_id,
            },
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// GET /api/v1/analyses
pub async fn handle_list_analyses(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<AnalysisRecord>>, AppError> {
    Ok(Json(state.analyses.list(params.user_id).await?))
}

/// GET /api/v1/analyses/:id
pub async fn handle_get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<AnalysisRecord>, AppError> {
    Ok(Json(state.analyses.get(id, params.user_id).await?))
}

/// DELETE /api/v1/analyses/:id
pub async fn handle_delete_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    state.analyses.delete(id, params.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
