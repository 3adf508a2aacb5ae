use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::sections::{analyze_sections, SectionAnalysisResponse};
use crate::errors::AppError;
use crate::models::resume::{ResumeDocument, ResumeRow};
use crate::resume::store::{get_resume, get_resume_document, save_resume};
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeResponse {
    pub user_id: Uuid,
    pub resume: ResumeDocument,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ResumeRow> for ResumeResponse {
    type Error = AppError;

    fn try_from(row: ResumeRow) -> Result<Self, Self::Error> {
        let resume = serde_json::from_value(row.data)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Stored resume is invalid: {e}")))?;
        Ok(Self {
            user_id: row.user_id,
            resume,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Deserialize)]
pub struct SaveResumeRequest {
    pub user_id: Uuid,
    pub resume: ResumeDocument,
}

#[derive(Deserialize)]
pub struct SectionAnalysisRequest {
    pub user_id: Uuid,
}

/// GET /api/v1/resume
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeResponse>, AppError> {
    let row = get_resume(&state.db, params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No resume found for this user".to_string()))?;
    Ok(Json(row.try_into()?))
}

/// PUT /api/v1/resume
/// Any content write invalidates the user's section-analysis cache.
pub async fn handle_save_resume(
    State(state): State<AppState>,
    Json(req): Json<SaveResumeRequest>,
) -> Result<Json<ResumeResponse>, AppError> {
    let row = save_resume(&state.db, req.user_id, &req.resume).await?;
    info!("Saved resume for user {}", req.user_id);

    if let Err(e) = state.section_cache.clear(req.user_id).await {
        // The hash check still rejects the stale entry on the next read.
        warn!("Failed to clear section cache for user {}: {e:#}", req.user_id);
    }

    Ok(Json(row.try_into()?))
}

/// POST /api/v1/resume/section-analysis
pub async fn handle_section_analysis(
    State(state): State<AppState>,
    Json(req): Json<SectionAnalysisRequest>,
) -> Result<Json<SectionAnalysisResponse>, AppError> {
    let resume = get_resume_document(&state.db, req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No resume found for this user".to_string()))?;
    if resume.is_empty() {
        return Err(AppError::Validation("Resume has no content to analyse".to_string()));
    }

    let response = analyze_sections(
        state.llm.as_ref(),
        state.section_cache.as_ref(),
        req.user_id,
        &resume,
    )
    .await?;
    Ok(Json(response))
}
