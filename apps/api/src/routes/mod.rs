pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::analysis::handlers as analysis;
use crate::resume::handlers as resume;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume
        .route(
            "/api/v1/resume",
            get(resume::handle_get_resume).put(resume::handle_save_resume),
        )
        .route(
            "/api/v1/resume/section-analysis",
            post(resume::handle_section_analysis),
        )
        // Analyses
        .route(
            "/api/v1/analyses",
            get(analysis::handle_list_analyses).post(analysis::handle_request_scan),
        )
        .route(
            "/api/v1/analyses/:id",
            get(analysis::handle_get_analysis).delete(analysis::handle_delete_analysis),
        )
        .with_state(state)
}
