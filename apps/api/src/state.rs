use std::sync::Arc;

use sqlx::PgPool;

use crate::analysis::manager::AnalysisManager;
use crate::analysis::sections::SectionCache;
use crate::llm_client::LlmBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: Arc<dyn LlmBackend>,
    /// Per-user section-analysis cache. Cleared on every resume write.
    pub section_cache: Arc<dyn SectionCache>,
    /// Request side of the analysis lifecycle; scans run on the background worker.
    pub analyses: AnalysisManager,
}
