//! Analysis record persistence.
//!
//! The record manager only ever goes through [`AnalysisStore`]. Postgres is the
//! production backend; tests use an in-memory double.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::analysis::{AnalysisRecord, AnalysisRow, AtsScores, ScanOutcome};

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert(&self, record: &AnalysisRecord) -> Result<()>;

    /// Moves an owned `completed|failed` record back to `pending` for a
    /// re-scan, clearing its previous results. Returns `None` when the record
    /// does not exist, is not owned by `user_id`, or is already pending.
    async fn reset_to_pending(
        &self,
        id: Uuid,
        user_id: Uuid,
        job_description: Option<&str>,
        job_application_id: Option<&str>,
    ) -> Result<Option<AnalysisRecord>>;

    async fn complete(&self, id: Uuid, outcome: &ScanOutcome) -> Result<()>;

    async fn fail(&self, id: Uuid, error_info: &str, ats_scores: &AtsScores) -> Result<()>;

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<AnalysisRecord>>;

    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>>;

    /// Owner-scoped delete. Returns whether a record was removed.
    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool>;
}

pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn insert(&self, record: &AnalysisRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analyses
                (id, user_id, status, job_description, job_application_id,
                 score, category_scores, issues_count, detailed_results,
                 ats_scores, error_info, created_at, analyzed_at)
            VALUES ($1, $2, $3, $4, $5, NULL, '{}'::jsonb, 0, '{}'::jsonb, NULL, NULL, $6, NULL)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.status.as_str())
        .bind(&record.job_description)
        .bind(&record.job_application_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert analysis record")?;
        Ok(())
    }

    async fn reset_to_pending(
        &self,
        id: Uuid,
        user_id: Uuid,
        job_description: Option<&str>,
        job_application_id: Option<&str>,
    ) -> Result<Option<AnalysisRecord>> {
        let row: Option<AnalysisRow> = sqlx::query_as(
            r#"
            UPDATE analyses
            SET status = 'pending',
                job_description = COALESCE($3, job_description),
                job_application_id = COALESCE($4, job_application_id),
                score = NULL,
                category_scores = '{}'::jsonb,
                issues_count = 0,
                detailed_results = '{}'::jsonb,
                ats_scores = NULL,
                error_info = NULL,
                analyzed_at = NULL
            WHERE id = $1 AND user_id = $2 AND status <> 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(job_description)
        .bind(job_application_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to reset analysis record")?;

        row.map(AnalysisRecord::try_from).transpose()
    }

    async fn complete(&self, id: Uuid, outcome: &ScanOutcome) -> Result<()> {
        let score = outcome.score.map(|s| s as i32);
        sqlx::query(
            r#"
            UPDATE analyses
            SET status = 'completed',
                score = $2,
                category_scores = $3,
                issues_count = $4,
                detailed_results = $5,
                ats_scores = $6,
                error_info = NULL,
                analyzed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(score)
        .bind(serde_json::to_value(&outcome.category_scores)?)
        .bind(outcome.issues_count as i32)
        .bind(serde_json::to_value(&outcome.detailed_results)?)
        .bind(serde_json::to_value(&outcome.ats_scores)?)
        .execute(&self.pool)
        .await
        .context("Failed to write completed analysis")?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, error_info: &str, ats_scores: &AtsScores) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE analyses
            SET status = 'failed',
                score = NULL,
                category_scores = '{}'::jsonb,
                issues_count = 0,
                detailed_results = '{}'::jsonb,
                ats_scores = $3,
                error_info = $2,
                analyzed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_info)
        .bind(serde_json::to_value(ats_scores)?)
        .execute(&self.pool)
        .await
        .context("Failed to write failed analysis")?;
        Ok(())
    }

    async fn get(&self, id: Uuid, user_id: Uuid) -> Result<Option<AnalysisRecord>> {
        let row: Option<AnalysisRow> =
            sqlx::query_as("SELECT * FROM analyses WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(AnalysisRecord::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        let rows: Vec<AnalysisRow> =
            sqlx::query_as("SELECT * FROM analyses WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(AnalysisRecord::try_from).collect()
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analyses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
