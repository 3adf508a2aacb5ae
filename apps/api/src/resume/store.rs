//! One resume per user, stored as a JSONB document.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::resume::{ResumeDocument, ResumeRow};

pub async fn get_resume(pool: &PgPool, user_id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM resumes WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Loads and decodes the user's resume document.
pub async fn get_resume_document(pool: &PgPool, user_id: Uuid) -> Result<Option<ResumeDocument>> {
    get_resume(pool, user_id)
        .await?
        .map(|row| serde_json::from_value(row.data).context("Stored resume is not a valid document"))
        .transpose()
}

/// Replaces the user's resume wholesale.
pub async fn save_resume(pool: &PgPool, user_id: Uuid, resume: &ResumeDocument) -> Result<ResumeRow> {
    let row = sqlx::query_as(
        r#"
        INSERT INTO resumes (id, user_id, data)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id)
        DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(serde_json::to_value(resume)?)
    .fetch_one(pool)
    .await
    .context("Failed to save resume")?;
    Ok(row)
}
