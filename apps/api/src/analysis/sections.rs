//! Section-level advisory pass: one feedback item per work, education and
//! skills entry, cached per user.
//!
//! The cache entry carries the content hash of the resume subset it was
//! computed from. A read is a hit only while that hash matches the current
//! resume; resume writes also clear the entry outright.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ats::normalizer::{analysis_content_hash, normalize_resume};
use crate::ats::prompts::{
    fill_template, SECTION_ANALYSIS_PROMPT_TEMPLATE, SECTION_ANALYSIS_SYSTEM,
};
use crate::ats::safe_number::safe_score;
use crate::ats::validator::extract_fenced_json;
use crate::errors::AppError;
use crate::llm_client::prompts::EVIDENCE_INSTRUCTION;
use crate::llm_client::LlmBackend;
use crate::models::resume::ResumeDocument;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryFeedback {
    pub score: Option<i64>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

/// Feedback arrays, index-aligned with the resume's entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectionAnalysis {
    pub work: Vec<EntryFeedback>,
    pub education: Vec<EntryFeedback>,
    pub skills: Vec<EntryFeedback>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedSectionAnalysis {
    pub content_hash: String,
    pub analysis: SectionAnalysis,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionAnalysisResponse {
    pub analysis: SectionAnalysis,
    pub content_hash: String,
    pub cached: bool,
    pub cached_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SectionCache: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<Option<CachedSectionAnalysis>>;
    async fn put(&self, user_id: Uuid, entry: &CachedSectionAnalysis) -> Result<()>;
    async fn clear(&self, user_id: Uuid) -> Result<()>;
}

pub struct RedisSectionCache {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSectionCache {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }
}

fn cache_key(user_id: Uuid) -> String {
    format!("ats:section-analysis:{user_id}")
}

#[async_trait]
impl SectionCache for RedisSectionCache {
    async fn get(&self, user_id: Uuid) -> Result<Option<CachedSectionAnalysis>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(cache_key(user_id)).await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .context("Malformed section cache entry")
    }

    async fn put(&self, user_id: Uuid, entry: &CachedSectionAnalysis) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(entry)?;
        conn.set_ex::<_, _, ()>(cache_key(user_id), json, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(cache_key(user_id)).await?;
        Ok(())
    }
}

/// Returns section feedback for the resume, from cache when the content hash
/// still matches.
pub async fn analyze_sections(
    llm: &dyn LlmBackend,
    cache: &dyn SectionCache,
    user_id: Uuid,
    resume: &ResumeDocument,
) -> Result<SectionAnalysisResponse, AppError> {
    let content_hash = analysis_content_hash(resume);

    match cache.get(user_id).await {
        Ok(Some(entry)) if entry.content_hash == content_hash => {
            info!("Section cache hit for user {user_id}");
            return Ok(SectionAnalysisResponse {
                analysis: entry.analysis,
                content_hash,
                cached: true,
                cached_at: Some(entry.cached_at),
            });
        }
        Ok(_) => info!("Section cache miss for user {user_id}"),
        Err(e) => warn!("Section cache read failed for user {user_id}, treating as miss: {e:#}"),
    }

    let subset = resume.analysis_subset();
    if subset.is_empty() {
        return Ok(SectionAnalysisResponse {
            analysis: SectionAnalysis::default(),
            content_hash,
            cached: false,
            cached_at: None,
        });
    }

    let prompt = fill_template(
        SECTION_ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("evidence_instruction", EVIDENCE_INSTRUCTION),
            ("work_count", &resume.work.len().to_string()),
            ("education_count", &resume.education.len().to_string()),
            ("skills_count", &resume.skills.len().to_string()),
            ("resume_text", &normalize_resume(&subset)),
        ],
    );

    let completion = llm
        .complete(&prompt, SECTION_ANALYSIS_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;
    let analysis =
        parse_section_analysis(&completion, resume).map_err(|e| AppError::Llm(e.to_string()))?;

    let entry = CachedSectionAnalysis {
        content_hash: content_hash.clone(),
        analysis,
        cached_at: Utc::now(),
    };
    if let Err(e) = cache.put(user_id, &entry).await {
        warn!("Section cache write failed for user {user_id}: {e:#}");
    }

    Ok(SectionAnalysisResponse {
        analysis: entry.analysis,
        content_hash,
        cached: false,
        cached_at: None,
    })
}

/// Parses the advisory reply and aligns each array with the resume.
pub fn parse_section_analysis(
    text: &str,
    resume: &ResumeDocument,
) -> Result<SectionAnalysis, crate::ats::validator::FormatError> {
    let value: Value = serde_json::from_str(extract_fenced_json(text)?)?;

    Ok(SectionAnalysis {
        work: aligned(&value, "work", resume.work.len()),
        education: aligned(&value, "education", resume.education.len()),
        skills: aligned(&value, "skills", resume.skills.len()),
    })
}

/// Pads with empty feedback or truncates so there is exactly one item per
/// resume entry.
fn aligned(value: &Value, section: &str, expected: usize) -> Vec<EntryFeedback> {
    let mut items: Vec<EntryFeedback> = value
        .get(section)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(entry_feedback).collect())
        .unwrap_or_default();

    if items.len() != expected {
        warn!(
            "Section feedback for '{section}' has {} items, resume has {expected}; {}",
            items.len(),
            if items.len() < expected { "padding" } else { "truncating" }
        );
        items.resize_with(expected, EntryFeedback::default);
    }
    debug!("Section '{section}': {} feedback items", items.len());
    items
}

fn entry_feedback(value: &Value) -> EntryFeedback {
    let strings = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    EntryFeedback {
        score: safe_score(value.get("score")),
        strengths: strings("strengths"),
        improvements: strings("improvements"),
    }
}
