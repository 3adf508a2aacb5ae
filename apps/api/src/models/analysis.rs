//! Persisted analysis record and its ATS sub-record.
//!
//! Field names on the serialized side are part of the stored document schema
//! read by the frontend. Keep them camelCase and do not rename.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AnalysisStatus::Pending),
            "completed" => Some(AnalysisStatus::Completed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Priority-tagged gaps
// ────────────────────────────────────────────────────────────────────────────

/// How much a missing skill or keyword matters.
///
/// - `high`: explicitly required; its absence likely means automatic rejection
/// - `medium`: listed but not mandatory
/// - `low`: nice-to-have or implied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GapPriority {
    High,
    Medium,
    Low,
}

impl GapPriority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(GapPriority::High),
            "medium" => Some(GapPriority::Medium),
            "low" => Some(GapPriority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrioritizedKeyword {
    pub keyword: String,
    pub priority: GapPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrioritizedSkill {
    pub skill: String,
    pub priority: GapPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One concrete thing the candidate can change, with its expected effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionableFeedback {
    pub priority: GapPriority,
    pub action: String,
    pub impact: String,
}

// ────────────────────────────────────────────────────────────────────────────
// ATS sub-record
// ────────────────────────────────────────────────────────────────────────────

/// Four weighted categories reported by the scoring model, each 0–100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub technical_skills: f64,
    pub experience_relevance: f64,
    pub additional_skills: f64,
    pub formatting: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkillMatchDetails {
    pub match_percentage: Option<i64>,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub gap_analysis: Option<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectionCompleteness {
    pub present_sections: Vec<String>,
    pub missing_sections: Vec<String>,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuantifiableMetrics {
    pub count: Option<u32>,
    pub examples: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkillsBreakdown {
    pub hard_skills: Vec<String>,
    pub soft_skills: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LengthAnalysis {
    pub word_count: Option<u32>,
    pub page_estimate: Option<f64>,
    pub verdict: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandardHeaders {
    pub compliant: Option<bool>,
    pub non_standard_headers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceDetails {
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub formatting_issues: Vec<String>,
    pub section_scores: BTreeMap<String, i64>,
    pub section_completeness: SectionCompleteness,
    pub quantifiable_metrics: QuantifiableMetrics,
    pub skills_breakdown: SkillsBreakdown,
    pub length_analysis: LengthAnalysis,
    pub blocking_elements: Vec<String>,
    pub standard_headers: StandardHeaders,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<ScoreBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_keywords_with_priority: Option<Vec<PrioritizedKeyword>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_skills_with_priority: Option<Vec<PrioritizedSkill>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actionable_feedback: Option<Vec<ActionableFeedback>>,
}

/// Result of the upstream scoring pass.
///
/// When `error` is set, `score` and the detail blocks may hold partial data and
/// must not be trusted. Check `error` first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AtsScores {
    pub score: Option<i64>,
    pub skill_match_details: Option<SkillMatchDetails>,
    pub compliance_details: Option<ComplianceDetails>,
    pub last_analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_application_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AtsScores {
    /// An empty sub-record carrying only an error.
    pub fn failed(error: impl Into<String>, job_application_id: Option<String>) -> Self {
        Self {
            score: None,
            skill_match_details: None,
            compliance_details: None,
            last_analyzed_at: Utc::now(),
            job_application_id,
            error: Some(error.into()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis record
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one local or upstream check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub passed: bool,
    pub score: Option<i64>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: AnalysisStatus,
    pub score: Option<i64>,
    pub category_scores: BTreeMap<String, i64>,
    pub issues_count: i64,
    pub detailed_results: BTreeMap<String, CheckResult>,
    pub ats_scores: Option<AtsScores>,
    pub job_description: Option<String>,
    pub job_application_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub error_info: Option<String>,
}

impl AnalysisRecord {
    pub fn pending(
        user_id: Uuid,
        job_description: Option<String>,
        job_application_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: AnalysisStatus::Pending,
            score: None,
            category_scores: BTreeMap::new(),
            issues_count: 0,
            detailed_results: BTreeMap::new(),
            ats_scores: None,
            job_description,
            job_application_id,
            created_at: Utc::now(),
            analyzed_at: None,
            error_info: None,
        }
    }
}

/// Everything a successful scan writes back to its record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub score: Option<i64>,
    pub category_scores: BTreeMap<String, i64>,
    pub issues_count: i64,
    pub detailed_results: BTreeMap<String, CheckResult>,
    pub ats_scores: AtsScores,
}

#[derive(Debug, Clone, FromRow)]
pub struct AnalysisRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub job_description: Option<String>,
    pub job_application_id: Option<String>,
    pub score: Option<i32>,
    pub category_scores: Value,
    pub issues_count: i32,
    pub detailed_results: Value,
    pub ats_scores: Option<Value>,
    pub error_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AnalysisRow> for AnalysisRecord {
    type Error = anyhow::Error;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let status = AnalysisStatus::parse(&row.status)
            .with_context(|| format!("Unknown analysis status '{}'", row.status))?;
        let ats_scores = row
            .ats_scores
            .map(serde_json::from_value)
            .transpose()
            .context("Malformed ats_scores column")?;

        Ok(AnalysisRecord {
            id: row.id,
            user_id: row.user_id,
            status,
            score: row.score.map(i64::from),
            category_scores: serde_json::from_value(row.category_scores)
                .context("Malformed category_scores column")?,
            issues_count: i64::from(row.issues_count),
            detailed_results: serde_json::from_value(row.detailed_results)
                .context("Malformed detailed_results column")?,
            ats_scores,
            job_description: row.job_description,
            job_application_id: row.job_application_id,
            created_at: row.created_at,
            analyzed_at: row.analyzed_at,
            error_info: row.error_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
        ] {
            assert_eq!(AnalysisStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AnalysisStatus::parse("running"), None);
    }

    #[test]
    fn test_ats_scores_field_names_are_camel_case() {
        let scores = AtsScores {
            score: Some(72),
            skill_match_details: Some(SkillMatchDetails::default()),
            compliance_details: None,
            last_analyzed_at: Utc::now(),
            job_application_id: Some("app-1".to_string()),
            error: None,
        };
        let value = serde_json::to_value(&scores).unwrap();
        assert_eq!(value["score"], json!(72));
        assert!(value.get("skillMatchDetails").is_some());
        assert!(value.get("complianceDetails").is_some());
        assert!(value.get("lastAnalyzedAt").is_some());
        assert_eq!(value["jobApplicationId"], json!("app-1"));
        assert!(value.get("error").is_none());
        assert!(value["skillMatchDetails"].get("matchPercentage").is_some());
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        let row = AnalysisRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: "queued".to_string(),
            job_description: None,
            job_application_id: None,
            score: None,
            category_scores: json!({}),
            issues_count: 0,
            detailed_results: json!({}),
            ats_scores: None,
            error_info: None,
            created_at: Utc::now(),
            analyzed_at: None,
        };
        assert!(AnalysisRecord::try_from(row).is_err());
    }

    #[test]
    fn test_row_converts_json_columns() {
        let row = AnalysisRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: "completed".to_string(),
            job_description: None,
            job_application_id: None,
            score: Some(81),
            category_scores: json!({"contactInfo": 100}),
            issues_count: 2,
            detailed_results: json!({"contact": {"passed": true, "score": 100, "issues": []}}),
            ats_scores: None,
            error_info: None,
            created_at: Utc::now(),
            analyzed_at: Some(Utc::now()),
        };
        let record = AnalysisRecord::try_from(row).unwrap();
        assert_eq!(record.status, AnalysisStatus::Completed);
        assert_eq!(record.category_scores["contactInfo"], 100);
        assert!(record.detailed_results["contact"].passed);
    }
}
