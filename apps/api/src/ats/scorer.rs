//! ATS scoring pipeline: normalize → prompt → model → validate → aggregate.
//!
//! The model call goes through [`LlmBackend`] so the whole pipeline runs
//! against a stub in tests. Local structural checks are merged with the
//! upstream result into one [`ScanOutcome`].

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ats::aggregator;
use crate::ats::checks::{run_local_checks, LocalCheck};
use crate::ats::normalizer::normalize_resume;
use crate::ats::prompts::{
    fill_template, ATS_SCORE_PROMPT_TEMPLATE, ATS_SCORE_SYSTEM, JOB_CONTEXT_TEMPLATE,
    NO_JOB_CONTEXT,
};
use crate::ats::safe_number::clamp_score;
use crate::ats::validator::{validate_ats_response, FormatError, ValidatedAtsResponse};
use crate::llm_client::prompts::EVIDENCE_INSTRUCTION;
use crate::llm_client::{LlmBackend, LlmError};
use crate::models::analysis::{
    AtsScores, CheckResult, ComplianceDetails, ScanOutcome, SkillMatchDetails,
};
use crate::models::resume::ResumeDocument;

/// Stored in `atsScores.error` when the response parsed but carried no score.
pub const NO_USABLE_SCORE: &str = "AI response did not include a usable score";

/// Category key for the upstream score in `categoryScores`.
pub const ATS_CATEGORY: &str = "atsCompatibility";

/// Why a background scan failed. The `Display` text is what gets persisted as
/// the record's `errorInfo`.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Resume has no content to analyse")]
    EmptyResume,

    #[error("AI service error: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Inputs for one scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    pub resume: &'a ResumeDocument,
    pub job_description: Option<&'a str>,
    pub job_application_id: Option<&'a str>,
    pub disagreement_threshold: i64,
}

pub fn build_score_prompt(resume_text: &str, job_description: Option<&str>) -> String {
    let job_context = match job_description.map(str::trim).filter(|jd| !jd.is_empty()) {
        Some(jd) => fill_template(JOB_CONTEXT_TEMPLATE, &[("job_description", jd)]),
        None => NO_JOB_CONTEXT.to_string(),
    };

    fill_template(
        ATS_SCORE_PROMPT_TEMPLATE,
        &[
            ("evidence_instruction", EVIDENCE_INSTRUCTION),
            ("job_context", &job_context),
            ("resume_text", resume_text),
        ],
    )
}

/// Runs one full scan. Errors are hard failures; partial responses come back
/// as a completed outcome with per-field degradation.
pub async fn score_resume(
    llm: &dyn LlmBackend,
    request: ScanRequest<'_>,
) -> Result<ScanOutcome, ScanError> {
    let resume_text = normalize_resume(request.resume);
    if resume_text.is_empty() {
        return Err(ScanError::EmptyResume);
    }
    let prompt = build_score_prompt(&resume_text, request.job_description);
    debug!("ATS prompt built ({} chars of resume text)", resume_text.len());

    let completion = llm.complete(&prompt, ATS_SCORE_SYSTEM).await?;
    let validated = validate_ats_response(&completion)?;

    for w in &validated.warnings {
        warn!(field = %w.field, "ATS response validation: {}", w.message);
    }

    Ok(assemble_outcome(
        run_local_checks(request.resume),
        &validated,
        request.disagreement_threshold,
        request.job_application_id,
    ))
}

/// Builds the persisted ATS sub-record from a validated response.
pub fn build_ats_scores(
    v: &ValidatedAtsResponse,
    threshold: i64,
    job_application_id: Option<&str>,
) -> AtsScores {
    let score = aggregator::overall_score(v.ats_score, v.score_breakdown.as_ref(), threshold);

    let skill_match_details = SkillMatchDetails {
        match_percentage: v.skill_match_percentage,
        matched_skills: v.matched_skills.clone(),
        missing_skills: v.missing_skills.names.clone(),
        gap_analysis: v.gap_analysis.clone(),
        recommendations: v.recommendations.clone(),
    };

    let compliance_details = ComplianceDetails {
        matched_keywords: v.matched_keywords.clone(),
        missing_keywords: v.missing_keywords.names.clone(),
        formatting_issues: v.formatting_issues.clone(),
        section_scores: v.section_scores.clone(),
        section_completeness: v.section_completeness.clone(),
        quantifiable_metrics: v.quantifiable_metrics.clone(),
        skills_breakdown: v.skills_breakdown.clone(),
        length_analysis: v.length_analysis.clone(),
        blocking_elements: v.blocking_elements.clone(),
        standard_headers: v.standard_headers.clone(),
        score_breakdown: v.score_breakdown,
        missing_keywords_with_priority: v.missing_keywords.prioritized.clone(),
        missing_skills_with_priority: v.missing_skills.prioritized.clone(),
        actionable_feedback: v.actionable_feedback.clone(),
    };

    AtsScores {
        score,
        skill_match_details: Some(skill_match_details),
        compliance_details: Some(compliance_details),
        last_analyzed_at: Utc::now(),
        job_application_id: job_application_id.map(str::to_string),
        error: score.is_none().then(|| NO_USABLE_SCORE.to_string()),
    }
}

/// Merges local checks with the upstream response.
///
/// - score: the reconciled ATS score, else the mean of the local check scores
/// - issues: every local issue, formatting issue, blocking element and
///   high-priority gap
pub fn assemble_outcome(
    local: Vec<LocalCheck>,
    v: &ValidatedAtsResponse,
    threshold: i64,
    job_application_id: Option<&str>,
) -> ScanOutcome {
    let ats_scores = build_ats_scores(v, threshold, job_application_id);

    let mut category_scores = BTreeMap::new();
    let mut detailed_results = BTreeMap::new();
    for check in local {
        if let Some(score) = check.result.score {
            category_scores.insert(check.category.to_string(), score);
        }
        detailed_results.insert(check.check.to_string(), check.result);
    }
    if let Some(score) = ats_scores.score {
        category_scores.insert(ATS_CATEGORY.to_string(), score);
    }

    detailed_results.insert("keywords".to_string(), keyword_check(v));
    detailed_results.insert("formatting".to_string(), formatting_check(v));

    let issues_count = detailed_results
        .values()
        .map(|r| r.issues.len() as i64)
        .sum();

    let score = ats_scores.score.or_else(|| mean(category_scores.values().copied()));

    ScanOutcome {
        score,
        category_scores,
        issues_count,
        detailed_results,
        ats_scores,
    }
}

fn keyword_check(v: &ValidatedAtsResponse) -> CheckResult {
    let mut issues: Vec<String> = v
        .missing_keywords
        .high_priority_names()
        .into_iter()
        .map(|k| format!("Missing required keyword '{k}'"))
        .collect();
    issues.extend(
        v.missing_skills
            .high_priority_names()
            .into_iter()
            .map(|s| format!("Missing required skill '{s}'")),
    );

    CheckResult {
        passed: issues.is_empty(),
        score: aggregator::skill_match_percentage(
            None,
            v.matched_keywords.len(),
            v.missing_keywords.names.len(),
        ),
        issues,
    }
}

fn formatting_check(v: &ValidatedAtsResponse) -> CheckResult {
    let issues: Vec<String> = v
        .formatting_issues
        .iter()
        .chain(v.blocking_elements.iter())
        .cloned()
        .collect();

    CheckResult {
        passed: issues.is_empty(),
        score: v.score_breakdown.map(|b| clamp_score(b.formatting)),
        issues,
    }
}

fn mean(scores: impl Iterator<Item = i64>) -> Option<i64> {
    let (sum, n) = scores.fold((0i64, 0i64), |(s, n), x| (s + x, n + 1));
    if n == 0 {
        return None;
    }
    Some(((sum as f64) / (n as f64)).round() as i64)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// Backend that returns a canned completion or error.
    pub(crate) struct StubBackend {
        pub reply: Result<String, fn() -> LlmError>,
    }

    impl StubBackend {
        pub fn replying(text: impl Into<String>) -> Self {
            Self {
                reply: Ok(text.into()),
            }
        }

        pub fn failing(err: fn() -> LlmError) -> Self {
            Self { reply: Err(err) }
        }
    }

    #[async_trait]
    impl LlmBackend for StubBackend {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    pub(crate) fn sample_resume() -> ResumeDocument {
        serde_json::from_value(json!({
            "basics": {"name": "Ada Lovelace", "email": "ada@example.com", "phone": "555-0100"},
            "work": [{"name": "Acme", "position": "Engineer", "highlights": ["Cut p99 latency by 35%"]}],
            "education": [{"institution": "MIT", "area": "CS"}],
            "skills": [{"name": "Languages", "keywords": ["Rust", "SQL"]}]
        }))
        .unwrap()
    }

    pub(crate) fn fenced(value: serde_json::Value) -> String {
        format!("```json\n{value}\n```")
    }

    /// A reply with NaN, Infinity or an out-of-range literal in every numeric
    /// field. Written by hand because `json!` cannot carry non-finite numbers.
    pub(crate) const NON_FINITE_REPLY: &str = r#"```json
{
  "atsScore": "NaN",
  "scoreBreakdown": {"technicalSkills": "Infinity", "experienceRelevance": 70, "additionalSkills": 60, "formatting": "-Infinity"},
  "matchedKeywords": ["Rust"],
  "missingKeywords": [],
  "matchedSkills": ["Rust"],
  "missingSkills": ["Go"],
  "skillMatchPercentage": "Infinity",
  "sectionScores": {"experience": "NaN", "skills": 1e400, "education": 80},
  "sectionCompleteness": {"presentSections": ["experience"], "score": "-Infinity"},
  "quantifiableMetrics": {"count": "NaN", "examples": []},
  "lengthAnalysis": {"wordCount": 1e400, "pageEstimate": "Infinity", "verdict": "ok"}
}
```"#;

    /// Fails on any JSON number that does not read back as a finite float.
    pub(crate) fn assert_numbers_finite(value: &serde_json::Value, path: &str) {
        match value {
            serde_json::Value::Number(n) => assert!(
                n.as_f64().is_some_and(f64::is_finite),
                "non-finite number at {path}: {n}"
            ),
            serde_json::Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    assert_numbers_finite(item, &format!("{path}[{i}]"));
                }
            }
            serde_json::Value::Object(map) => {
                for (key, item) in map {
                    assert_numbers_finite(item, &format!("{path}.{key}"));
                }
            }
            _ => {}
        }
    }

    fn request(doc: &ResumeDocument) -> ScanRequest<'_> {
        ScanRequest {
            resume: doc,
            job_description: Some("Senior Rust engineer, Kubernetes required"),
            job_application_id: Some("app-7"),
            disagreement_threshold: 10,
        }
    }

    #[test]
    fn test_prompt_includes_job_description_and_resume() {
        let prompt = build_score_prompt("=== SKILLS ===\nRust", Some("Need Rust"));
        assert!(prompt.contains("TARGET JOB DESCRIPTION:\nNeed Rust"));
        assert!(prompt.contains("=== SKILLS ===\nRust"));
        assert!(!prompt.contains("{resume_text}"));

        let prompt = build_score_prompt("x", Some("   "));
        assert!(prompt.contains(NO_JOB_CONTEXT));
    }

    #[test]
    fn test_job_description_placeholder_text_is_not_expanded() {
        let prompt = build_score_prompt("RESUME BODY", Some("Paste your {resume_text} here"));
        assert!(prompt.contains("Paste your {resume_text} here"));
        assert_eq!(prompt.matches("RESUME BODY").count(), 1);
    }

    #[tokio::test]
    async fn test_score_prefers_weighted_on_disagreement() {
        let llm = StubBackend::replying(fenced(json!({
            "atsScore": 65,
            "scoreBreakdown": {"technicalSkills": 60, "experienceRelevance": 50, "additionalSkills": 40, "formatting": 30},
            "matchedKeywords": ["Rust"],
            "missingKeywords": [{"keyword": "Kubernetes", "priority": "high"}],
            "matchedSkills": ["Rust"],
            "missingSkills": ["Go"]
        })));
        let doc = sample_resume();
        let outcome = score_resume(&llm, request(&doc)).await.unwrap();

        assert_eq!(outcome.score, Some(50));
        assert_eq!(outcome.category_scores[ATS_CATEGORY], 50);
        assert_eq!(outcome.ats_scores.score, Some(50));
        assert_eq!(outcome.ats_scores.error, None);
        assert_eq!(outcome.ats_scores.job_application_id.as_deref(), Some("app-7"));

        let keywords = &outcome.detailed_results["keywords"];
        assert!(!keywords.passed);
        assert_eq!(keywords.score, Some(50));
        assert_eq!(keywords.issues, vec!["Missing required keyword 'Kubernetes'"]);
    }

    #[tokio::test]
    async fn test_flat_and_prioritized_shapes_both_surface_names() {
        let llm = StubBackend::replying(fenced(json!({
            "atsScore": 70,
            "matchedKeywords": [],
            "missingKeywords": ["Kubernetes"],
            "matchedSkills": [],
            "missingSkills": [{"skill": "Go", "priority": "low"}]
        })));
        let doc = sample_resume();
        let outcome = score_resume(&llm, request(&doc)).await.unwrap();
        let compliance = outcome.ats_scores.compliance_details.unwrap();
        assert_eq!(compliance.missing_keywords, vec!["Kubernetes"]);
        assert!(compliance.missing_keywords_with_priority.is_none());
        assert_eq!(
            outcome.ats_scores.skill_match_details.unwrap().missing_skills,
            vec!["Go"]
        );
        assert_eq!(compliance.missing_skills_with_priority.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_response_without_score_is_soft_failure() {
        let llm = StubBackend::replying(fenced(json!({"atsScore": "great", "matchedKeywords": []})));
        let doc = sample_resume();
        let outcome = score_resume(&llm, request(&doc)).await.unwrap();

        assert_eq!(outcome.ats_scores.score, None);
        assert_eq!(outcome.ats_scores.error.as_deref(), Some(NO_USABLE_SCORE));
        assert!(!outcome.category_scores.contains_key(ATS_CATEGORY));
        // Falls back to the mean of the local checks (contact, sections, impact all 100).
        assert_eq!(outcome.score, Some(100));
    }

    #[tokio::test]
    async fn test_non_finite_numbers_never_reach_the_outcome() {
        let llm = StubBackend::replying(NON_FINITE_REPLY);
        let doc = sample_resume();
        let outcome = score_resume(&llm, request(&doc)).await.unwrap();

        let ats = &outcome.ats_scores;
        assert_eq!(ats.score, None);
        assert_eq!(ats.error.as_deref(), Some(NO_USABLE_SCORE));

        let skills = ats.skill_match_details.as_ref().unwrap();
        assert_eq!(skills.match_percentage, Some(50));

        let compliance = ats.compliance_details.as_ref().unwrap();
        assert!(compliance.score_breakdown.is_none());
        assert_eq!(compliance.section_scores.len(), 1);
        assert_eq!(compliance.section_scores["education"], 80);
        assert_eq!(compliance.section_completeness.score, None);
        assert_eq!(compliance.quantifiable_metrics.count, None);
        assert_eq!(compliance.length_analysis.word_count, None);
        assert_eq!(compliance.length_analysis.page_estimate, None);

        assert_eq!(outcome.score, Some(100));
        let ats_json = serde_json::to_value(ats).unwrap();
        assert_numbers_finite(&ats_json, "atsScores");
        assert_eq!(ats_json["skillMatchDetails"]["matchPercentage"], json!(50));
        assert_numbers_finite(
            &serde_json::to_value(&outcome.category_scores).unwrap(),
            "categoryScores",
        );
        assert_numbers_finite(
            &serde_json::to_value(&outcome.detailed_results).unwrap(),
            "detailedResults",
        );
    }

    #[tokio::test]
    async fn test_missing_block_is_hard_failure() {
        let llm = StubBackend::replying("Sorry, I can't score this.");
        let doc = sample_resume();
        let err = score_resume(&llm, request(&doc)).await.unwrap_err();
        assert!(matches!(err, ScanError::Format(FormatError::MissingBlock)));
        assert_eq!(err.to_string(), crate::ats::validator::FORMAT_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_upstream_error_is_hard_failure() {
        let llm = StubBackend::failing(|| LlmError::EmptyContent);
        let doc = sample_resume();
        let err = score_resume(&llm, request(&doc)).await.unwrap_err();
        assert!(matches!(err, ScanError::Llm(LlmError::EmptyContent)));
    }

    #[tokio::test]
    async fn test_empty_resume_is_rejected_before_the_model_call() {
        let llm = StubBackend::failing(|| LlmError::Refused);
        let doc = ResumeDocument::default();
        let err = score_resume(&llm, request(&doc)).await.unwrap_err();
        assert!(matches!(err, ScanError::EmptyResume));

        let blank: ResumeDocument =
            serde_json::from_value(json!({"basics": {}, "work": [{}]})).unwrap();
        let err = score_resume(&llm, request(&blank)).await.unwrap_err();
        assert!(matches!(err, ScanError::EmptyResume));
    }

    #[test]
    fn test_issue_count_sums_every_source() {
        let v = ValidatedAtsResponse {
            ats_score: Some(80),
            formatting_issues: vec!["Tables".to_string()],
            blocking_elements: vec!["Header image".to_string()],
            ..Default::default()
        };
        let outcome = assemble_outcome(run_local_checks(&ResumeDocument::default()), &v, 10, None);
        // contact: 3 missing, sections: 3 missing, impact: 1, formatting: 2
        assert_eq!(outcome.issues_count, 9);
        assert_eq!(outcome.detailed_results["formatting"].issues.len(), 2);
        assert_eq!(outcome.score, Some(80));
    }
}
