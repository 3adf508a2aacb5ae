//! Response Validator — the scoring model's output is never trusted
//! structurally.
//!
//! A missing or unparseable JSON block is a hard failure ([`FormatError`]).
//! Anything else that is off (wrong types, non-numeric scores, stray list
//! elements) becomes a [`ValidationWarning`] and the field degrades to empty.
//! The heterogeneous gap-list shapes are normalized here and never leave this
//! module in raw form.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ats::aggregator;
use crate::ats::gaps::{actionable_feedback, reconcile_gaps, ReconciledGaps};
use crate::ats::safe_number::{safe_count, safe_number, safe_score};
use crate::models::analysis::{
    ActionableFeedback, LengthAnalysis, PrioritizedKeyword, PrioritizedSkill, QuantifiableMetrics,
    ScoreBreakdown, SectionCompleteness, SkillsBreakdown, StandardHeaders,
};

pub const FORMAT_ERROR_MESSAGE: &str = "AI failed to return data in the expected format";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("{}", FORMAT_ERROR_MESSAGE)]
    MissingBlock,

    #[error("{}: {0}", FORMAT_ERROR_MESSAGE)]
    InvalidJson(#[from] serde_json::Error),

    #[error("{}: expected a JSON object", FORMAT_ERROR_MESSAGE)]
    NotAnObject,

    #[error("AI declined to analyse the resume: {0}")]
    ContentBlocked(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

/// Typed, canonical view of one scoring response.
#[derive(Debug, Clone, Default)]
pub struct ValidatedAtsResponse {
    pub ats_score: Option<i64>,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub matched_keywords: Vec<String>,
    pub missing_keywords: ReconciledGaps<PrioritizedKeyword>,
    pub matched_skills: Vec<String>,
    pub missing_skills: ReconciledGaps<PrioritizedSkill>,
    pub skill_match_percentage: Option<i64>,
    pub gap_analysis: Option<String>,
    pub formatting_issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub actionable_feedback: Option<Vec<ActionableFeedback>>,
    pub section_scores: BTreeMap<String, i64>,
    pub section_completeness: SectionCompleteness,
    pub quantifiable_metrics: QuantifiableMetrics,
    pub skills_breakdown: SkillsBreakdown,
    pub length_analysis: LengthAnalysis,
    pub blocking_elements: Vec<String>,
    pub standard_headers: StandardHeaders,
    pub warnings: Vec<ValidationWarning>,
}

/// Locates the JSON payload in a completion.
///
/// Prefers a ```json fenced block, then any ``` fenced block. Without a
/// fence, the outermost `{ ... }` span is taken.
pub fn extract_fenced_json(text: &str) -> Result<&str, FormatError> {
    let text = text.trim();

    let fenced = ["```json", "```JSON", "```"].iter().find_map(|fence| {
        let start = text.find(fence)? + fence.len();
        let rest = &text[start..];
        let body = match rest.find("```") {
            Some(end) => &rest[..end],
            None => rest,
        };
        Some(body.trim())
    });

    if let Some(body) = fenced.filter(|b| !b.is_empty()) {
        return Ok(body);
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(FormatError::MissingBlock),
    }
}

/// Parses and validates a scoring completion.
pub fn validate_ats_response(text: &str) -> Result<ValidatedAtsResponse, FormatError> {
    let block = extract_fenced_json(text)?;
    let value: Value = serde_json::from_str(block)?;
    let obj = value.as_object().ok_or(FormatError::NotAnObject)?;

    if let Some(reason) = obj
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return Err(FormatError::ContentBlocked(reason.to_string()));
    }

    let mut v = Validator::new(obj);

    let ats_score = v.score("atsScore", true);
    let score_breakdown = match obj.get("scoreBreakdown") {
        None | Some(Value::Null) => None,
        Some(raw) => {
            let parsed = ScoreBreakdown::from_value(Some(raw));
            if parsed.is_none() {
                v.warn(
                    "scoreBreakdown",
                    "expected four numeric categories; breakdown ignored",
                );
            }
            parsed
        }
    };

    let matched_keywords = v.string_list("matchedKeywords", true);
    let missing_keywords = v.gaps("missingKeywords");
    let matched_skills = v.string_list("matchedSkills", true);
    let missing_skills = v.gaps("missingSkills");

    let skill_match_percentage = aggregator::skill_match_percentage(
        v.score("skillMatchPercentage", false),
        matched_skills.len(),
        missing_skills.names.len(),
    );

    let actionable_feedback = match v.array("actionableFeedback", false) {
        None => None,
        Some(items) => {
            let (feedback, skipped) = actionable_feedback(items);
            if skipped > 0 {
                v.warn(
                    "actionableFeedback",
                    format!("{skipped} item(s) without a usable action were dropped"),
                );
            }
            Some(feedback)
        }
    };

    let response = ValidatedAtsResponse {
        ats_score,
        score_breakdown,
        matched_keywords,
        missing_keywords,
        matched_skills,
        missing_skills,
        skill_match_percentage,
        gap_analysis: v.text("gapAnalysis"),
        formatting_issues: v.string_list("formattingIssues", false),
        recommendations: v.string_list("recommendations", false),
        actionable_feedback,
        section_scores: v.score_map("sectionScores"),
        section_completeness: v.section_completeness(),
        quantifiable_metrics: v.quantifiable_metrics(),
        skills_breakdown: v.skills_breakdown(),
        length_analysis: v.length_analysis(),
        blocking_elements: v.string_list("blockingElements", false),
        standard_headers: v.standard_headers(),
        warnings: Vec::new(),
    };

    Ok(ValidatedAtsResponse {
        warnings: v.warnings,
        ..response
    })
}

struct Validator<'a> {
    obj: &'a Map<String, Value>,
    warnings: Vec<ValidationWarning>,
}

impl<'a> Validator<'a> {
    fn new(obj: &'a Map<String, Value>) -> Self {
        Self {
            obj,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.obj.get(key).filter(|v| !v.is_null())
    }

    fn array(&mut self, key: &str, expected: bool) -> Option<&'a [Value]> {
        match self.present(key) {
            None => {
                if expected {
                    self.warn(key, "missing expected field");
                }
                None
            }
            Some(Value::Array(items)) => Some(items.as_slice()),
            Some(_) => {
                self.warn(key, "expected an array; field ignored");
                None
            }
        }
    }

    fn object(&mut self, key: &str) -> Option<&'a Map<String, Value>> {
        match self.present(key)? {
            Value::Object(map) => Some(map),
            _ => {
                self.warn(key, "expected an object; field ignored");
                None
            }
        }
    }

    fn score(&mut self, key: &str, expected: bool) -> Option<i64> {
        match self.present(key) {
            None => {
                if expected {
                    self.warn(key, "missing expected field");
                }
                None
            }
            Some(raw) => {
                let score = safe_score(Some(raw));
                if score.is_none() {
                    self.warn(key, "not a finite number");
                }
                score
            }
        }
    }

    fn text(&mut self, key: &str) -> Option<String> {
        match self.present(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::String(_) => None,
            _ => {
                self.warn(key, "expected a string; field ignored");
                None
            }
        }
    }

    fn string_list(&mut self, key: &str, expected: bool) -> Vec<String> {
        let Some(items) = self.array(key, expected) else {
            return Vec::new();
        };
        let (list, skipped) = strings(items);
        if skipped > 0 {
            self.warn(key, format!("{skipped} non-string element(s) dropped"));
        }
        list
    }

    fn gaps<T: crate::ats::gaps::GapItem>(&mut self, key: &str) -> ReconciledGaps<T> {
        let Some(items) = self.array(key, true) else {
            return ReconciledGaps::default();
        };
        let gaps = reconcile_gaps::<T>(items);
        if gaps.skipped > 0 {
            self.warn(
                key,
                format!("{} element(s) did not match the list shape and were dropped", gaps.skipped),
            );
        }
        gaps
    }

    fn score_map(&mut self, key: &str) -> BTreeMap<String, i64> {
        let Some(map) = self.object(key) else {
            return BTreeMap::new();
        };
        let mut scores = BTreeMap::new();
        let mut dropped = 0;
        for (name, raw) in map {
            match safe_score(Some(raw)) {
                Some(score) => {
                    scores.insert(name.clone(), score);
                }
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            self.warn(key, format!("{dropped} non-numeric score(s) dropped"));
        }
        scores
    }

    fn section_completeness(&mut self) -> SectionCompleteness {
        let Some(map) = self.object("sectionCompleteness") else {
            return SectionCompleteness::default();
        };
        SectionCompleteness {
            present_sections: nested_strings(map, "presentSections"),
            missing_sections: nested_strings(map, "missingSections"),
            score: safe_score(map.get("score")),
        }
    }

    fn quantifiable_metrics(&mut self) -> QuantifiableMetrics {
        let Some(map) = self.object("quantifiableMetrics") else {
            return QuantifiableMetrics::default();
        };
        QuantifiableMetrics {
            count: safe_count(map.get("count")),
            examples: nested_strings(map, "examples"),
            suggestions: nested_strings(map, "suggestions"),
        }
    }

    fn skills_breakdown(&mut self) -> SkillsBreakdown {
        let Some(map) = self.object("skillsBreakdown") else {
            return SkillsBreakdown::default();
        };
        SkillsBreakdown {
            hard_skills: nested_strings(map, "hardSkills"),
            soft_skills: nested_strings(map, "softSkills"),
        }
    }

    fn length_analysis(&mut self) -> LengthAnalysis {
        let Some(map) = self.object("lengthAnalysis") else {
            return LengthAnalysis::default();
        };
        LengthAnalysis {
            word_count: safe_count(map.get("wordCount")),
            page_estimate: safe_number(map.get("pageEstimate")).filter(|p| *p >= 0.0),
            verdict: map
                .get("verdict")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    fn standard_headers(&mut self) -> StandardHeaders {
        let Some(map) = self.object("standardHeaders") else {
            return StandardHeaders::default();
        };
        StandardHeaders {
            compliant: map.get("compliant").and_then(Value::as_bool),
            non_standard_headers: nested_strings(map, "nonStandardHeaders"),
        }
    }
}

fn strings(items: &[Value]) -> (Vec<String>, usize) {
    let mut out = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        match item.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => out.push(s.to_string()),
            Some(_) => {}
            None => skipped += 1,
        }
    }
    (out, skipped)
}

fn nested_strings(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| strings(items).0)
        .unwrap_or_default()
}
