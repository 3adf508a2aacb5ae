//! Score Aggregator — one overall 0–100 compatibility score from the model's
//! partial signals.
//!
//! Weighted formula over the four reported categories:
//!   0.40 × technicalSkills + 0.30 × experienceRelevance
//!   + 0.20 × additionalSkills + 0.10 × formatting
//!
//! The model also suggests a single overall number. When the two disagree by
//! more than the configured threshold, the weighted score wins. Otherwise the
//! suggested score is kept.
//!
//! Nothing here fails: missing or invalid inputs degrade to `None`.

use serde_json::Value;

use crate::ats::safe_number::{clamp_score, finite, safe_number};
use crate::models::analysis::ScoreBreakdown;

pub const TECHNICAL_SKILLS_WEIGHT: f64 = 0.40;
pub const EXPERIENCE_RELEVANCE_WEIGHT: f64 = 0.30;
pub const ADDITIONAL_SKILLS_WEIGHT: f64 = 0.20;
pub const FORMATTING_WEIGHT: f64 = 0.10;

/// Maximum tolerated gap between the model's suggested overall score and the
/// weighted breakdown before the suggested score is discarded. Uncalibrated;
/// override with `ATS_SCORE_DISAGREEMENT_THRESHOLD`.
pub const DEFAULT_SCORE_DISAGREEMENT_THRESHOLD: i64 = 10;

impl ScoreBreakdown {
    /// Reads the four categories. Returns `None` unless all four are valid
    /// numbers; each is clamped into 0–100.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        let obj = value?.as_object()?;
        let category = |key: &str| safe_number(obj.get(key)).map(|n| n.clamp(0.0, 100.0));

        Some(ScoreBreakdown {
            technical_skills: category("technicalSkills")?,
            experience_relevance: category("experienceRelevance")?,
            additional_skills: category("additionalSkills")?,
            formatting: category("formatting")?,
        })
    }

    pub fn weighted_score(&self) -> i64 {
        let raw = TECHNICAL_SKILLS_WEIGHT * self.technical_skills
            + EXPERIENCE_RELEVANCE_WEIGHT * self.experience_relevance
            + ADDITIONAL_SKILLS_WEIGHT * self.additional_skills
            + FORMATTING_WEIGHT * self.formatting;
        finite(raw).map(clamp_score).unwrap_or(0)
    }
}

/// Picks the overall score from the model's suggestion and the weighted
/// breakdown.
pub fn reconcile_overall(suggested: Option<i64>, weighted: Option<i64>, threshold: i64) -> Option<i64> {
    match (suggested, weighted) {
        (Some(s), Some(w)) if (s - w).abs() > threshold => Some(w),
        (Some(s), _) => Some(s),
        (None, w) => w,
    }
}

/// Overall score from an already validated suggestion and breakdown.
pub fn overall_score(
    suggested: Option<i64>,
    breakdown: Option<&ScoreBreakdown>,
    threshold: i64,
) -> Option<i64> {
    reconcile_overall(
        suggested.map(|s| s.clamp(0, 100)),
        breakdown.map(ScoreBreakdown::weighted_score),
        threshold,
    )
}

/// The reported skill-match percentage, or one derived from list sizes.
/// `None` when neither is available (no skills on either side).
pub fn skill_match_percentage(reported: Option<i64>, matched: usize, missing: usize) -> Option<i64> {
    if let Some(pct) = reported {
        return Some(pct.clamp(0, 100));
    }
    let total = matched + missing;
    if total == 0 {
        return None;
    }
    finite(100.0 * matched as f64 / total as f64).map(clamp_score)
}
