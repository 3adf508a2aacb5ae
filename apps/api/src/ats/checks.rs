//! Local structural checks that need no model call: contact completeness,
//! core section presence and quantified bullet impact.

use crate::ats::safe_number::{clamp_score, finite};
use crate::models::analysis::CheckResult;
use crate::models::resume::ResumeDocument;

const VAGUE_VERBS: &[&str] = &[
    "improved",
    "enhanced",
    "helped",
    "worked on",
    "assisted",
    "supported",
    "participated",
    "involved",
    "responsible for",
];

/// Maximum number of unquantified bullets quoted back in the issue list.
const MAX_QUOTED_BULLETS: usize = 5;

/// A named local check result, keyed for `detailedResults` and
/// `categoryScores`.
#[derive(Debug, Clone)]
pub struct LocalCheck {
    pub check: &'static str,
    pub category: &'static str,
    pub result: CheckResult,
}

pub fn run_local_checks(doc: &ResumeDocument) -> Vec<LocalCheck> {
    vec![
        LocalCheck {
            check: "contact",
            category: "contactInfo",
            result: check_contact(doc),
        },
        LocalCheck {
            check: "sections",
            category: "sectionCompleteness",
            result: check_sections(doc),
        },
        LocalCheck {
            check: "impact",
            category: "quantifiedImpact",
            result: check_impact(doc),
        },
    ]
}

fn ratio_score(hits: usize, total: usize) -> Option<i64> {
    if total == 0 {
        return None;
    }
    finite(100.0 * hits as f64 / total as f64).map(clamp_score)
}

fn present(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn check_contact(doc: &ResumeDocument) -> CheckResult {
    let basics = doc.basics.as_ref();
    let fields = [
        ("name", basics.and_then(|b| b.name.as_deref())),
        ("email", basics.and_then(|b| b.email.as_deref())),
        ("phone", basics.and_then(|b| b.phone.as_deref())),
    ];

    let issues: Vec<String> = fields
        .iter()
        .filter(|(_, value)| !present(*value))
        .map(|(label, _)| format!("Missing contact {label}"))
        .collect();

    CheckResult {
        passed: issues.is_empty(),
        score: ratio_score(fields.len() - issues.len(), fields.len()),
        issues,
    }
}

fn check_sections(doc: &ResumeDocument) -> CheckResult {
    let sections = [
        ("work experience", !doc.work.is_empty()),
        ("education", !doc.education.is_empty()),
        ("skills", !doc.skills.is_empty()),
    ];

    let issues: Vec<String> = sections
        .iter()
        .filter(|(_, has)| !has)
        .map(|(name, _)| format!("No {name} section"))
        .collect();

    CheckResult {
        passed: issues.is_empty(),
        score: ratio_score(sections.len() - issues.len(), sections.len()),
        issues,
    }
}

fn check_impact(doc: &ResumeDocument) -> CheckResult {
    let bullets: Vec<&str> = doc
        .work
        .iter()
        .flat_map(|w| w.highlights.iter())
        .chain(doc.projects.iter().flat_map(|p| p.highlights.iter()))
        .chain(doc.volunteer.iter().flat_map(|v| v.highlights.iter()))
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .collect();

    if bullets.is_empty() {
        return CheckResult {
            passed: false,
            score: None,
            issues: vec!["No bullet highlights to evaluate".to_string()],
        };
    }

    let unquantified: Vec<&str> = bullets
        .iter()
        .copied()
        .filter(|b| !is_quantified(b))
        .collect();

    let mut issues: Vec<String> = unquantified
        .iter()
        .take(MAX_QUOTED_BULLETS)
        .map(|b| match vague_verb(b) {
            Some(verb) => format!("'{b}': vague verb '{verb}' without a measurable outcome"),
            None => format!("'{b}': no measurable outcome"),
        })
        .collect();
    if unquantified.len() > MAX_QUOTED_BULLETS {
        issues.push(format!(
            "{} more bullets lack a number, percentage or amount",
            unquantified.len() - MAX_QUOTED_BULLETS
        ));
    }

    CheckResult {
        passed: unquantified.is_empty(),
        score: ratio_score(bullets.len() - unquantified.len(), bullets.len()),
        issues,
    }
}

/// A bullet counts as quantified when it carries a digit, a percentage or a
/// currency amount.
pub fn is_quantified(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        || text.contains('%')
        || text.contains('$')
        || text.contains('€')
        || text.contains('£')
}

fn vague_verb(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    VAGUE_VERBS.iter().copied().find(|v| lower.contains(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> ResumeDocument {
        serde_json::from_value(value).unwrap()
    }

    fn find<'a>(checks: &'a [LocalCheck], name: &str) -> &'a CheckResult {
        &checks.iter().find(|c| c.check == name).unwrap().result
    }

    #[test]
    fn test_quantified_bullets() {
        assert!(is_quantified("Reduced latency by 40%"));
        assert!(is_quantified("Saved $50k annually"));
        assert!(is_quantified("Mentored 4 engineers"));
        assert!(!is_quantified("Improved the onboarding flow"));
    }

    #[test]
    fn test_contact_reports_missing_fields() {
        let checks = run_local_checks(&doc(json!({"basics": {"name": "Ada", "email": " "}})));
        let contact = find(&checks, "contact");
        assert!(!contact.passed);
        assert_eq!(contact.score, Some(33));
        assert_eq!(contact.issues, vec!["Missing contact email", "Missing contact phone"]);
    }

    #[test]
    fn test_sections_full_marks() {
        let checks = run_local_checks(&doc(json!({
            "work": [{"name": "Acme"}],
            "education": [{"institution": "MIT"}],
            "skills": [{"name": "Rust"}]
        })));
        let sections = find(&checks, "sections");
        assert!(sections.passed);
        assert_eq!(sections.score, Some(100));
    }

    #[test]
    fn test_impact_flags_vague_bullets() {
        let checks = run_local_checks(&doc(json!({
            "work": [{"highlights": ["Cut p99 latency by 35%", "Helped the team with releases"]}]
        })));
        let impact = find(&checks, "impact");
        assert!(!impact.passed);
        assert_eq!(impact.score, Some(50));
        assert!(impact.issues[0].contains("vague verb 'helped'"));
    }

    #[test]
    fn test_impact_without_bullets_has_no_score() {
        let checks = run_local_checks(&ResumeDocument::default());
        let impact = find(&checks, "impact");
        assert_eq!(impact.score, None);
        assert!(!impact.passed);
    }

    #[test]
    fn test_impact_caps_quoted_bullets() {
        let highlights: Vec<String> = (0..8).map(|i| format!("Did thing {}", "x".repeat(i))).collect();
        let checks = run_local_checks(&doc(json!({"work": [{"highlights": highlights}]})));
        let impact = find(&checks, "impact");
        assert_eq!(impact.issues.len(), MAX_QUOTED_BULLETS + 1);
        assert!(impact.issues.last().unwrap().starts_with("3 more bullets"));
    }
}
