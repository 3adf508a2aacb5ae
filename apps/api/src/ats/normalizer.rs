//! Text Normalizer — renders a resume as deterministic plain text for the
//! scoring model.
//!
//! Sections always appear in the same order and absent or empty sections emit
//! nothing. Entries inside a section keep their input order and are separated
//! by [`ENTRY_DELIMITER`].

use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::models::resume::{Basics, ResumeDocument};

pub const ENTRY_DELIMITER: &str = "---";

/// Renders the full resume. Pure and total.
pub fn normalize_resume(doc: &ResumeDocument) -> String {
    let mut out = String::new();

    if let Some(basics) = &doc.basics {
        let lines = contact_lines(basics);
        if !lines.is_empty() {
            push_section(&mut out, "CONTACT", vec![lines]);
        }
    }

    push_section(
        &mut out,
        "WORK EXPERIENCE",
        doc.work
            .iter()
            .map(|w| {
                let mut lines = Vec::new();
                field(&mut lines, "Company", w.name.as_deref());
                field(&mut lines, "Title", w.position.as_deref());
                dates(&mut lines, w.start_date.as_deref(), w.end_date.as_deref());
                field(&mut lines, "Summary", w.summary.as_deref());
                bullets(&mut lines, "Highlights", &w.highlights);
                lines
            })
            .collect(),
    );

    push_section(
        &mut out,
        "EDUCATION",
        doc.education
            .iter()
            .map(|e| {
                let mut lines = Vec::new();
                field(&mut lines, "Institution", e.institution.as_deref());
                field(&mut lines, "Degree", e.study_type.as_deref());
                field(&mut lines, "Field", e.area.as_deref());
                dates(&mut lines, e.start_date.as_deref(), e.end_date.as_deref());
                field(&mut lines, "Score", e.score.as_deref());
                list(&mut lines, "Courses", &e.courses);
                lines
            })
            .collect(),
    );

    push_section(
        &mut out,
        "SKILLS",
        doc.skills
            .iter()
            .map(|s| {
                let mut lines = Vec::new();
                field(&mut lines, "Category", s.name.as_deref());
                field(&mut lines, "Level", s.level.as_deref());
                list(&mut lines, "Keywords", &s.keywords);
                lines
            })
            .collect(),
    );

    push_section(
        &mut out,
        "PROJECTS",
        doc.projects
            .iter()
            .map(|p| {
                let mut lines = Vec::new();
                field(&mut lines, "Name", p.name.as_deref());
                field(&mut lines, "Description", p.description.as_deref());
                field(&mut lines, "URL", p.url.as_deref());
                dates(&mut lines, p.start_date.as_deref(), p.end_date.as_deref());
                bullets(&mut lines, "Highlights", &p.highlights);
                list(&mut lines, "Keywords", &p.keywords);
                lines
            })
            .collect(),
    );

    push_section(
        &mut out,
        "LANGUAGES",
        doc.languages
            .iter()
            .map(|l| {
                let mut lines = Vec::new();
                field(&mut lines, "Language", l.language.as_deref());
                field(&mut lines, "Fluency", l.fluency.as_deref());
                lines
            })
            .collect(),
    );

    push_section(
        &mut out,
        "CERTIFICATES",
        doc.certificates
            .iter()
            .map(|c| {
                let mut lines = Vec::new();
                field(&mut lines, "Name", c.name.as_deref());
                field(&mut lines, "Issuer", c.issuer.as_deref());
                field(&mut lines, "Date", c.date.as_deref());
                field(&mut lines, "URL", c.url.as_deref());
                lines
            })
            .collect(),
    );

    push_section(
        &mut out,
        "AWARDS",
        doc.awards
            .iter()
            .map(|a| {
                let mut lines = Vec::new();
                field(&mut lines, "Title", a.title.as_deref());
                field(&mut lines, "Awarder", a.awarder.as_deref());
                field(&mut lines, "Date", a.date.as_deref());
                field(&mut lines, "Summary", a.summary.as_deref());
                lines
            })
            .collect(),
    );

    push_section(
        &mut out,
        "PUBLICATIONS",
        doc.publications
            .iter()
            .map(|p| {
                let mut lines = Vec::new();
                field(&mut lines, "Title", p.name.as_deref());
                field(&mut lines, "Publisher", p.publisher.as_deref());
                field(&mut lines, "Date", p.release_date.as_deref());
                field(&mut lines, "URL", p.url.as_deref());
                field(&mut lines, "Summary", p.summary.as_deref());
                lines
            })
            .collect(),
    );

    push_section(
        &mut out,
        "VOLUNTEER",
        doc.volunteer
            .iter()
            .map(|v| {
                let mut lines = Vec::new();
                field(&mut lines, "Organization", v.organization.as_deref());
                field(&mut lines, "Role", v.position.as_deref());
                dates(&mut lines, v.start_date.as_deref(), v.end_date.as_deref());
                field(&mut lines, "Summary", v.summary.as_deref());
                bullets(&mut lines, "Highlights", &v.highlights);
                lines
            })
            .collect(),
    );

    out.trim_end().to_string()
}

/// SHA-256 (hex) of the work/education/skills subset. Equal hashes mean
/// section-level feedback computed earlier is still valid.
///
/// Hashes the serialized subset rather than the rendered text, so every field
/// and every entry (blank ones included) counts.
pub fn analysis_content_hash(doc: &ResumeDocument) -> String {
    let mut hasher = Sha256::new();
    match serde_json::to_vec(&doc.analysis_subset()) {
        Ok(bytes) => hasher.update(&bytes),
        // Only strings and lists of strings; serialization does not fail.
        Err(_) => hasher.update(normalize_resume(&doc.analysis_subset()).as_bytes()),
    }
    hex::encode(hasher.finalize())
}

fn contact_lines(basics: &Basics) -> Vec<String> {
    let mut lines = Vec::new();
    field(&mut lines, "Name", basics.name.as_deref());
    field(&mut lines, "Headline", basics.label.as_deref());
    field(&mut lines, "Email", basics.email.as_deref());
    field(&mut lines, "Phone", basics.phone.as_deref());
    field(&mut lines, "Website", basics.url.as_deref());
    if let Some(loc) = &basics.location {
        let parts: Vec<&str> = [&loc.city, &loc.region, &loc.country_code]
            .into_iter()
            .filter_map(|p| non_empty(p.as_deref()))
            .collect();
        if !parts.is_empty() {
            lines.push(format!("Location: {}", parts.join(", ")));
        }
    }
    for profile in &basics.profiles {
        let network = non_empty(profile.network.as_deref()).unwrap_or("Profile");
        if let Some(target) =
            non_empty(profile.url.as_deref()).or(non_empty(profile.username.as_deref()))
        {
            lines.push(format!("{network}: {target}"));
        }
    }
    field(&mut lines, "Summary", basics.summary.as_deref());
    lines
}

fn push_section(out: &mut String, title: &str, entries: Vec<Vec<String>>) {
    let entries: Vec<Vec<String>> = entries.into_iter().filter(|e| !e.is_empty()).collect();
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "=== {title} ===");
    for (i, lines) in entries.iter().enumerate() {
        if i > 0 {
            let _ = writeln!(out, "{ENTRY_DELIMITER}");
        }
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
    }
    out.push('\n');
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn field(lines: &mut Vec<String>, label: &str, value: Option<&str>) {
    if let Some(v) = non_empty(value) {
        lines.push(format!("{label}: {v}"));
    }
}

fn dates(lines: &mut Vec<String>, start: Option<&str>, end: Option<&str>) {
    match (non_empty(start), non_empty(end)) {
        (Some(s), Some(e)) => lines.push(format!("Dates: {s} - {e}")),
        (Some(s), None) => lines.push(format!("Dates: {s} - Present")),
        (None, Some(e)) => lines.push(format!("Dates: until {e}")),
        (None, None) => {}
    }
}

fn list(lines: &mut Vec<String>, label: &str, items: &[String]) {
    let items: Vec<&str> = items.iter().filter_map(|i| non_empty(Some(i.as_str()))).collect();
    if !items.is_empty() {
        lines.push(format!("{label}: {}", items.join(", ")));
    }
}

fn bullets(lines: &mut Vec<String>, label: &str, items: &[String]) {
    let items: Vec<&str> = items.iter().filter_map(|i| non_empty(Some(i.as_str()))).collect();
    if items.is_empty() {
        return;
    }
    lines.push(format!("{label}:"));
    lines.extend(items.into_iter().map(|i| format!("- {i}")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::{SkillGroup, WorkEntry};
    use serde_json::json;

    fn sample() -> ResumeDocument {
        serde_json::from_value(json!({
            "basics": {
                "name": "Ada Lovelace",
                "email": "ada@example.com",
                "location": {"city": "London", "countryCode": "GB"},
                "profiles": [{"network": "GitHub", "url": "https://github.com/ada"}]
            },
            "work": [
                {"name": "Analytical Engines", "position": "Engineer", "startDate": "2019-01",
                 "highlights": ["Cut build time by 40%", "Led 3 engineers"]},
                {"name": "Difference Co", "position": "Intern", "startDate": "2018-01", "endDate": "2018-12"}
            ],
            "skills": [{"name": "Languages", "keywords": ["Rust", "Python"]}],
            "volunteer": [{"organization": "Code Club", "position": "Mentor"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_normalizer_is_deterministic() {
        let doc = sample();
        assert_eq!(normalize_resume(&doc), normalize_resume(&doc));
    }

    #[test]
    fn test_skills_only_emits_only_skills_header() {
        let doc = ResumeDocument {
            skills: vec![SkillGroup {
                name: Some("Cloud".to_string()),
                level: None,
                keywords: vec!["AWS".to_string(), "GCP".to_string()],
            }],
            ..Default::default()
        };
        let text = normalize_resume(&doc);
        assert_eq!(text.matches("===").count(), 2, "one header line expected: {text}");
        assert!(text.starts_with("=== SKILLS ==="));
        assert!(text.contains("Keywords: AWS, GCP"));
    }

    #[test]
    fn test_sections_follow_fixed_order() {
        let text = normalize_resume(&sample());
        let contact = text.find("=== CONTACT ===").unwrap();
        let work = text.find("=== WORK EXPERIENCE ===").unwrap();
        let skills = text.find("=== SKILLS ===").unwrap();
        let volunteer = text.find("=== VOLUNTEER ===").unwrap();
        assert!(contact < work && work < skills && skills < volunteer);
        assert!(!text.contains("=== EDUCATION ==="));
    }

    #[test]
    fn test_entries_are_delimited_in_input_order() {
        let text = normalize_resume(&sample());
        let first = text.find("Company: Analytical Engines").unwrap();
        let delim = text.find(ENTRY_DELIMITER).unwrap();
        let second = text.find("Company: Difference Co").unwrap();
        assert!(first < delim && delim < second);
        assert!(text.contains("Dates: 2019-01 - Present"));
        assert!(text.contains("- Cut build time by 40%"));
    }

    #[test]
    fn test_empty_document_renders_empty_string() {
        assert_eq!(normalize_resume(&ResumeDocument::default()), "");
    }

    #[test]
    fn test_entries_with_only_blank_fields_are_skipped() {
        let doc = ResumeDocument {
            work: vec![WorkEntry {
                name: Some("  ".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(normalize_resume(&doc), "");
    }

    #[test]
    fn test_contact_renders_location_and_profiles() {
        let text = normalize_resume(&sample());
        assert!(text.contains("Location: London, GB"));
        assert!(text.contains("GitHub: https://github.com/ada"));
    }

    #[test]
    fn test_hash_stable_for_unchanged_resume() {
        let doc = sample();
        assert_eq!(analysis_content_hash(&doc), analysis_content_hash(&doc.clone()));
        assert_eq!(analysis_content_hash(&doc).len(), 64);
    }

    #[test]
    fn test_hash_changes_when_work_changes() {
        let doc = sample();
        let mut edited = doc.clone();
        edited.work[1].highlights.push("Shipped a release".to_string());
        assert_ne!(analysis_content_hash(&doc), analysis_content_hash(&edited));
    }

    #[test]
    fn test_hash_changes_when_unrendered_field_changes() {
        let doc = sample();
        let mut edited = doc.clone();
        edited.work[0].url = Some("https://engines.example".to_string());
        assert_ne!(analysis_content_hash(&doc), analysis_content_hash(&edited));
    }

    #[test]
    fn test_hash_changes_when_blank_entry_appended() {
        let doc = sample();
        let mut edited = doc.clone();
        edited.work.push(WorkEntry::default());
        assert_eq!(normalize_resume(&doc), normalize_resume(&edited));
        assert_ne!(analysis_content_hash(&doc), analysis_content_hash(&edited));
    }

    #[test]
    fn test_hash_ignores_sections_outside_subset() {
        let doc = sample();
        let mut edited = doc.clone();
        edited.volunteer.clear();
        if let Some(basics) = edited.basics.as_mut() {
            basics.phone = Some("+44 1234".to_string());
        }
        assert_eq!(analysis_content_hash(&doc), analysis_content_hash(&edited));
    }
}
