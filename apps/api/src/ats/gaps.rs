//! Gap/Keyword Reconciler.
//!
//! The scoring model reports missing skills and keywords either as plain
//! strings or as `{keyword|skill, priority, context}` objects. Which shape was
//! used is decided structurally from the first element. Both shapes collapse
//! into [`ReconciledGaps`]: a flat name list for simple consumers, plus the
//! priority-tagged list when the richer shape was supplied.

use serde_json::Value;
use tracing::debug;

use crate::models::analysis::{ActionableFeedback, GapPriority, PrioritizedKeyword, PrioritizedSkill};

/// A priority-tagged gap entry as persisted.
pub trait GapItem: Sized {
    /// Preferred key holding the entry's name in the upstream object.
    const NAME_KEY: &'static str;

    fn from_parts(name: String, priority: GapPriority, context: Option<String>) -> Self;
    fn name(&self) -> &str;
    fn priority(&self) -> GapPriority;
}

impl GapItem for PrioritizedKeyword {
    const NAME_KEY: &'static str = "keyword";

    fn from_parts(keyword: String, priority: GapPriority, context: Option<String>) -> Self {
        Self {
            keyword,
            priority,
            context,
        }
    }

    fn name(&self) -> &str {
        &self.keyword
    }

    fn priority(&self) -> GapPriority {
        self.priority
    }
}

impl GapItem for PrioritizedSkill {
    const NAME_KEY: &'static str = "skill";

    fn from_parts(skill: String, priority: GapPriority, context: Option<String>) -> Self {
        Self {
            skill,
            priority,
            context,
        }
    }

    fn name(&self) -> &str {
        &self.skill
    }

    fn priority(&self) -> GapPriority {
        self.priority
    }
}

/// Canonical form of a missing-skill or missing-keyword list.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledGaps<T> {
    pub names: Vec<String>,
    /// Present only when the upstream list used the priority-tagged shape.
    pub prioritized: Option<Vec<T>>,
    /// Elements that did not match the detected shape and were dropped.
    pub skipped: usize,
}

impl<T> Default for ReconciledGaps<T> {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            prioritized: None,
            skipped: 0,
        }
    }
}

impl<T: GapItem> ReconciledGaps<T> {
    /// Names of the high-priority entries, if priorities are known.
    pub fn high_priority_names(&self) -> Vec<&str> {
        self.prioritized
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|item| item.priority() == GapPriority::High)
            .map(GapItem::name)
            .collect()
    }
}

enum GapShape {
    Plain,
    Prioritized,
}

fn detect_shape(items: &[Value]) -> Option<GapShape> {
    match items.first()? {
        Value::Object(_) => Some(GapShape::Prioritized),
        _ => Some(GapShape::Plain),
    }
}

/// Reconciles one upstream gap list. Never fails.
pub fn reconcile_gaps<T: GapItem>(items: &[Value]) -> ReconciledGaps<T> {
    let mut out = ReconciledGaps::default();

    match detect_shape(items) {
        None => {}
        Some(GapShape::Plain) => {
            for item in items {
                match item.as_str().map(str::trim) {
                    Some(name) if !name.is_empty() => out.names.push(name.to_string()),
                    _ => out.skipped += 1,
                }
            }
        }
        Some(GapShape::Prioritized) => {
            let mut prioritized = Vec::with_capacity(items.len());
            for item in items {
                match prioritized_item::<T>(item) {
                    Some(entry) => {
                        out.names.push(entry.name().to_string());
                        prioritized.push(entry);
                    }
                    None => out.skipped += 1,
                }
            }
            out.prioritized = Some(prioritized);
        }
    }

    out
}

fn prioritized_item<T: GapItem>(item: &Value) -> Option<T> {
    let obj = item.as_object()?;
    let name = [T::NAME_KEY, "name", "keyword", "skill"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();
    let priority = read_priority(obj.get("priority"), &name);
    let context = obj
        .get("context")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(T::from_parts(name, priority, context))
}

fn read_priority(value: Option<&Value>, name: &str) -> GapPriority {
    match value.and_then(Value::as_str).and_then(GapPriority::parse) {
        Some(priority) => priority,
        None => {
            debug!("Gap '{name}' has no recognised priority, defaulting to medium");
            GapPriority::Medium
        }
    }
}

/// Passes `{priority, action, impact}` items through in their original order.
/// Items without an action are dropped and counted.
pub fn actionable_feedback(items: &[Value]) -> (Vec<ActionableFeedback>, usize) {
    let mut feedback = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for item in items {
        let Some(obj) = item.as_object() else {
            skipped += 1;
            continue;
        };
        let Some(action) = obj
            .get("action")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            skipped += 1;
            continue;
        };
        let priority = read_priority(obj.get("priority"), action);
        let impact = obj
            .get("impact")
            .or_else(|| obj.get("expectedImpact"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        feedback.push(ActionableFeedback {
            priority,
            action: action.to_string(),
            impact,
        });
    }

    (feedback, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(value: Value) -> Vec<Value> {
        value.as_array().cloned().unwrap()
    }

    #[test]
    fn test_flat_list_round_trips() {
        let gaps: ReconciledGaps<PrioritizedSkill> =
            reconcile_gaps(&items(json!(["Python", "Docker"])));
        assert_eq!(gaps.names, vec!["Python", "Docker"]);
        assert!(gaps.prioritized.is_none());
        assert_eq!(gaps.skipped, 0);
    }

    #[test]
    fn test_prioritized_list_keeps_priority_and_context() {
        let gaps: ReconciledGaps<PrioritizedSkill> = reconcile_gaps(&items(json!([
            {"skill": "Python", "priority": "high", "context": "Listed under requirements"}
        ])));
        assert_eq!(gaps.names, vec!["Python"]);
        assert_eq!(
            gaps.prioritized,
            Some(vec![PrioritizedSkill {
                skill: "Python".to_string(),
                priority: GapPriority::High,
                context: Some("Listed under requirements".to_string()),
            }])
        );
    }

    #[test]
    fn test_keyword_objects_use_keyword_key() {
        let gaps: ReconciledGaps<PrioritizedKeyword> = reconcile_gaps(&items(json!([
            {"keyword": "Kubernetes", "priority": "LOW"},
            {"name": "Terraform", "priority": "medium"}
        ])));
        assert_eq!(gaps.names, vec!["Kubernetes", "Terraform"]);
        let prioritized = gaps.prioritized.unwrap();
        assert_eq!(prioritized[0].priority, GapPriority::Low);
        assert_eq!(prioritized[1].keyword, "Terraform");
        assert!(prioritized[1].context.is_none());
    }

    #[test]
    fn test_shape_follows_first_element() {
        // First element is a string, so objects are treated as noise.
        let gaps: ReconciledGaps<PrioritizedSkill> =
            reconcile_gaps(&items(json!(["Go", {"skill": "Rust", "priority": "high"}, ""])));
        assert_eq!(gaps.names, vec!["Go"]);
        assert!(gaps.prioritized.is_none());
        assert_eq!(gaps.skipped, 2);
    }

    #[test]
    fn test_unknown_priority_defaults_to_medium() {
        let gaps: ReconciledGaps<PrioritizedSkill> = reconcile_gaps(&items(json!([
            {"skill": "SQL", "priority": "critical"},
            {"skill": "Kafka"}
        ])));
        let prioritized = gaps.prioritized.unwrap();
        assert!(prioritized.iter().all(|p| p.priority == GapPriority::Medium));
    }

    #[test]
    fn test_objects_without_name_are_skipped() {
        let gaps: ReconciledGaps<PrioritizedKeyword> = reconcile_gaps(&items(json!([
            {"priority": "high"},
            {"keyword": "CI/CD", "priority": "high"}
        ])));
        assert_eq!(gaps.names, vec!["CI/CD"]);
        assert_eq!(gaps.skipped, 1);
    }

    #[test]
    fn test_high_priority_names() {
        let gaps: ReconciledGaps<PrioritizedKeyword> = reconcile_gaps(&items(json!([
            {"keyword": "AWS", "priority": "high"},
            {"keyword": "Jira", "priority": "low"}
        ])));
        assert_eq!(gaps.high_priority_names(), vec!["AWS"]);

        let flat: ReconciledGaps<PrioritizedKeyword> = reconcile_gaps(&items(json!(["AWS"])));
        assert!(flat.high_priority_names().is_empty());
    }

    #[test]
    fn test_empty_list() {
        let gaps: ReconciledGaps<PrioritizedKeyword> = reconcile_gaps(&[]);
        assert!(gaps.names.is_empty());
        assert!(gaps.prioritized.is_none());
    }

    #[test]
    fn test_actionable_feedback_passes_through_in_order() {
        let (feedback, skipped) = actionable_feedback(&items(json!([
            {"priority": "low", "action": "Add a GitHub link", "impact": "Small credibility boost"},
            {"priority": "high", "action": "Mention Kubernetes", "impact": "Clears a hard requirement"},
            {"priority": "high"},
            "not an object"
        ])));
        assert_eq!(skipped, 2);
        assert_eq!(feedback.len(), 2);
        assert_eq!(feedback[0].priority, GapPriority::Low);
        assert_eq!(feedback[1].action, "Mention Kubernetes");
        assert_eq!(feedback[1].impact, "Clears a hard requirement");
    }
}
