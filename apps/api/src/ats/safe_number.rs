//! Numeric guard for every number that comes back from the scoring model.
//!
//! Nothing that flows into a persisted record may be NaN or infinite. All
//! coercion of untrusted numbers goes through this module.

use serde_json::Value;

/// Returns the value as a finite `f64`, or `None`.
///
/// Accepts JSON numbers and numeric strings (models sometimes quote numbers).
/// Missing values, `null`, booleans, non-numeric strings and non-finite
/// results all become `None`.
pub fn safe_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    finite(n)
}

/// Guards a locally computed float.
pub fn finite(n: f64) -> Option<f64> {
    n.is_finite().then_some(n)
}

/// A 0–100 integer score.
pub fn safe_score(value: Option<&Value>) -> Option<i64> {
    safe_number(value).map(clamp_score)
}

/// Rounds and clamps an already finite float into 0–100.
pub fn clamp_score(n: f64) -> i64 {
    n.round().clamp(0.0, 100.0) as i64
}

/// A non-negative integer count.
pub fn safe_count(value: Option<&Value>) -> Option<u32> {
    let n = safe_number(value)?;
    (n >= 0.0).then(|| n.round().min(u32::MAX as f64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_inputs_become_none() {
        assert_eq!(finite(f64::NAN), None);
        assert_eq!(finite(f64::INFINITY), None);
        assert_eq!(finite(f64::NEG_INFINITY), None);
        assert_eq!(safe_number(Some(&json!("not a number"))), None);
        assert_eq!(safe_number(Some(&Value::Null)), None);
        assert_eq!(safe_number(None), None);
        assert_eq!(safe_number(Some(&json!(true))), None);
        assert_eq!(safe_number(Some(&json!([1]))), None);
    }

    #[test]
    fn test_non_finite_strings_are_rejected() {
        assert_eq!(safe_number(Some(&json!("NaN"))), None);
        assert_eq!(safe_number(Some(&json!("inf"))), None);
        assert_eq!(safe_number(Some(&json!("-Infinity"))), None);
    }

    #[test]
    fn test_numeric_strings_are_parsed() {
        assert_eq!(safe_number(Some(&json!("42"))), Some(42.0));
        assert_eq!(safe_number(Some(&json!(" 87.5 "))), Some(87.5));
        assert_eq!(safe_number(Some(&json!("64%"))), Some(64.0));
    }

    #[test]
    fn test_score_is_rounded_and_clamped() {
        assert_eq!(safe_score(Some(&json!(72.6))), Some(73));
        assert_eq!(safe_score(Some(&json!(140))), Some(100));
        assert_eq!(safe_score(Some(&json!(-3))), Some(0));
        assert_eq!(safe_score(Some(&json!("bad"))), None);
    }

    #[test]
    fn test_count_rejects_negatives() {
        assert_eq!(safe_count(Some(&json!(4))), Some(4));
        assert_eq!(safe_count(Some(&json!(2.4))), Some(2));
        assert_eq!(safe_count(Some(&json!(-1))), None);
    }
}
