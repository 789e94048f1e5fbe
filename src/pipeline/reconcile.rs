//! Reconciliation: messy oracle keys and values → the fixed six fields.
//!
//! Models spell field names however they like ("Polish Application",
//! "polish_application", "PolishApplication") and wrap values however they
//! like (a `{score, comment}` object, a bare number, a finished string).
//! Rather than duck-typing through that, every value is first classified
//! into an explicit [`FieldValue`] variant and then flattened. The alias
//! handling lives in one fold function with an exhaustive test, so a new
//! spelling observed in the wild gets added exactly once.
//!
//! Unrecognised keys are dropped; fields missing after normalisation get
//! the `"None"` sentinel. Reconciliation itself cannot fail.

use crate::pipeline::assess::RawAssessment;
use crate::schema::{AssessmentResult, Field, Sentinel};
use serde_json::Value;
use tracing::debug;

/// One classified oracle value, before flattening.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A structured `{score, comment}` object. Members of the wrong type
    /// count as absent.
    RawScore {
        score: Option<serde_json::Number>,
        comment: Option<String>,
    },
    /// A value that is already presentable cell text.
    Flat(String),
    /// Nothing usable.
    Missing,
}

/// Map one oracle key onto a canonical field, if it is recognisable.
///
/// The fold is lowercase with whitespace, underscores, and hyphens
/// removed, which makes the spaced and compact spellings of every field
/// collide onto the same name.
pub fn canonical_field(key: &str) -> Option<Field> {
    let folded: String = key
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect();
    match folded.as_str() {
        "polishapplication" => Some(Field::PolishApplication),
        "cuticlework" => Some(Field::CuticleWork),
        "nailshape" => Some(Field::NailShape),
        "cleanliness" => Some(Field::Cleanliness),
        "overallscore" => Some(Field::OverallScore),
        "recommendation" => Some(Field::Recommendation),
        _ => None,
    }
}

/// Classify one raw JSON value.
pub fn classify(value: &Value) -> FieldValue {
    match value {
        Value::Object(map) if map.contains_key("score") || map.contains_key("comment") => {
            FieldValue::RawScore {
                score: map.get("score").and_then(Value::as_number).cloned(),
                comment: map
                    .get("comment")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }
        }
        Value::Number(n) => FieldValue::Flat(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => FieldValue::Flat(s.trim().to_string()),
        _ => FieldValue::Missing,
    }
}

/// Flatten a classified value to cell text, `None` meaning "use the
/// sentinel".
pub fn flatten(value: FieldValue) -> Option<String> {
    match value {
        FieldValue::RawScore { score, comment } => {
            let score = score.map_or_else(|| "None".to_string(), |n| n.to_string());
            let comment = comment.unwrap_or_else(|| "None".to_string());
            Some(format!("{score}, {comment}"))
        }
        FieldValue::Flat(text) => Some(text),
        FieldValue::Missing => None,
    }
}

/// Fold a raw oracle mapping into the fixed six-field result.
///
/// Later duplicate spellings of the same field overwrite earlier ones.
pub fn reconcile(raw: &RawAssessment) -> AssessmentResult {
    let mut values: [Option<String>; 6] = [None, None, None, None, None, None];

    for (key, value) in raw {
        match canonical_field(key) {
            Some(field) => values[field.index()] = flatten(classify(value)),
            None => debug!("dropping unrecognised oracle key {key:?}"),
        }
    }

    let sentinel = || Sentinel::None.literal().to_string();
    let [polish_application, cuticle_work, nail_shape, cleanliness, overall_score, recommendation] =
        values;
    AssessmentResult {
        polish_application: polish_application.unwrap_or_else(sentinel),
        cuticle_work: cuticle_work.unwrap_or_else(sentinel),
        nail_shape: nail_shape.unwrap_or_else(sentinel),
        cleanliness: cleanliness.unwrap_or_else(sentinel),
        overall_score: overall_score.unwrap_or_else(sentinel),
        recommendation: recommendation.unwrap_or_else(sentinel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawAssessment {
        value.as_object().expect("test value is an object").clone()
    }

    #[test]
    fn every_known_alias_resolves() {
        let aliases: [(&str, Field); 6] = [
            ("Polish Application", Field::PolishApplication),
            ("Cuticle Work", Field::CuticleWork),
            ("Nail Shape", Field::NailShape),
            ("Cleanliness", Field::Cleanliness),
            ("Overall Score", Field::OverallScore),
            ("Recommendation", Field::Recommendation),
        ];
        for (spaced, field) in aliases {
            let compact: String = spaced.split_whitespace().collect();
            let snake = spaced.replace(' ', "_");
            let kebab = spaced.replace(' ', "-");
            for variant in [
                spaced.to_string(),
                spaced.to_lowercase(),
                spaced.to_uppercase(),
                compact,
                snake.to_lowercase(),
                kebab,
                format!("  {spaced}  "),
            ] {
                assert_eq!(
                    canonical_field(&variant),
                    Some(field),
                    "alias {variant:?} should resolve"
                );
            }
        }
    }

    #[test]
    fn unknown_keys_resolve_to_nothing() {
        assert_eq!(canonical_field("Vibe"), None);
        assert_eq!(canonical_field(""), None);
        assert_eq!(canonical_field("overall"), None);
    }

    #[test]
    fn structured_value_flattens_regardless_of_member_order() {
        let a = classify(&json!({"score": 7, "comment": "clean edges"}));
        let b = classify(&json!({"comment": "clean edges", "score": 7}));
        assert_eq!(flatten(a).as_deref(), Some("7, clean edges"));
        assert_eq!(flatten(b).as_deref(), Some("7, clean edges"));
    }

    #[test]
    fn partial_structured_values_use_none_fragments() {
        let only_score = classify(&json!({"score": 7}));
        assert_eq!(flatten(only_score).as_deref(), Some("7, None"));

        let only_comment = classify(&json!({"comment": "tidy"}));
        assert_eq!(flatten(only_comment).as_deref(), Some("None, tidy"));
    }

    #[test]
    fn bare_numbers_stay_numbers() {
        assert_eq!(flatten(classify(&json!(8.5))).as_deref(), Some("8.5"));
        assert_eq!(flatten(classify(&json!(8))).as_deref(), Some("8"));
    }

    #[test]
    fn flat_strings_are_trimmed_and_kept() {
        assert_eq!(
            flatten(classify(&json!("  Recommend Hire "))).as_deref(),
            Some("Recommend Hire")
        );
    }

    #[test]
    fn unusable_values_go_missing() {
        assert_eq!(classify(&json!(null)), FieldValue::Missing);
        assert_eq!(classify(&json!("")), FieldValue::Missing);
        assert_eq!(classify(&json!("   ")), FieldValue::Missing);
        assert_eq!(classify(&json!([1, 2])), FieldValue::Missing);
        assert_eq!(classify(&json!({"note": "no score members"})), FieldValue::Missing);
        assert_eq!(classify(&json!(true)), FieldValue::Missing);
    }

    #[test]
    fn full_response_reconciles_to_all_six_fields() {
        let result = reconcile(&raw(json!({
            "polish_application": {"score": 9, "comment": "even coat"},
            "Cuticle Work": {"score": 8, "comment": "slight overgrowth"},
            "NailShape": {"score": 9, "comment": "uniform ovals"},
            "CLEANLINESS": {"score": 10, "comment": "spotless"},
            "Overall Score": 9.0,
            "Recommendation": "Highly Recommend Hire"
        })));

        assert_eq!(result.polish_application, "9, even coat");
        assert_eq!(result.cuticle_work, "8, slight overgrowth");
        assert_eq!(result.nail_shape, "9, uniform ovals");
        assert_eq!(result.cleanliness, "10, spotless");
        assert_eq!(result.overall_score, "9.0");
        assert_eq!(result.recommendation, "Highly Recommend Hire");
    }

    #[test]
    fn missing_and_unknown_fields_become_sentinels() {
        let result = reconcile(&raw(json!({
            "Nail Shape": {"score": 6, "comment": "uneven tips"},
            "Barista Skills": 10
        })));

        assert_eq!(result.nail_shape, "6, uneven tips");
        assert_eq!(result.polish_application, "None");
        assert_eq!(result.cuticle_work, "None");
        assert_eq!(result.cleanliness, "None");
        assert_eq!(result.overall_score, "None");
        assert_eq!(result.recommendation, "None");
    }

    #[test]
    fn empty_response_is_all_sentinels() {
        let result = reconcile(&raw(json!({})));
        assert!(result.values().iter().all(|v| *v == "None"));
    }
}
