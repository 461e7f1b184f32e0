//! Response scoring rubric.
//!
//! Competing provider responses to the same prompt are ranked by a
//! type-specific heuristic score. Zero means unusable; everything else
//! orders candidates for selection in the orchestrator.

use crate::llm::json::{extract_json_array, extract_json_object};
use serde_json::Value;

/// Expected shape of an orchestrated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// A JSON object, optionally checked against expected field names
    Json,
    /// A JSON array of strings
    Array,
    /// Free-form prose
    Text,
}

const JSON_BASE: f64 = 10.0;
const JSON_FIELD_CREDIT: f64 = 20.0;
const JSON_STRUCTURE_CAP: f64 = 10.0;

const ARRAY_BASE: f64 = 10.0;
const ARRAY_ELEMENT_BONUS: f64 = 2.0;
const ARRAY_BONUS_CAP: f64 = 20.0;

const TEXT_BASE: f64 = 5.0;
const TEXT_SENTENCE_CAP: f64 = 5.0;

/// Score one raw response. Unusable responses (unparsable JSON, empty
/// text) score exactly 0.
pub fn score_response(raw: &str, response_type: ResponseType, expected_fields: &[String]) -> f64 {
    match response_type {
        ResponseType::Json => score_json(raw, expected_fields),
        ResponseType::Array => score_array(raw),
        ResponseType::Text => score_text(raw),
    }
}

fn score_json(raw: &str, expected_fields: &[String]) -> f64 {
    let Ok(json) = extract_json_object(raw) else {
        return 0.0;
    };
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&json) else {
        return 0.0;
    };

    let mut score = JSON_BASE;

    if !expected_fields.is_empty() {
        let present: Vec<&Value> = expected_fields
            .iter()
            .filter_map(|f| object.get(f.as_str()))
            .collect();
        score += JSON_FIELD_CREDIT * present.len() as f64 / expected_fields.len() as f64;

        // Structural completeness of each field block
        let mut structure: f64 = 0.0;
        for value in present {
            if let Value::Object(block) = value {
                for key in ["value", "confidence", "inferred"] {
                    if block.contains_key(key) {
                        structure += 1.0;
                    }
                }
            }
        }
        score += structure.min(JSON_STRUCTURE_CAP);
    }

    score
}

fn score_array(raw: &str) -> f64 {
    let Ok(json) = extract_json_array(raw) else {
        return 0.0;
    };
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&json) else {
        return 0.0;
    };

    let non_empty = items
        .iter()
        .filter(|v| matches!(v, Value::String(s) if !s.trim().is_empty()))
        .count();

    ARRAY_BASE + (ARRAY_ELEMENT_BONUS * non_empty as f64).min(ARRAY_BONUS_CAP)
}

fn score_text(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    // Reward substantial-but-not-bloated answers
    let length_bonus = match trimmed.chars().count() {
        80..=2000 => 10.0,
        20..=79 | 2001..=4000 => 5.0,
        _ => 1.0,
    };

    let sentences = trimmed
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    let sentence_bonus = (sentences.saturating_sub(1) as f64).min(TEXT_SENTENCE_CAP);

    TEXT_BASE + length_bonus + sentence_bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unparsable_json_scores_zero() {
        assert_eq!(score_response("not json at all", ResponseType::Json, &[]), 0.0);
        assert_eq!(score_response("{broken", ResponseType::Json, &[]), 0.0);
    }

    #[test]
    fn test_json_rewards_expected_field_coverage() {
        let expected = fields(&["дата", "сумма"]);
        let full = r#"{"дата": {"value": "12.05.2024", "confidence": 0.9, "inferred": false},
                       "сумма": {"value": "1500", "confidence": 0.8, "inferred": false}}"#;
        let partial = r#"{"дата": {"value": "12.05.2024"}}"#;
        let empty = r#"{}"#;

        let full_score = score_response(full, ResponseType::Json, &expected);
        let partial_score = score_response(partial, ResponseType::Json, &expected);
        let empty_score = score_response(empty, ResponseType::Json, &expected);

        assert!(full_score > partial_score);
        assert!(partial_score > empty_score);
        assert_eq!(empty_score, JSON_BASE);
        // Full coverage with complete blocks: base + credit + 6 structure
        assert_eq!(full_score, JSON_BASE + JSON_FIELD_CREDIT + 6.0);
    }

    #[test]
    fn test_array_scores_by_non_empty_strings() {
        assert_eq!(score_response("{}", ResponseType::Array, &[]), 0.0);
        assert_eq!(
            score_response(r#"["дата", "сумма", ""]"#, ResponseType::Array, &[]),
            ARRAY_BASE + 4.0
        );
        // Bonus is capped
        let many: Vec<String> = (0..30).map(|i| format!("\"f{}\"", i)).collect();
        let raw = format!("[{}]", many.join(","));
        assert_eq!(
            score_response(&raw, ResponseType::Array, &[]),
            ARRAY_BASE + ARRAY_BONUS_CAP
        );
    }

    #[test]
    fn test_text_scoring_bands() {
        assert_eq!(score_response("   ", ResponseType::Text, &[]), 0.0);

        let short = "Да.";
        let substantial =
            "Это поле обычно содержит дату составления документа. Формат даты чаще всего ДД.ММ.ГГГГ. Иногда дата дублируется прописью.";
        assert!(
            score_response(substantial, ResponseType::Text, &[])
                > score_response(short, ResponseType::Text, &[])
        );
    }
}
