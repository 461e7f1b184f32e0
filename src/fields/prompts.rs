//! Prompt builders for field extraction.
//!
//! Kept as plain string builders so every provider sees the same
//! instructions and tests can assert on prompt content.

/// Upper bound on suggested field names regardless of the caller's ask.
pub const MAX_SUGGESTED_FIELDS: usize = 10;

const DESCRIBE_CONTEXT_LIMIT: usize = 1200;

/// Batch extraction prompt: one strict-JSON object keyed by field name.
pub fn batch_extraction(fields: &[String], text: &str) -> String {
    let field_list: String = fields
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{}. {}", i + 1, f))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an extraction assistant. Extract values for the requested fields from the document text.

Fields:
{field_list}

Instructions:
- Return STRICT JSON only (no extra commentary or surrounding text).
- For every requested field return an object with keys: "value" (string), "confidence" (0.0-1.0), "candidates" (array), and "inferred" (boolean).
- Normalise currency names/symbols to ISO codes when the field name hints at money (e.g. "валюта", "currency", "amount") and prefer RUB for "₽", "р", "руб".
- If you can find a clear, explicit value in the document, set "inferred": false and a high confidence.
- If the document does NOT contain an explicit value for a field, provide a best-effort GUESS for that field, set "inferred": true, and provide a conservative confidence (for example 0.2-0.4). Do not leave the field out.
- In candidates include alternative extracted texts or spans if available, with optional bbox metadata.
- Keep answers concise, avoid explanations.

Output format example:
{{
  "FIELD_NAME": {{ "value": "...", "confidence": 0.0, "candidates":[{{"text":"...","confidence":0.9,"bbox":[x,y,w,h]}}], "inferred": false }},
  ...
}}

Document text:
{text}"#
    )
}

/// Field suggestion prompt: a pure JSON array of field names.
pub fn suggest_fields(text: &str, max_fields: usize) -> String {
    format!(
        r#"You are a document structure detector. From the following OCR text, propose {} concise field names (in the document language) that best describe the key attributes to extract. Always include money-related fields when amounts or currency symbols are present (e.g. "сумма", "валюта", "общая сумма"). Respond with a pure JSON array of strings, no comments.

Text:
{}"#,
        max_fields.min(12),
        text
    )
}

/// Plain-text description of what one field usually contains.
pub fn describe_field(field: &str, context: &str) -> String {
    let truncated: String = context.chars().take(DESCRIBE_CONTEXT_LIMIT).collect();
    format!(
        r#"You are a helpful assistant. Provide a brief but clear description (2-4 sentences) of what the field "{field}" usually contains in documents. If context text is provided, tailor the description to the document type. Respond in Russian if the field is in Russian, otherwise in English. Output plain text only.

Context (optional):
{truncated}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_prompt_numbers_fields() {
        let fields = vec!["дата".to_string(), "сумма".to_string()];
        let prompt = batch_extraction(&fields, "Чек на 100 руб");
        assert!(prompt.contains("1. дата"));
        assert!(prompt.contains("2. сумма"));
        assert!(prompt.contains("Чек на 100 руб"));
        assert!(prompt.contains("STRICT JSON"));
    }

    #[test]
    fn test_suggest_prompt_caps_field_count() {
        let prompt = suggest_fields("text", 50);
        assert!(prompt.contains("propose 12 concise"));
    }

    #[test]
    fn test_describe_prompt_truncates_context() {
        let context = "х".repeat(5000);
        let prompt = describe_field("дата", &context);
        let tail = prompt.split("Context (optional):\n").nth(1).unwrap();
        assert_eq!(tail.chars().count(), DESCRIBE_CONTEXT_LIMIT);
    }
}
