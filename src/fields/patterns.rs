//! Regex fallback for common document fields.
//!
//! Kicks in when the LLM batch left a field empty. Patterns target the
//! handful of field kinds that have a stable textual shape; anything
//! else goes through a generic "label: value" capture.

use once_cell::sync::Lazy;
use regex::Regex;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[.\-/]\d{1,2}[.\-/]\d{2,4}\b").unwrap());
static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,2}:\d{2}\b").unwrap());
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d[\d\s,.]*)\s?(?:₽|руб|RUB|р)\b").unwrap());
static CITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)город[:\s]+([^\r\n]+)").unwrap());
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)имя(?: клиента)?[:\s]+([^\r\n]+)").unwrap());

/// Try to extract a value for `field` from raw text.
///
/// Known field kinds are matched by dedicated patterns keyed on
/// substrings of the lowercased field name; unknown fields fall back to
/// a `field: value` line capture.
pub fn match_field(field: &str, text: &str) -> Option<String> {
    let key = field.to_lowercase();

    if key.contains("дата") {
        return first_match(&DATE_RE, text);
    }
    if key.contains("время") {
        return first_match(&TIME_RE, text);
    }
    if key.contains("цена") || key.contains("сумма") || key.contains("стоимость") {
        return first_group(&PRICE_RE, text);
    }
    if key.contains("город") {
        return first_group(&CITY_RE, text);
    }
    if key.contains("имя") || key.contains("клиент") {
        return first_group(&NAME_RE, text);
    }

    // Generic "label: value" on the same line as the field name
    let pattern = format!(r"(?i){}[:\-]\s*([^\r\n]+)", regex::escape(field));
    let generic = Regex::new(&pattern).ok()?;
    first_group(&generic, text)
}

fn first_match(re: &Regex, text: &str) -> Option<String> {
    re.find(text).map(|m| m.as_str().trim().to_string())
}

fn first_group(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
