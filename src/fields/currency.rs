//! Currency detection over recognized text.
//!
//! Two tiers: explicit symbols and ISO codes first, spelled-out
//! currency words only when no symbol matched. Candidates come back
//! sorted by score so the first entry is the best guess.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One detected currency with a heuristic score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyCandidate {
    /// ISO 4217 code
    pub code: String,
    /// Human label shown alongside the code
    pub label: String,
    pub score: f32,
    /// "symbol" or "word"
    pub source: String,
}

struct SymbolRule {
    regex: &'static Lazy<Regex>,
    code: &'static str,
    label: &'static str,
    score: f32,
}

static RUB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(₽|руб\.?|р[\s.]|RUB|RUR)").unwrap());
static USD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\$|USD|доллар)").unwrap());
static EUR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(€|EUR|евро)").unwrap());
static KZT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(₸|KZT|тенге)").unwrap());
static UAH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(₴|UAH|грн)").unwrap());

static RUB_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)руб").unwrap());
static USD_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$").unwrap());

static SYMBOL_RULES: [SymbolRule; 5] = [
    SymbolRule {
        regex: &RUB_RE,
        code: "RUB",
        label: "Российский рубль",
        score: 0.95,
    },
    SymbolRule {
        regex: &USD_RE,
        code: "USD",
        label: "Доллар США",
        score: 0.8,
    },
    SymbolRule {
        regex: &EUR_RE,
        code: "EUR",
        label: "Евро",
        score: 0.8,
    },
    SymbolRule {
        regex: &KZT_RE,
        code: "KZT",
        label: "Казахстанский тенге",
        score: 0.7,
    },
    SymbolRule {
        regex: &UAH_RE,
        code: "UAH",
        label: "Украинская гривна",
        score: 0.7,
    },
];

/// Scan text for currency mentions, best candidate first.
pub fn detect_currency(text: &str) -> Vec<CurrencyCandidate> {
    let mut candidates: Vec<CurrencyCandidate> = SYMBOL_RULES
        .iter()
        .filter(|rule| rule.regex.is_match(text))
        .map(|rule| CurrencyCandidate {
            code: rule.code.to_string(),
            label: rule.label.to_string(),
            score: rule.score,
            source: "symbol".to_string(),
        })
        .collect();

    if candidates.is_empty() {
        if RUB_WORD_RE.is_match(text) {
            candidates.push(CurrencyCandidate {
                code: "RUB".to_string(),
                label: "Российский рубль".to_string(),
                score: 0.6,
                source: "word".to_string(),
            });
        }
        if USD_WORD_RE.is_match(text) {
            candidates.push(CurrencyCandidate {
                code: "USD".to_string(),
                label: "Доллар США".to_string(),
                score: 0.55,
                source: "word".to_string(),
            });
        }
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ruble_amount_detected_as_symbol() {
        let candidates = detect_currency("Итого к оплате: 1500 руб.");
        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].code, "RUB");
        assert_eq!(candidates[0].source, "symbol");
        assert_eq!(candidates[0].score, 0.95);
    }

    #[test]
    fn test_multiple_currencies_sorted_by_score() {
        let candidates = detect_currency("Оплата: 100 $ или 9000 ₸");
        let codes: Vec<&str> = candidates.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["USD", "KZT"]);
    }

    #[test]
    fn test_ruble_symbol_outranks_dollar() {
        let candidates = detect_currency("Сумма 1500 ₽ (около 16 $)");
        assert_eq!(candidates[0].code, "RUB");
        assert!(candidates[0].score > candidates[1].score);
    }

    #[test]
    fn test_no_currency_mentions() {
        assert!(detect_currency("Протокол собрания от 12 мая").is_empty());
    }

    #[test]
    fn test_euro_word_form() {
        let candidates = detect_currency("стоимость указана в евро");
        assert_eq!(candidates[0].code, "EUR");
        assert_eq!(candidates[0].source, "symbol");
    }

    #[test]
    fn test_bare_p_with_trailing_dot() {
        let candidates = detect_currency("Цена 250 р. за штуку");
        assert_eq!(candidates[0].code, "RUB");
    }
}
