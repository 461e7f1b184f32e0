//! Script detection for OCR language auto-correction.
//!
//! After an initial OCR pass the dominant alphabet of the output decides
//! whether the pass should be retried with a different language pack.

/// Default language used when nothing is pinned and detection is inconclusive.
pub const DEFAULT_LANGUAGE: &str = "rus+eng";

/// Language tags with bundled support; unknown tags are passed through
/// to the engine untouched.
pub const SUPPORTED_LANGUAGES: &[&str] = &["rus", "eng", "rus+eng", "deu", "fra", "spa"];

/// Outcome of dominant-script detection on OCR text.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptDetection {
    pub language: String,
    pub confidence: f32,
}

/// Normalize a caller-supplied language tag, defaulting empty input.
pub fn normalize_language(language: &str) -> String {
    let trimmed = language.trim();
    if trimmed.is_empty() {
        DEFAULT_LANGUAGE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Detect the dominant script by the Cyrillic/Latin letter ratio.
///
/// Thresholds: above 0.78 Cyrillic the text is treated as Russian, below
/// 0.22 as English, anything in between keeps the combined pack.
pub fn detect_script(text: &str) -> ScriptDetection {
    let mut cyrillic = 0usize;
    let mut latin = 0usize;

    for ch in text.chars() {
        if ('А'..='я').contains(&ch) || ch == 'Ё' || ch == 'ё' {
            cyrillic += 1;
        } else if ch.is_ascii_alphabetic() {
            latin += 1;
        }
    }

    let total = cyrillic + latin;
    if total == 0 {
        return ScriptDetection {
            language: DEFAULT_LANGUAGE.to_string(),
            confidence: 0.2,
        };
    }

    let ratio = cyrillic as f32 / total as f32;
    if ratio > 0.78 {
        ScriptDetection {
            language: "rus".to_string(),
            confidence: ratio,
        }
    } else if ratio < 0.22 {
        ScriptDetection {
            language: "eng".to_string(),
            confidence: 1.0 - ratio,
        }
    } else {
        ScriptDetection {
            language: DEFAULT_LANGUAGE.to_string(),
            confidence: 0.6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyrillic_text_detected_as_russian() {
        let detected = detect_script("Счёт на оплату номер сто двадцать три");
        assert_eq!(detected.language, "rus");
        assert!(detected.confidence > 0.78);
    }

    #[test]
    fn test_latin_text_detected_as_english() {
        let detected = detect_script("Invoice number one hundred twenty three");
        assert_eq!(detected.language, "eng");
        assert!(detected.confidence > 0.78);
    }

    #[test]
    fn test_mixed_text_keeps_combined_pack() {
        let detected = detect_script("Invoice Счёт Invoice Счёт payment оплата");
        assert_eq!(detected.language, DEFAULT_LANGUAGE);
        assert_eq!(detected.confidence, 0.6);
    }

    #[test]
    fn test_empty_text_is_inconclusive() {
        let detected = detect_script("12345 -- 67.89");
        assert_eq!(detected.language, DEFAULT_LANGUAGE);
        assert_eq!(detected.confidence, 0.2);
    }

    #[test]
    fn test_normalize_language_defaults_empty() {
        assert_eq!(normalize_language(""), DEFAULT_LANGUAGE);
        assert_eq!(normalize_language("  "), DEFAULT_LANGUAGE);
        assert_eq!(normalize_language("deu"), "deu");
    }
}
