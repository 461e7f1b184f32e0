//! Tiered field resolution.
//!
//! Each requested field runs through an ordered list of strategies:
//! the shared LLM batch result first, then regex patterns over the raw
//! text, then a per-field LLM guess. The first strategy that produces a
//! value wins; a field nothing could resolve comes back empty with zero
//! confidence. Currency detection runs independently and is merged in
//! at the end.

use crate::fields::currency::{detect_currency, CurrencyCandidate};
use crate::fields::patterns::match_field;
use crate::fields::prompts;
use crate::fields::types::{Candidate, FieldCandidate, FieldMap, Provenance};
use crate::llm::json::{extract_json_array, extract_json_object};
use crate::llm::{LlmOrchestrator, ResponseType};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Fields requested when the caller supplies none.
pub const DEFAULT_FIELDS: [&str; 6] = [
    "дата",
    "время",
    "сумма",
    "валюта",
    "номер документа",
    "организация",
];

const REGEX_CONFIDENCE: f32 = 0.5;
const GUESS_DEFAULT_CONFIDENCE: f32 = 0.25;
const BATCH_DEFAULT_CONFIDENCE: f32 = 0.5;
const MIN_SUGGEST_TEXT_LEN: usize = 20;
const DESCRIBE_MAX_LINES: usize = 6;

/// Shared inputs available to every strategy during one resolution.
pub struct ResolutionContext<'a> {
    pub text: &'a str,
    /// Parsed batch extraction result, field name to raw entry
    pub batch: &'a Map<String, Value>,
}

/// One tier in the resolution chain.
///
/// `Ok(None)` means "not mine, try the next tier"; `Err` is recorded as
/// a warning on the overall result and resolution continues.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn try_resolve(
        &self,
        field: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Option<FieldCandidate>, String>;
}

/// Reads the shared batch extraction result.
struct BatchTier;

#[async_trait]
impl ResolutionStrategy for BatchTier {
    fn name(&self) -> &str {
        "llm-batch"
    }

    async fn try_resolve(
        &self,
        field: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Option<FieldCandidate>, String> {
        Ok(ctx
            .batch
            .get(field)
            .and_then(|entry| field_from_entry(entry, BATCH_DEFAULT_CONFIDENCE))
            .map(|mut resolved| {
                resolved.inferred = false;
                resolved.provenance = Provenance::LlmBatch;
                resolved
            }))
    }
}

/// Pattern matching over the raw document text.
struct RegexTier;

#[async_trait]
impl ResolutionStrategy for RegexTier {
    fn name(&self) -> &str {
        "regex"
    }

    async fn try_resolve(
        &self,
        field: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Option<FieldCandidate>, String> {
        Ok(match_field(field, ctx.text).map(|value| FieldCandidate {
            value,
            confidence: REGEX_CONFIDENCE,
            candidates: Vec::new(),
            inferred: false,
            provenance: Provenance::Regex,
        }))
    }
}

/// Last-resort single-field LLM guess, always marked inferred.
struct GuessTier {
    orchestrator: Arc<LlmOrchestrator>,
}

#[async_trait]
impl ResolutionStrategy for GuessTier {
    fn name(&self) -> &str {
        "llm-guess"
    }

    async fn try_resolve(
        &self,
        field: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Option<FieldCandidate>, String> {
        let fields = vec![field.to_string()];
        let prompt = prompts::batch_extraction(&fields, ctx.text);
        let raw = self
            .orchestrator
            .query(&prompt, ResponseType::Json, &fields)
            .await;
        if raw.trim().is_empty() {
            return Err(format!("guess for \"{}\" produced no response", field));
        }

        let parsed = parse_batch_result(&raw);
        Ok(parsed
            .get(field)
            .and_then(|entry| field_from_entry(entry, GUESS_DEFAULT_CONFIDENCE))
            .map(|mut resolved| {
                resolved.inferred = true;
                resolved.provenance = Provenance::LlmGuess;
                resolved
            }))
    }
}

/// Outcome of resolving one document's fields.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub fields: FieldMap,
    /// Fields actually resolved, including auto-appended ones
    pub fields_used: Vec<String>,
    pub currency: Vec<CurrencyCandidate>,
    /// First LLM-side problem encountered, if any
    pub warning: Option<String>,
}

pub struct FieldResolver {
    orchestrator: Arc<LlmOrchestrator>,
    strategies: Vec<Arc<dyn ResolutionStrategy>>,
}

impl FieldResolver {
    pub fn new(orchestrator: Arc<LlmOrchestrator>) -> Self {
        let strategies: Vec<Arc<dyn ResolutionStrategy>> = vec![
            Arc::new(BatchTier),
            Arc::new(RegexTier),
            Arc::new(GuessTier {
                orchestrator: Arc::clone(&orchestrator),
            }),
        ];
        Self {
            orchestrator,
            strategies,
        }
    }

    /// Override the default tier order.
    pub fn with_strategies(mut self, strategies: Vec<Arc<dyn ResolutionStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Resolve the requested fields against recognized text.
    ///
    /// An empty request runs in auto mode: the LLM layer proposes field
    /// names first, and the default set covers for an empty or malformed
    /// proposal. When currency mentions are found and no field covers
    /// currency, a "валюта" field is appended.
    pub async fn resolve(&self, requested: &[String], text: &str) -> Resolution {
        let mut fields_used: Vec<String> = if requested.is_empty() {
            let suggested = self.suggest_fields(text).await;
            if suggested.is_empty() {
                DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
            } else {
                suggested
            }
        } else {
            requested.to_vec()
        };

        let currency = detect_currency(text);
        if !currency.is_empty() && !fields_used.iter().any(|f| f.to_lowercase().contains("валют")) {
            fields_used.push("валюта".to_string());
        }

        let mut warning: Option<String> = None;

        let batch_prompt = prompts::batch_extraction(&fields_used, text);
        let batch_raw = self
            .orchestrator
            .query(&batch_prompt, ResponseType::Json, &fields_used)
            .await;
        let batch = match try_parse_batch_result(&batch_raw) {
            Some(map) => map,
            None => {
                if !batch_raw.trim().is_empty() {
                    warning = Some("batch extraction returned unparsable output".to_string());
                }
                Map::new()
            }
        };

        let ctx = ResolutionContext { text, batch: &batch };

        let mut fields = FieldMap::new();
        for field in &fields_used {
            let mut resolved: Option<FieldCandidate> = None;
            for strategy in &self.strategies {
                match strategy.try_resolve(field, &ctx).await {
                    Ok(Some(candidate)) => {
                        resolved = Some(candidate);
                        break;
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!("[Resolver] {} tier failed for '{}': {}", strategy.name(), field, e);
                        if warning.is_none() {
                            warning = Some(e);
                        }
                    }
                }
            }
            fields.insert(field.clone(), resolved.unwrap_or_else(FieldCandidate::empty));
        }

        merge_currency(&mut fields, &fields_used, &currency);

        Resolution {
            fields,
            fields_used,
            currency,
            warning,
        }
    }

    /// Ask the LLM layer for field names worth extracting from text.
    /// Very short texts return nothing.
    pub async fn suggest_fields(&self, text: &str) -> Vec<String> {
        if text.trim().chars().count() < MIN_SUGGEST_TEXT_LEN {
            return Vec::new();
        }

        let prompt = prompts::suggest_fields(text, prompts::MAX_SUGGESTED_FIELDS);
        let raw = self.orchestrator.query(&prompt, ResponseType::Array, &[]).await;

        let Ok(json) = extract_json_array(&raw) else {
            return Vec::new();
        };
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&json) else {
            return Vec::new();
        };

        items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => {
                    let trimmed = s.trim().to_string();
                    (!trimmed.is_empty()).then_some(trimmed)
                }
                _ => None,
            })
            .take(prompts::MAX_SUGGESTED_FIELDS)
            .collect()
    }

    /// Short prose description of one field, tailored to the document
    /// context. Failures come back as an empty string.
    pub async fn describe_field(&self, field: &str, context: &str) -> String {
        let prompt = prompts::describe_field(field, context);
        let raw = self
            .orchestrator
            .query_with_temperature(&prompt, 0.3, ResponseType::Text, &[])
            .await;

        raw.lines()
            .take(DESCRIBE_MAX_LINES)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

/// Parse a raw batch response into field entries. Unparsable input
/// yields an empty map rather than an error.
fn parse_batch_result(raw: &str) -> Map<String, Value> {
    try_parse_batch_result(raw).unwrap_or_default()
}

fn try_parse_batch_result(raw: &str) -> Option<Map<String, Value>> {
    let json = extract_json_object(raw).ok()?;
    match serde_json::from_str::<Value>(&json) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Build a FieldCandidate from one raw batch entry. Entries without a
/// non-empty "value" string are discarded.
fn field_from_entry(entry: &Value, default_confidence: f32) -> Option<FieldCandidate> {
    let object = entry.as_object()?;
    let value = object.get("value")?.as_str()?.trim().to_string();
    if value.is_empty() {
        return None;
    }

    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0) as f32)
        .unwrap_or(default_confidence);

    let candidates = object
        .get("candidates")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(candidate_from_value).collect())
        .unwrap_or_default();

    Some(FieldCandidate {
        value,
        confidence,
        candidates,
        inferred: object.get("inferred").and_then(Value::as_bool).unwrap_or(false),
        provenance: Provenance::LlmBatch,
    })
}

fn candidate_from_value(value: &Value) -> Option<Candidate> {
    let object = value.as_object()?;
    let text = object.get("text")?.as_str()?.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0) as f32)
        .unwrap_or(0.5);

    let bbox = object.get("bbox").and_then(Value::as_array).and_then(|b| {
        if b.len() == 4 {
            let mut out = [0.0f32; 4];
            for (i, v) in b.iter().enumerate() {
                out[i] = v.as_f64()? as f32;
            }
            Some(out)
        } else {
            None
        }
    });

    Some(Candidate {
        text,
        confidence,
        bbox,
        source: object
            .get("source")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Fold detected currency into the field map: an empty or missing
/// currency field takes the top candidate, a resolved one just gains
/// the candidate list.
fn merge_currency(fields: &mut FieldMap, fields_used: &[String], currency: &[CurrencyCandidate]) {
    let Some(primary) = currency.first() else {
        return;
    };

    let key = fields_used
        .iter()
        .find(|f| f.to_lowercase().contains("валют"))
        .cloned()
        .unwrap_or_else(|| "валюта".to_string());

    let as_candidates: Vec<Candidate> = currency
        .iter()
        .map(|c| Candidate {
            text: c.code.clone(),
            confidence: c.score,
            bbox: None,
            source: Some(c.source.clone()),
        })
        .collect();

    match fields.get_mut(&key) {
        Some(entry) if !entry.value.is_empty() => {
            entry.candidates = as_candidates;
        }
        _ => {
            fields.insert(
                key,
                FieldCandidate {
                    value: primary.code.clone(),
                    confidence: primary.score,
                    candidates: as_candidates,
                    inferred: false,
                    provenance: Provenance::Currency,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmProvider;
    use std::sync::Mutex;

    /// Provider scripted with a closure over the prompt.
    struct FnProvider {
        replies: Mutex<Box<dyn FnMut(&str) -> Result<String, String> + Send>>,
    }

    impl FnProvider {
        fn new(f: impl FnMut(&str) -> Result<String, String> + Send + 'static) -> Arc<dyn LlmProvider> {
            Arc::new(Self {
                replies: Mutex::new(Box::new(f)),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for FnProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String, String> {
            let mut f = self.replies.lock().unwrap();
            f(prompt)
        }
    }

    fn resolver_with(provider: Arc<dyn LlmProvider>) -> FieldResolver {
        FieldResolver::new(Arc::new(LlmOrchestrator::new(vec![provider])))
    }

    fn failing_resolver() -> FieldResolver {
        resolver_with(FnProvider::new(|_| Err("offline".to_string())))
    }

    #[tokio::test]
    async fn test_batch_value_wins_first_tier() {
        let provider = FnProvider::new(|_| {
            Ok(r#"{"дата": {"value": "12.05.2024", "confidence": 0.9, "candidates": [], "inferred": false}}"#
                .to_string())
        });
        let resolver = resolver_with(provider);

        let resolution = resolver
            .resolve(&["дата".to_string()], "совсем другой текст")
            .await;
        let field = resolution.fields.get("дата").unwrap();
        assert_eq!(field.value, "12.05.2024");
        assert_eq!(field.provenance, Provenance::LlmBatch);
        assert!(!field.inferred);
    }

    #[tokio::test]
    async fn test_regex_tier_fills_batch_miss() {
        // Batch answers for another field only, regex recovers the date.
        let provider = FnProvider::new(|_| {
            Ok(r#"{"сумма": {"value": "1500", "confidence": 0.8, "candidates": [], "inferred": false}}"#
                .to_string())
        });
        let resolver = resolver_with(provider);

        let resolution = resolver
            .resolve(
                &["дата".to_string(), "сумма".to_string()],
                "Дата: 12.05.2024\nИтого 1500",
            )
            .await;

        let date = resolution.fields.get("дата").unwrap();
        assert_eq!(date.value, "12.05.2024");
        assert_eq!(date.provenance, Provenance::Regex);
        assert_eq!(date.confidence, REGEX_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_guess_tier_marks_inferred() {
        // First call (batch) returns nothing useful, second call (single
        // field guess) produces a value without a confidence number.
        let mut calls = 0;
        let provider = FnProvider::new(move |_| {
            calls += 1;
            if calls == 1 {
                Ok("{}".to_string())
            } else {
                Ok(r#"{"город": {"value": "Москва", "candidates": [], "inferred": true}}"#.to_string())
            }
        });
        let resolver = resolver_with(provider);

        let resolution = resolver
            .resolve(&["город".to_string()], "текст без упоминания места")
            .await;

        let city = resolution.fields.get("город").unwrap();
        assert_eq!(city.value, "Москва");
        assert!(city.inferred);
        assert_eq!(city.confidence, GUESS_DEFAULT_CONFIDENCE);
        assert_eq!(city.provenance, Provenance::LlmGuess);
    }

    #[tokio::test]
    async fn test_unresolvable_field_comes_back_empty() {
        let resolver = failing_resolver();
        let resolution = resolver
            .resolve(&["номер вагона".to_string()], "короткий текст")
            .await;

        let field = resolution.fields.get("номер вагона").unwrap();
        assert_eq!(field.value, "");
        assert_eq!(field.confidence, 0.0);
        assert_eq!(field.provenance, Provenance::Empty);
    }

    #[tokio::test]
    async fn test_empty_request_falls_back_to_default_fields() {
        // Text below the suggestion threshold and a dead provider: auto
        // mode must still produce the default field set.
        let resolver = failing_resolver();
        let resolution = resolver.resolve(&[], "произвольный текст").await;
        assert_eq!(resolution.fields_used.len(), DEFAULT_FIELDS.len());
        assert!(resolution.fields.contains_key("дата"));
        assert!(resolution.fields.contains_key("организация"));
    }

    #[tokio::test]
    async fn test_empty_request_adopts_suggested_fields() {
        let provider = FnProvider::new(|prompt| {
            if prompt.contains("structure detector") {
                Ok(r#"["номер счёта", "дата"]"#.to_string())
            } else {
                Ok("{}".to_string())
            }
        });
        let resolver = resolver_with(provider);

        let resolution = resolver
            .resolve(&[], "Счёт на оплату № 77 от 12.05.2024 выставлен поставщиком")
            .await;

        assert_eq!(
            resolution.fields_used,
            vec!["номер счёта".to_string(), "дата".to_string()]
        );
        assert_eq!(resolution.fields.get("дата").unwrap().value, "12.05.2024");
    }

    #[tokio::test]
    async fn test_currency_field_appended_and_synthesized() {
        let resolver = failing_resolver();
        let resolution = resolver
            .resolve(&["дата".to_string()], "Оплачено 1500 руб. 12.05.2024")
            .await;

        assert!(resolution.fields_used.contains(&"валюта".to_string()));
        let currency = resolution.fields.get("валюта").unwrap();
        assert_eq!(currency.value, "RUB");
        assert_eq!(currency.provenance, Provenance::Currency);
        assert!(!currency.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_currency_not_appended_when_field_covers_it() {
        let provider = FnProvider::new(|_| {
            Ok(r#"{"валюта документа": {"value": "RUB", "confidence": 0.9, "candidates": [], "inferred": false}}"#
                .to_string())
        });
        let resolver = resolver_with(provider);

        let resolution = resolver
            .resolve(&["валюта документа".to_string()], "Сумма 1500 руб")
            .await;

        assert_eq!(resolution.fields_used, vec!["валюта документа".to_string()]);
        let field = resolution.fields.get("валюта документа").unwrap();
        assert_eq!(field.value, "RUB");
        // Resolved field keeps its value but gains detection candidates
        assert!(!field.candidates.is_empty());
        assert_eq!(field.provenance, Provenance::LlmBatch);
    }

    #[tokio::test]
    async fn test_resolution_order_matches_request() {
        let resolver = failing_resolver();
        let resolution = resolver
            .resolve(
                &["организация".to_string(), "дата".to_string()],
                "текст",
            )
            .await;
        let keys: Vec<&str> = resolution.fields.keys().collect();
        assert_eq!(keys, vec!["организация", "дата"]);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent_for_deterministic_providers() {
        // Same input and a provider that always answers the same way:
        // the second resolution must be byte-for-byte the first.
        let provider = FnProvider::new(|_| {
            Ok(r#"{"дата": {"value": "12.05.2024", "confidence": 0.9, "candidates": [], "inferred": false}}"#
                .to_string())
        });
        let resolver = resolver_with(provider);

        let requested = vec!["дата".to_string(), "сумма".to_string()];
        let text = "Дата: 12.05.2024\nИтого: 1500 руб";

        let first = resolver.resolve(&requested, text).await;
        let second = resolver.resolve(&requested, text).await;

        assert_eq!(first.fields, second.fields);
        assert_eq!(first.fields_used, second.fields_used);
        assert_eq!(first.currency, second.currency);
    }

    #[tokio::test]
    async fn test_suggest_fields_parses_array() {
        let provider =
            FnProvider::new(|_| Ok(r#"Вот поля: ["дата", "сумма", "", "организация"]"#.to_string()));
        let resolver = resolver_with(provider);

        let fields = resolver
            .suggest_fields("Достаточно длинный текст документа для анализа")
            .await;
        assert_eq!(fields, vec!["дата", "сумма", "организация"]);
    }

    #[tokio::test]
    async fn test_suggest_fields_skips_short_text() {
        let provider = FnProvider::new(|_| panic!("must not be called"));
        let resolver = resolver_with(provider);
        assert!(resolver.suggest_fields("коротко").await.is_empty());
    }

    #[tokio::test]
    async fn test_describe_field_joins_lines() {
        let provider = FnProvider::new(|_| {
            Ok("Поле содержит дату.\nОбычно в формате ДД.ММ.ГГГГ.".to_string())
        });
        let resolver = resolver_with(provider);

        let description = resolver.describe_field("дата", "").await;
        assert_eq!(description, "Поле содержит дату. Обычно в формате ДД.ММ.ГГГГ.");
    }

    #[tokio::test]
    async fn test_describe_field_failure_is_empty() {
        let resolver = failing_resolver();
        assert_eq!(resolver.describe_field("дата", "").await, "");
    }
}
