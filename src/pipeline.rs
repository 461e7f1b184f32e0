//! End-to-end document recognition.
//!
//! Ties the OCR coordinator, the field resolver, and the history log
//! together behind one entry point. A request names a file and the
//! fields to extract; the outcome carries resolved fields, the raw OCR
//! result, and metadata about how the run went.

use crate::config::RecognitionConfig;
use crate::error::RecognitionError;
use crate::fields::{CurrencyCandidate, FieldCandidate, FieldMap, FieldResolver};
use crate::history::HistoryLog;
use crate::llm::LlmOrchestrator;
use crate::ocr::{OcrCache, OcrCoordinator, OcrResult, PopplerRasterizer, TesseractEngine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How often the standard pipeline sweeps expired OCR cache entries.
const CACHE_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// One recognition request.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub path: PathBuf,
    /// Fields to extract; empty means the default set
    pub fields: Vec<String>,
    /// OCR language pack; `None` enables auto-detection
    pub language: Option<String>,
    pub use_cache: bool,
}

impl RecognitionRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fields: Vec::new(),
            language: None,
            use_cache: true,
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

/// Metadata describing how a recognition ran.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionMeta {
    pub file_path: PathBuf,
    /// Language pack the kept OCR pass ran with
    pub language: String,
    pub detected_language: String,
    pub language_confidence: f32,
    pub ocr_confidence: f32,
    pub page_count: u32,
    pub from_cache: bool,
    /// True when no language was pinned by the caller
    pub auto_mode: bool,
    pub fields_used: Vec<String>,
    pub currency_candidates: Vec<CurrencyCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Full outcome of one recognition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionOutcome {
    pub fields: FieldMap,
    pub ocr: OcrResult,
    pub meta: RecognitionMeta,
}

pub struct DocumentRecognizer {
    coordinator: OcrCoordinator,
    resolver: FieldResolver,
    history: HistoryLog,
    maintenance: Option<tokio::task::JoinHandle<()>>,
}

impl DocumentRecognizer {
    /// Build the standard pipeline from configuration: Poppler
    /// rasterization, Tesseract OCR, and the configured provider set.
    ///
    /// When called inside a tokio runtime this also starts the periodic
    /// cache eviction sweep, stopped again when the recognizer drops.
    pub fn new(config: &RecognitionConfig) -> Self {
        let cache = Arc::new(OcrCache::new(config.cache_dir.clone()));

        let maintenance = match tokio::runtime::Handle::try_current() {
            Ok(_) => Some(cache.spawn_maintenance(CACHE_MAINTENANCE_INTERVAL)),
            Err(_) => {
                tracing::debug!("[Pipeline] No runtime at construction, cache sweep not started");
                None
            }
        };

        let coordinator = OcrCoordinator::new(
            Arc::new(PopplerRasterizer::new()),
            Arc::new(TesseractEngine::new()),
            cache,
        );
        let orchestrator = Arc::new(LlmOrchestrator::new(config.build_providers()));
        let resolver = FieldResolver::new(orchestrator);
        let history = HistoryLog::new(&config.data_dir);
        Self {
            coordinator,
            resolver,
            history,
            maintenance,
        }
    }

    /// Assemble a pipeline from explicit parts. Cache maintenance is the
    /// caller's concern here; see [`OcrCache::spawn_maintenance`].
    pub fn with_parts(
        coordinator: OcrCoordinator,
        resolver: FieldResolver,
        history: HistoryLog,
    ) -> Self {
        Self {
            coordinator,
            resolver,
            history,
            maintenance: None,
        }
    }

    /// Recognize a document and resolve its fields.
    pub async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionOutcome, RecognitionError> {
        let auto_mode = request.language.is_none();
        let ocr = self
            .coordinator
            .run_auto(&request.path, request.language.as_deref(), request.use_cache)
            .await?;

        // Nothing recognized means nothing to resolve; fields come back
        // present but empty so callers see a uniform shape
        let (fields, fields_used, currency, llm_error) = if ocr.result.text.trim().is_empty() {
            tracing::info!("[Pipeline] No text recognized in {}", request.path.display());
            let fields_used = effective_fields(&request.fields);
            let mut fields = FieldMap::new();
            for field in &fields_used {
                fields.insert(field.clone(), FieldCandidate::empty());
            }
            (fields, fields_used, Vec::new(), None)
        } else {
            let resolution = self.resolver.resolve(&request.fields, &ocr.result.text).await;
            (
                resolution.fields,
                resolution.fields_used,
                resolution.currency,
                resolution.warning,
            )
        };

        self.history
            .record(&request.path, &fields_used, &ocr.result.text, &fields)
            .await;

        let meta = RecognitionMeta {
            file_path: request.path.clone(),
            language: ocr.language,
            detected_language: ocr.detection.language,
            language_confidence: ocr.detection.confidence,
            ocr_confidence: ocr.result.avg_confidence,
            page_count: ocr.result.page_count,
            from_cache: ocr.result.from_cache,
            auto_mode,
            fields_used,
            currency_candidates: currency,
            llm_error,
            timestamp: Utc::now(),
        };

        Ok(RecognitionOutcome {
            fields,
            ocr: ocr.result,
            meta,
        })
    }

    /// Suggest extractable field names for a document's text.
    pub async fn suggest_fields(&self, text: &str) -> Vec<String> {
        self.resolver.suggest_fields(text).await
    }

    /// Describe what a field usually contains, tailored to context.
    pub async fn describe_field(&self, field: &str, context: &str) -> String {
        self.resolver.describe_field(field, context).await
    }

    /// Recognition history, oldest first.
    pub async fn history(&self) -> Vec<serde_json::Value> {
        self.history.load().await
    }
}

impl Drop for DocumentRecognizer {
    fn drop(&mut self) {
        if let Some(handle) = self.maintenance.take() {
            handle.abort();
        }
    }
}

fn effective_fields(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        crate::fields::DEFAULT_FIELDS
            .iter()
            .map(|f| f.to_string())
            .collect()
    } else {
        requested.to_vec()
    }
}
