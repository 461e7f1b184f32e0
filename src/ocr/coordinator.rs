//! Per-document OCR coordination.
//!
//! For one file this determines the page count, rasterizes and OCRs each
//! page, aggregates everything into a single [`OcrResult`] in ascending
//! page order, and consults the result cache on both ends. A second pass
//! with a corrected language pack runs when script detection disagrees
//! with the language that was used and the caller did not pin one.

use crate::error::RecognitionError;
use crate::ocr::cache::OcrCache;
use crate::ocr::engine::{normalize_blocks, OcrEngine};
use crate::ocr::language::{detect_script, normalize_language, ScriptDetection};
use crate::ocr::preprocess::{downscale_for_ocr, preprocess_for_ocr};
use crate::ocr::rasterizer::PageRasterizer;
use crate::ocr::types::{OcrResult, RasterPage, WordBlock};
use std::path::Path;
use std::sync::Arc;

/// Confidence assigned when a document produces pages but no usable
/// per-page confidence (guards the divide-by-zero case).
const FALLBACK_CONFIDENCE: f32 = 0.8;

/// Confidence assigned to synthesized word blocks.
const SYNTHETIC_CONFIDENCE: f32 = 0.5;

/// A language rerun is kept only when its confidence is not worse than
/// the original by more than this margin.
const RERUN_TOLERANCE: f32 = 0.05;

/// OCR output together with the language that actually produced it.
pub struct AutoOcr {
    pub result: OcrResult,
    pub detection: ScriptDetection,
    /// Language tag the kept pass ran with
    pub language: String,
}

pub struct OcrCoordinator {
    rasterizer: Arc<dyn PageRasterizer>,
    engine: Arc<dyn OcrEngine>,
    cache: Arc<OcrCache>,
}

impl OcrCoordinator {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        engine: Arc<dyn OcrEngine>,
        cache: Arc<OcrCache>,
    ) -> Self {
        Self {
            rasterizer,
            engine,
            cache,
        }
    }

    /// Run OCR over a whole document with a fixed language.
    pub async fn run(
        &self,
        path: &Path,
        language: &str,
        use_cache: bool,
    ) -> Result<OcrResult, RecognitionError> {
        if !path.exists() {
            return Err(RecognitionError::FileNotFound(path.to_path_buf()));
        }

        let language = normalize_language(language);

        // Fingerprinting hashes file contents; keep it off the runtime
        if use_cache {
            let cache = Arc::clone(&self.cache);
            let lookup_path = path.to_path_buf();
            let lookup_language = language.clone();
            let hit =
                tokio::task::spawn_blocking(move || cache.get(&lookup_path, &lookup_language))
                    .await
                    .ok()
                    .flatten();
            if let Some(entry) = hit {
                tracing::debug!("[OCR] Cache hit for {}", path.display());
                return Ok(entry.into_result());
            }
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let mut result = if extension == "pdf" {
            self.process_pdf(path, &language).await?
        } else {
            self.process_image(path, &language).await?
        };

        // Downstream consumers require geometry even when the engine
        // returned text without it
        if result.blocks.is_empty() && !result.text.trim().is_empty() {
            result.blocks = synthesize_blocks(&result.text);
        }

        if use_cache {
            let cache = Arc::clone(&self.cache);
            let store_path = path.to_path_buf();
            let store_language = language.clone();
            let store_result = result.clone();
            let _ = tokio::task::spawn_blocking(move || {
                cache.put(&store_path, &store_language, &store_result)
            })
            .await;
        }

        Ok(result)
    }

    /// Run OCR with language auto-correction.
    ///
    /// `requested_language` of `None` means auto: the pass starts with the
    /// default pack, and if the dominant script of the output disagrees,
    /// the document is re-OCR'd with the detected language. The rerun is
    /// kept only when its confidence holds up within [`RERUN_TOLERANCE`].
    pub async fn run_auto(
        &self,
        path: &Path,
        requested_language: Option<&str>,
        use_cache: bool,
    ) -> Result<AutoOcr, RecognitionError> {
        let pinned = requested_language.map(normalize_language);
        let mut language = pinned
            .clone()
            .unwrap_or_else(|| normalize_language(""));

        let mut result = self.run(path, &language, use_cache).await?;
        let detection = detect_script(&result.text);

        if pinned.is_none() && detection.language != language {
            tracing::info!(
                "[OCR] Detected {} text after {} pass, retrying",
                detection.language,
                language
            );
            match self.run(path, &detection.language, use_cache).await {
                Ok(rerun) => {
                    if rerun.avg_confidence >= result.avg_confidence - RERUN_TOLERANCE {
                        result = rerun;
                        language = detection.language.clone();
                    }
                }
                Err(e) => {
                    tracing::warn!("[OCR] Language rerun failed, keeping original: {}", e);
                }
            }
        }

        Ok(AutoOcr {
            result,
            detection,
            language,
        })
    }

    async fn process_pdf(&self, path: &Path, language: &str) -> Result<OcrResult, RecognitionError> {
        match self.process_all_pages(path, language).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(
                    "[OCR] Multi-page pass failed for {}: {}, falling back to page 1",
                    path.display(),
                    e
                );
                self.process_first_page_only(path, language).await
            }
        }
    }

    async fn process_all_pages(
        &self,
        path: &Path,
        language: &str,
    ) -> Result<OcrResult, PageFailure> {
        let page_count = self
            .rasterizer
            .page_count(path)
            .await
            .map_err(PageFailure::Raster)?;
        tracing::info!(
            "[OCR] Processing {} pages of {}",
            page_count,
            path.display()
        );

        let mut texts: Vec<String> = Vec::with_capacity(page_count as usize);
        let mut blocks: Vec<WordBlock> = Vec::new();
        let mut total_confidence = 0.0f32;

        // Sequential ascending order keeps text and block aggregation
        // page-ordered by construction
        for page_no in 1..=page_count {
            let (text, page_blocks, confidence) = self.process_page(path, page_no, language).await?;
            tracing::debug!(
                "[OCR] Page {}/{}: {} blocks, {} chars",
                page_no,
                page_count,
                page_blocks.len(),
                text.len()
            );
            texts.push(text);
            blocks.extend(page_blocks);
            total_confidence += confidence;
        }

        Ok(assemble(texts, blocks, total_confidence, page_count))
    }

    async fn process_first_page_only(
        &self,
        path: &Path,
        language: &str,
    ) -> Result<OcrResult, RecognitionError> {
        match self.process_page(path, 1, language).await {
            Ok((text, blocks, confidence)) => Ok(assemble(vec![text], blocks, confidence, 1)),
            Err(page_err) => {
                // Last resort: embedded PDF text without any geometry
                tracing::warn!(
                    "[OCR] Page 1 fallback failed for {}: {}",
                    path.display(),
                    page_err
                );
                self.extract_embedded_text(path)
                    .await
                    .ok_or_else(|| page_err.into_error())
            }
        }
    }

    /// Degraded text-only path for PDFs with an embedded text layer when
    /// no raster backend works.
    async fn extract_embedded_text(&self, path: &Path) -> Option<OcrResult> {
        let path = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
            .await
            .ok()?
            .ok()?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return None;
        }

        tracing::info!("[OCR] Using embedded PDF text layer ({} chars)", text.len());
        Some(OcrResult {
            blocks: synthesize_blocks(&text),
            text,
            avg_confidence: SYNTHETIC_CONFIDENCE,
            page_count: 1,
            from_cache: false,
        })
    }

    async fn process_image(
        &self,
        path: &Path,
        language: &str,
    ) -> Result<OcrResult, RecognitionError> {
        let owned = path.to_path_buf();
        let image = tokio::task::spawn_blocking(move || image::open(&owned))
            .await
            .map_err(|e| RecognitionError::Ocr(format!("image decode task failed: {}", e)))?
            .map_err(|e| RecognitionError::UnsupportedFormat(e.to_string()))?;

        let page = RasterPage {
            page: 1,
            image: downscale_for_ocr(image),
        };

        let (text, blocks, confidence) = self
            .recognize_page(page, language)
            .await
            .map_err(RecognitionError::Ocr)?;
        Ok(assemble(vec![text], blocks, confidence, 1))
    }

    async fn process_page(
        &self,
        path: &Path,
        page_no: u32,
        language: &str,
    ) -> Result<(String, Vec<WordBlock>, f32), PageFailure> {
        let page = self
            .rasterizer
            .rasterize(path, page_no)
            .await
            .map_err(PageFailure::Raster)?;
        self.recognize_page(page, language)
            .await
            .map_err(PageFailure::Recognize)
    }

    /// Preprocess one raster page and run the engine on it. Returns
    /// (page text, normalized blocks, page confidence in [0, 1]).
    async fn recognize_page(
        &self,
        page: RasterPage,
        language: &str,
    ) -> Result<(String, Vec<WordBlock>, f32), String> {
        let page_no = page.page;
        let image = page.image;
        let processed = tokio::task::spawn_blocking(move || preprocess_for_ocr(&image))
            .await
            .map_err(|e| format!("preprocess task failed: {}", e))?;

        let page = RasterPage {
            page: page_no,
            image: processed,
        };
        let recognized = self.engine.recognize(&page, language).await?;

        let blocks = normalize_blocks(&recognized, page_no);
        let confidence = (recognized.confidence / 100.0).clamp(0.0, 1.0);
        Ok((recognized.text.trim().to_string(), blocks, confidence))
    }
}

/// Which stage lost a page; decides the error variant when every
/// fallback is exhausted.
enum PageFailure {
    Raster(String),
    Recognize(String),
}

impl PageFailure {
    fn into_error(self) -> RecognitionError {
        match self {
            PageFailure::Raster(e) => RecognitionError::Rasterize(e),
            PageFailure::Recognize(e) => RecognitionError::Ocr(e),
        }
    }
}

impl std::fmt::Display for PageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageFailure::Raster(e) => write!(f, "rasterization: {}", e),
            PageFailure::Recognize(e) => write!(f, "recognition: {}", e),
        }
    }
}

fn assemble(
    texts: Vec<String>,
    blocks: Vec<WordBlock>,
    total_confidence: f32,
    page_count: u32,
) -> OcrResult {
    let avg_confidence = if page_count > 0 {
        total_confidence / page_count as f32
    } else {
        FALLBACK_CONFIDENCE
    };

    OcrResult {
        text: texts.join("\n\n"),
        blocks,
        avg_confidence,
        page_count,
        from_cache: false,
    }
}

/// Lay text out on a synthetic grid when the engine produced no geometry.
fn synthesize_blocks(text: &str) -> Vec<WordBlock> {
    let mut blocks = Vec::new();
    let mut y = 0.0f32;

    for line in text.split('\n').filter(|l| !l.trim().is_empty()) {
        let mut x = 0.0f32;
        for word in line.split_whitespace() {
            let width = word.chars().count() as f32 * 15.0;
            blocks.push(WordBlock {
                text: word.to_string(),
                confidence: SYNTHETIC_CONFIDENCE,
                bbox: [x, y, width, 30.0],
                page: 1,
            });
            x += width + 10.0;
        }
        y += 40.0;
    }

    blocks
}
