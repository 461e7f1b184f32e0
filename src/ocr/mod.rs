//! Document OCR pipeline: rasterization, recognition, caching and
//! per-document aggregation.

pub mod cache;
pub mod coordinator;
pub mod engine;
pub mod language;
pub mod preprocess;
pub mod rasterizer;
pub mod types;

pub use cache::{CacheEntry, OcrCache, CACHE_TTL};
pub use coordinator::{AutoOcr, OcrCoordinator};
pub use engine::{OcrEngine, RecognizedPage, RecognizedWord, TesseractEngine};
pub use language::{detect_script, ScriptDetection, DEFAULT_LANGUAGE, SUPPORTED_LANGUAGES};
pub use rasterizer::{PageRasterizer, PopplerRasterizer};
#[cfg(feature = "pdfium")]
pub use rasterizer::PdfiumRasterizer;
pub use types::{OcrResult, RasterPage, WordBlock, PAGE_HEIGHT_OFFSET};
