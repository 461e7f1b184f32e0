//! Error taxonomy for the recognition pipeline.
//!
//! Only input errors and unrecoverable OCR failures surface to callers.
//! Everything else (cache I/O, individual LLM providers, per-field
//! extraction) degrades locally and is reported through lower confidence
//! values or warning side channels, never as an `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a recognition request.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The input file does not exist or is not readable.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The input file could not be decoded as a supported document format.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Rasterization failed for the whole document, including the
    /// page-1 fallback pass.
    #[error("rasterization failed: {0}")]
    Rasterize(String),

    /// The OCR engine failed in a way no fallback could recover from.
    #[error("ocr failed: {0}")]
    Ocr(String),
}
