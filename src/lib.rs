//! Document recognition and field extraction.
//!
//! Takes a PDF or image, runs OCR with content-addressed caching and
//! language auto-correction, then resolves caller-requested fields
//! through a tiered chain: a batched LLM extraction raced across
//! providers, regex patterns over the raw text, and a per-field LLM
//! guess as a last resort. Currency mentions are detected separately
//! and merged into the result.
//!
//! [`DocumentRecognizer`] is the entry point; build one from a
//! [`RecognitionConfig`] and feed it [`RecognitionRequest`]s.

pub mod config;
pub mod error;
pub mod fields;
pub mod history;
pub mod llm;
pub mod ocr;
pub mod pipeline;

pub use config::RecognitionConfig;
pub use error::RecognitionError;
pub use fields::{FieldCandidate, FieldMap, FieldResolver};
pub use ocr::{OcrCoordinator, OcrResult};
pub use pipeline::{DocumentRecognizer, RecognitionOutcome, RecognitionRequest};
