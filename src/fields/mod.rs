//! Field extraction: tiered resolution, currency detection, and the
//! prompt/pattern toolkit behind them.

pub mod currency;
pub mod patterns;
pub mod prompts;
pub mod resolver;
pub mod types;

pub use currency::{detect_currency, CurrencyCandidate};
pub use resolver::{FieldResolver, Resolution, ResolutionStrategy, DEFAULT_FIELDS};
pub use types::{Candidate, FieldCandidate, FieldMap, Provenance};
