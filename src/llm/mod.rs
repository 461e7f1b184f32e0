//! Multi-provider LLM layer: provider clients, response scoring, and
//! the race-and-score orchestrator.

pub mod groq;
pub mod json;
pub mod ollama;
pub mod openai;
pub mod orchestrator;
pub mod provider;
pub mod score;

pub use groq::{GroqProvider, GROQ_DEFAULT_MODEL, GROQ_ENDPOINT};
pub use ollama::{OllamaProvider, OLLAMA_DEFAULT_MODEL, OLLAMA_ENDPOINT};
pub use openai::{OpenAiProvider, OPENAI_DEFAULT_MODEL, OPENAI_ENDPOINT};
pub use orchestrator::{LlmOrchestrator, ProviderResponse};
pub use provider::{LlmProvider, ProviderConfig, DEFAULT_PROVIDER_TIMEOUT};
pub use score::{score_response, ResponseType};
