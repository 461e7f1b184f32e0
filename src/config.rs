//! Runtime configuration.
//!
//! Everything is carried in an explicit [`RecognitionConfig`] value that
//! callers construct once and pass down; nothing reads the environment
//! after startup. [`RecognitionConfig::from_env`] builds the standard
//! setup from environment variables (a `.env` file is honored).

use crate::llm::{
    GroqProvider, LlmProvider, OllamaProvider, OpenAiProvider, ProviderConfig,
    DEFAULT_PROVIDER_TIMEOUT, GROQ_DEFAULT_MODEL, GROQ_ENDPOINT, OLLAMA_DEFAULT_MODEL,
    OLLAMA_ENDPOINT, OPENAI_DEFAULT_MODEL, OPENAI_ENDPOINT,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// One configured LLM backend. Order in the provider list decides
/// tie-breaking during orchestration.
#[derive(Debug, Clone)]
pub enum ProviderEntry {
    Groq(ProviderConfig),
    OpenAi(ProviderConfig),
    Ollama(ProviderConfig),
}

#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// OCR result cache location
    pub cache_dir: PathBuf,
    /// Recognition history location
    pub data_dir: PathBuf,
    pub providers: Vec<ProviderEntry>,
    /// Per-call bound applied to providers built from this config
    pub provider_timeout: Duration,
}

impl RecognitionConfig {
    /// Build configuration from environment variables, loading a `.env`
    /// file first when one exists.
    ///
    /// Providers are added in fixed priority order: Groq when
    /// `GROQ_API_KEY` is set, OpenAI when `OPENAI_API_KEY` is set, and
    /// Ollama always (it needs no credentials).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut providers = Vec::new();

        if let Ok(api_key) = std::env::var("GROQ_API_KEY") {
            if !api_key.is_empty() {
                let endpoint = env_or("GROQ_ENDPOINT", GROQ_ENDPOINT);
                let model = env_or("GROQ_MODEL", GROQ_DEFAULT_MODEL);
                providers.push(ProviderEntry::Groq(
                    ProviderConfig::new(endpoint, model).with_api_key(api_key),
                ));
            }
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                let endpoint = env_or("OPENAI_ENDPOINT", OPENAI_ENDPOINT);
                let model = env_or("OPENAI_MODEL", OPENAI_DEFAULT_MODEL);
                providers.push(ProviderEntry::OpenAi(
                    ProviderConfig::new(endpoint, model).with_api_key(api_key),
                ));
            }
        }

        let ollama_endpoint = env_or("OLLAMA_URL", OLLAMA_ENDPOINT);
        let ollama_model = env_or("OLLAMA_MODEL", OLLAMA_DEFAULT_MODEL);
        providers.push(ProviderEntry::Ollama(ProviderConfig::new(
            ollama_endpoint,
            ollama_model,
        )));

        let cache_dir = std::env::var("DOCUFIELD_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_base(dirs::cache_dir));
        let data_dir = std::env::var("DOCUFIELD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_base(dirs::data_dir));

        Self {
            cache_dir,
            data_dir,
            providers,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Instantiate provider clients in configured order.
    pub fn build_providers(&self) -> Vec<Arc<dyn LlmProvider>> {
        self.providers
            .iter()
            .map(|entry| -> Arc<dyn LlmProvider> {
                match entry {
                    ProviderEntry::Groq(c) => {
                        Arc::new(GroqProvider::new(c.clone().with_timeout(self.provider_timeout)))
                    }
                    ProviderEntry::OpenAi(c) => {
                        Arc::new(OpenAiProvider::new(c.clone().with_timeout(self.provider_timeout)))
                    }
                    ProviderEntry::Ollama(c) => {
                        Arc::new(OllamaProvider::new(c.clone().with_timeout(self.provider_timeout)))
                    }
                }
            })
            .collect()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn default_base(base: fn() -> Option<PathBuf>) -> PathBuf {
    base()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docufield")
}
