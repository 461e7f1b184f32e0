//! Uniform interface to one LLM backend.
//!
//! Each provider turns a prompt into completion text, independent of the
//! others. Auth and endpoints come from configuration; the orchestrator
//! treats every provider failure (timeout, non-2xx, decode) as a
//! zero-scored response, so `complete` reports errors as plain strings.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Shared HTTP client for all provider calls.
///
/// Connection pooling and TLS session reuse matter here because one
/// recognition request can fan out into many provider calls.
static LLM_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create LLM HTTP client")
});

/// Get the shared provider HTTP client.
#[inline]
pub(crate) fn llm_client() -> &'static Client {
    &LLM_CLIENT
}

/// Default per-call timeout applied by providers.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(45);

/// Connection settings for one provider instance.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Full endpoint URL
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Bearer token; empty for unauthenticated local backends
    pub api_key: String,
    /// Bound on one completion call
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: String::new(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One external LLM backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable identifier used in logs and tie-breaking diagnostics.
    fn name(&self) -> &str;

    /// Complete a prompt. Must finish (or fail) within the configured
    /// timeout; errors never carry provider-internal panics.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, String>;
}
