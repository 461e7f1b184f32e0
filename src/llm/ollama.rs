//! Local Ollama provider (`/api/generate`).

use crate::llm::provider::{llm_client, LlmProvider, ProviderConfig};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const OLLAMA_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const OLLAMA_DEFAULT_MODEL: &str = "mistral";

pub struct OllamaProvider {
    config: ProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, String> {
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": temperature }
        });

        let request = llm_client()
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| "ollama request timed out".to_string())?
            .map_err(|e| format!("ollama request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("ollama API error ({}): {}", status, text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| format!("failed to parse ollama response: {}", e))?;

        Ok(parsed.response.unwrap_or_default().trim().to_string())
    }
}
