//! Provider race-and-score orchestration.
//!
//! Every query fans out to all configured providers concurrently, scores
//! each completion against the expected response shape, and returns the
//! best text. Provider order in the configuration is significant: ties
//! and last-resort fallbacks resolve toward the earliest provider.

use crate::llm::provider::LlmProvider;
use crate::llm::score::{score_response, ResponseType};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;

/// One provider's outcome in a race, kept for selection and logging.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub provider: String,
    pub text: String,
    pub score: f64,
}

pub struct LlmOrchestrator {
    providers: Vec<Arc<dyn LlmProvider>>,
}

impl LlmOrchestrator {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Race all providers at temperature 0 and return the winning text.
    pub async fn query(
        &self,
        prompt: &str,
        response_type: ResponseType,
        expected_fields: &[String],
    ) -> String {
        self.query_with_temperature(prompt, 0.0, response_type, expected_fields)
            .await
    }

    /// Race all providers and return the winning text.
    ///
    /// Selection rules:
    /// - highest score wins, ties go to the earliest configured provider
    /// - if every score is zero, the first provider that returned any
    ///   non-empty text wins
    /// - if nothing came back at all, the result is an empty string
    pub async fn query_with_temperature(
        &self,
        prompt: &str,
        temperature: f32,
        response_type: ResponseType,
        expected_fields: &[String],
    ) -> String {
        let responses = self
            .race(prompt, temperature, response_type, expected_fields)
            .await;
        select_best(&responses)
            .map(|r| r.text.clone())
            .unwrap_or_default()
    }

    /// Run the race and return every provider's outcome, ordered by
    /// configured provider position. Failed providers appear with an
    /// empty text and a zero score.
    pub async fn race(
        &self,
        prompt: &str,
        temperature: f32,
        response_type: ResponseType,
        expected_fields: &[String],
    ) -> Vec<ProviderResponse> {
        if self.providers.is_empty() {
            return Vec::new();
        }

        let mut tasks = FuturesUnordered::new();
        for (index, provider) in self.providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let prompt = prompt.to_string();
            tasks.push(tokio::spawn(async move {
                let name = provider.name().to_string();
                let outcome = provider.complete(&prompt, temperature).await;
                (index, name, outcome)
            }));
        }

        let mut responses: Vec<Option<ProviderResponse>> = vec![None; self.providers.len()];
        while let Some(joined) = tasks.next().await {
            let Ok((index, name, outcome)) = joined else {
                continue;
            };
            let response = match outcome {
                Ok(text) => {
                    let score = score_response(&text, response_type, expected_fields);
                    tracing::debug!("[Orchestrator] {} scored {:.1}", name, score);
                    ProviderResponse {
                        provider: name,
                        text,
                        score,
                    }
                }
                Err(e) => {
                    tracing::warn!("[Orchestrator] {} failed: {}", name, e);
                    ProviderResponse {
                        provider: name,
                        text: String::new(),
                        score: 0.0,
                    }
                }
            };
            responses[index] = Some(response);
        }

        responses.into_iter().flatten().collect()
    }
}

/// Pick the winner among raced responses. `responses` must be in
/// configured provider order.
fn select_best(responses: &[ProviderResponse]) -> Option<&ProviderResponse> {
    let mut best: Option<&ProviderResponse> = None;
    for response in responses {
        // Strict comparison keeps the earliest provider on ties
        if best.map_or(true, |b| response.score > b.score) {
            best = Some(response);
        }
    }

    match best {
        Some(b) if b.score > 0.0 => Some(b),
        _ => responses.iter().find(|r| !r.text.trim().is_empty()),
    }
}
