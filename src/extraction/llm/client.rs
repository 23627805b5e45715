use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Requested shape of a provider's reply. `Json` is what the LLM
/// Extraction Adapter and Narrative Generator both request; `Text` is
/// used for free-form narrative completions that are parsed separately
/// by the Section Parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LlmCallOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

impl Default for LlmCallOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.2,
            response_format: ResponseFormat::Text,
        }
    }
}

/// Thin boundary to an external LLM provider (spec §1: HTTP transport and
/// provider wire formats are an external collaborator — this crate only
/// specifies the interface it requires). Implementors always return the
/// provider's raw text; whether that text is itself a JSON document is
/// the LLM Extraction Adapter's concern, not the client's (spec §4.5/§9:
/// provider polymorphism is resolved at one boundary, not scattered
/// across call sites).
pub trait LlmClient: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        options: &LlmCallOptions,
    ) -> Result<String, CoreError>;
}

/// A locally-run HTTP completion endpoint (Ollama-shaped: POST
/// `/api/generate` with `{model, prompt, system, stream: false}`, a
/// `{response: String}` reply). Blocking client — the orchestrator runs
/// each generation request as its own task, so a blocking call here only
/// occupies that task's thread, not the runtime.
pub struct HttpLlmClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        }
    }
}

impl LlmClient for HttpLlmClient {
    fn generate(&self, prompt: &str, system_prompt: &str, _options: &LlmCallOptions) -> Result<String, CoreError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system: system_prompt,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| CoreError::LlmProvider {
            stage: "llm_adapter",
            provider: Some(self.model.clone()),
            message: if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            },
            fallback_attempted: false,
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(CoreError::LlmProvider {
                stage: "llm_adapter",
                provider: Some(self.model.clone()),
                message: format!("provider returned status {status}: {body}"),
                fallback_attempted: false,
            });
        }

        let parsed: GenerateResponse = response.json().map_err(|e| CoreError::LlmProvider {
            stage: "llm_adapter",
            provider: Some(self.model.clone()),
            message: format!("malformed provider response: {e}"),
            fallback_attempted: false,
        })?;

        Ok(parsed.response)
    }
}

/// Scripted client for tests — returns a fixed response or a per-provider
/// failure, used to drive the fallback-ladder and schema-recovery tests.
pub struct MockLlmClient {
    response: Result<String, String>,
}

impl MockLlmClient {
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
        }
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, _prompt: &str, _system_prompt: &str, _options: &LlmCallOptions) -> Result<String, CoreError> {
        self.response.clone().map_err(|message| CoreError::LlmProvider {
            stage: "llm_adapter",
            provider: Some("mock".to_string()),
            message,
            fallback_attempted: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockLlmClient::ok("hello");
        let result = client.generate("p", "s", &LlmCallOptions::default()).unwrap();
        assert_eq!(result, "hello");
    }

    #[test]
    fn mock_client_failure_surfaces_as_provider_error() {
        let client = MockLlmClient::failing("HTTP 500");
        let err = client.generate("p", "s", &LlmCallOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::LlmProvider { .. }));
    }

    #[test]
    fn http_client_trims_trailing_slash() {
        let client = HttpLlmClient::new("http://localhost:11434/", "medgemma", std::time::Duration::from_secs(30));
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
