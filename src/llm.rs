use crate::config::LLMConfig;
use crate::{NewsError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// The `LLMProcessor` struct sends prompts to an Ollama-compatible `/api/generate` endpoint.
pub struct LLMProcessor {
    client: Client,
    config: LLMConfig,
}

impl LLMProcessor {
    /// Creates a new `LLMProcessor` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint, model, and sampling settings.
    pub fn new(config: LLMConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Sends `prompt` and returns the generated text, trimmed.
    #[instrument(skip(self, prompt), fields(model = %self.config.model, prompt_length = prompt.len()))]
    pub async fn process(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        debug!("LLM response status: {}", status);
        if !status.is_success() {
            return Err(NewsError::LLMError(format!("endpoint returned HTTP {status}")));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body.response.trim().to_string();
        if text.is_empty() {
            return Err(NewsError::LLMError("empty response".to_string()));
        }
        Ok(text)
    }
}
