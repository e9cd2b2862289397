//! Blocking client for the generative-model runtime.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// Connection settings for an OpenAI-compatible completion endpoint.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of the API (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Bearer token. An empty value means the runtime is unavailable.
    pub api_key: String,
    /// Model identifier requested for generation.
    pub model: String,
    /// Upper bound on generated tokens per report.
    pub max_tokens: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempt budget for rate limits and transient server errors.
    pub max_retries: usize,
}

/// Text-generation client resolved once per run.
#[derive(Clone, Debug)]
pub struct LlmSummarizer {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: usize,
    max_retries: usize,
}

impl LlmSummarizer {
    /// Probes the model runtime by building a client from configuration.
    ///
    /// Failure here is the expected "runtime unavailable" signal: callers
    /// downgrade the run to template mode instead of aborting.
    pub fn probe(config: &ModelConfig) -> Result<Self, PipelineError> {
        if config.api_key.trim().is_empty() {
            return Err(PipelineError::ModelUnavailable(
                "no API key configured".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(PipelineError::ModelUnavailable(
                "no model identifier configured".to_string(),
            ));
        }
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| {
                PipelineError::ModelUnavailable("API key is not a valid header value".to_string())
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| {
                PipelineError::ModelUnavailable(format!("failed to build HTTP client: {err}"))
            })?;
        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries.max(1),
        })
    }

    /// Generates one report body with deterministic decoding.
    ///
    /// Temperature is pinned to zero and output is bounded by the configured
    /// token limit; 429s and server errors retry with capped backoff.
    pub fn summarize(&self, prompt: &str) -> Result<String, PipelineError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let mut attempt = 0usize;
        loop {
            let response = self.client.post(&self.endpoint).json(&request).send();
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: ChatResponse = resp.json().map_err(|err| {
                            PipelineError::Model(format!("failed to parse response: {err}"))
                        })?;
                        let text = parsed
                            .choices
                            .into_iter()
                            .next()
                            .map(|choice| choice.message.content)
                            .unwrap_or_default();
                        return Ok(text.trim().to_string());
                    }
                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(PipelineError::Model(format!(
                        "completion request failed ({status}): {body}"
                    )));
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(PipelineError::Model(err.to_string()));
                }
            }
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: &str, model: &str) -> ModelConfig {
        ModelConfig {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: 128,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    #[test]
    fn probe_fails_without_an_api_key() {
        let err = LlmSummarizer::probe(&config("", "gpt-4o-mini")).unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable(_)));
    }

    #[test]
    fn probe_fails_without_a_model() {
        let err = LlmSummarizer::probe(&config("sk-test", " ")).unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable(_)));
    }

    #[test]
    fn probe_builds_a_client_and_endpoint_from_config() {
        let mut cfg = config("sk-test", "gpt-4o-mini");
        cfg.base_url = "http://localhost:8000/v1/".to_string();
        let client = LlmSummarizer::probe(&cfg).unwrap();
        assert_eq!(client.endpoint, "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert!(retry_backoff(1) < retry_backoff(2));
        assert_eq!(retry_backoff(5), retry_backoff(9));
    }
}
