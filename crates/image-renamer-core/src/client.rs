//! Client for the local vision inference endpoint.
//!
//! Speaks the OpenAI-compatible chat API that LM Studio and Ollama
//! expose. Failures carry an explicit kind, and a table-driven policy
//! decides which kinds are retried; the retry driver is a pure
//! function so the policy can be tested without a server.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use log::{debug, warn};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::error::Error;
use crate::extract::{extract_json_object, parse_analysis};
use crate::types::VisionAnalysis;

pub type ClientResult<T> = core::result::Result<T, ClientError>;

/// Classified failure from the inference endpoint
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// HTTP 5xx; the server may recover
    #[error("server error (HTTP {0})")]
    Server(u16),

    /// HTTP 429
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// HTTP 4xx other than 429; retrying cannot help
    #[error("client error (HTTP {0})")]
    Client(u16),

    /// Connection, DNS, or timeout failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The completion could not be turned into a valid analysis
    #[error("unparseable model output: {0}")]
    Parse(String),

    /// All attempts used up; carries the final underlying failure
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ClientError>,
    },
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Parse(msg) => Error::Parse(msg),
            other => Error::Endpoint(other.to_string()),
        }
    }
}

/// What the retry loop does with a failure of a given kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Retry with exponential backoff
    Backoff,

    /// Retry with a longer, fixed-multiple backoff
    RateLimit,

    /// Give up immediately
    Terminal,
}

/// The kind-to-action table
pub fn retry_class(err: &ClientError) -> RetryClass {
    match err {
        ClientError::Server(_) | ClientError::Transport(_) => RetryClass::Backoff,
        ClientError::RateLimited => RetryClass::RateLimit,
        ClientError::Client(_)
        | ClientError::Parse(_)
        | ClientError::RetriesExhausted { .. } => RetryClass::Terminal,
    }
}

/// Backoff parameters, derived from the configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub rate_limit_multiplier: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            rate_limit_multiplier: config.rate_limit_backoff_multiplier,
        }
    }

    /// Delay before the attempt following `attempt` (zero-based)
    pub fn delay_after(&self, class: RetryClass, attempt: u32) -> Duration {
        match class {
            RetryClass::Backoff => self.base_delay * 2u32.saturating_pow(attempt),
            RetryClass::RateLimit => self.base_delay * self.rate_limit_multiplier as u32,
            RetryClass::Terminal => Duration::ZERO,
        }
    }
}

/// Drive an attempt closure under the retry policy
///
/// `sleep` is injected so tests can run the policy without waiting.
pub fn run_with_retry<T, F, S>(
    policy: &RetryPolicy,
    mut attempt_fn: F,
    sleep: S,
) -> ClientResult<T>
where
    F: FnMut(u32) -> ClientResult<T>,
    S: Fn(Duration),
{
    let mut last: Option<ClientError> = None;

    for attempt in 0..policy.max_attempts {
        match attempt_fn(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                let class = retry_class(&err);
                if class == RetryClass::Terminal {
                    return Err(err);
                }
                warn!("Attempt {} failed ({}), will retry", attempt + 1, err);
                if attempt + 1 < policy.max_attempts {
                    sleep(policy.delay_after(class, attempt));
                }
                last = Some(err);
            }
        }
    }

    Err(ClientError::RetriesExhausted {
        attempts: policy.max_attempts,
        last: Box::new(last.unwrap_or(ClientError::Transport("no attempts made".to_string()))),
    })
}

/// Anything that can turn image bytes into a structured analysis
///
/// The orchestrator is written against this seam so batch and caching
/// behavior are testable with stubs.
pub trait VisionAnalyzer {
    fn analyze(
        &self,
        bytes: &[u8],
        mime: &str,
        filename_hint: Option<&str>,
    ) -> ClientResult<VisionAnalysis>;

    /// Cheap readiness probe; false when unreachable or no model loaded
    fn is_available(&self) -> bool;
}

/// HTTP client for the inference endpoint
pub struct VisionClient {
    http: reqwest::blocking::Client,
    probe: reqwest::blocking::Client,
    config: Config,
    policy: RetryPolicy,
}

impl VisionClient {
    pub fn new(config: &Config) -> crate::error::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        // Liveness checks should answer fast regardless of the
        // configured inference timeout
        let probe = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            probe,
            config: config.clone(),
            policy: RetryPolicy::from_config(config),
        })
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.endpoint_url.trim_end_matches('/')
        )
    }

    fn models_url(&self) -> String {
        format!(
            "{}/v1/models",
            self.config.endpoint_url.trim_end_matches('/')
        )
    }

    /// Models currently loaded on the endpoint
    pub fn loaded_models(&self) -> ClientResult<Vec<String>> {
        let response = self
            .probe
            .get(self.models_url())
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().map_err(transport_error)?;
        classify_status(status.as_u16())?;

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ClientError::Parse(format!("Bad models response: {}", e)))?;

        let models = value["data"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    /// One request/response cycle; the response is read fully before
    /// any classification happens
    fn request_once(&self, payload: &serde_json::Value) -> ClientResult<String> {
        let response = self
            .http
            .post(self.chat_url())
            .json(payload)
            .send()
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().map_err(transport_error)?;
        classify_status(status)?;

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ClientError::Parse(format!("Bad completion envelope: {}", e)))?;

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::Parse("Completion has no message content".to_string()))
    }

    fn build_payload(&self, bytes: &[u8], mime: &str, filename_hint: Option<&str>) -> serde_json::Value {
        let data_url = format!("data:{};base64,{}", mime, B64.encode(bytes));

        let mut prompt = String::from(
            "Analyze this image and respond with exactly one JSON object, no prose, \
             with these fields: suggested_filename (short snake_case stem, no extension), \
             title, subject, description, tags (array of short strings), comments, \
             authors, copyright, visible_date. \
             Populate authors, copyright and visible_date only when the image itself \
             shows direct evidence (a watermark, caption or visible date); never guess. \
             Use null for unknown fields.",
        );
        if let Some(hint) = filename_hint {
            prompt.push_str(&format!(" The current filename is \"{}\".", hint));
        }

        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }]
        })
    }
}

impl VisionAnalyzer for VisionClient {
    fn analyze(
        &self,
        bytes: &[u8],
        mime: &str,
        filename_hint: Option<&str>,
    ) -> ClientResult<VisionAnalysis> {
        let payload = self.build_payload(bytes, mime, filename_hint);

        let raw = run_with_retry(
            &self.policy,
            |_attempt| self.request_once(&payload),
            std::thread::sleep,
        )?;

        debug!("Model returned {} characters", raw.len());

        let json = extract_json_object(&raw)
            .ok_or_else(|| ClientError::Parse("No JSON object in model output".to_string()))?;

        parse_analysis(&json, &self.config).map_err(|e| ClientError::Parse(e.to_string()))
    }

    fn is_available(&self) -> bool {
        match self.loaded_models() {
            Ok(models) => !models.is_empty(),
            Err(_) => false,
        }
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

/// Status-code half of the failure table
fn classify_status(status: u16) -> ClientResult<()> {
    match status {
        200..=299 => Ok(()),
        429 => Err(ClientError::RateLimited),
        500..=599 => Err(ClientError::Server(status)),
        other => Err(ClientError::Client(other)),
    }
}

// -- Tests --
