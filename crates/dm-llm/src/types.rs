use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    ProviderA,
    ProviderB,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub json_mode: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM gateway accessed before configuration")]
    NotConfigured,
    #[error("LLM gateway was already configured with a different provider; single-flight configuration won")]
    AlreadyConfigured,
    #[error("missing API key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("provider rate limited the request after exhausting retries: {0}")]
    RateLimited(String),
    #[error("structured output could not be parsed even after a cleaning pass: {0}")]
    MalformedOutput(String),
}

/// The low-level transport trait a concrete provider implements. Retry,
/// backoff, and single-flight configuration live in `LlmGatewayHandle`, not
/// here — providers only know how to turn a `CompletionRequest` into a
/// `CompletionResponse` or report why they could not.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn send(
        &self,
        client: &reqwest::Client,
        request: &CompletionRequest,
        attempt: usize,
    ) -> Result<ProviderSendOutcome, LlmError>;
}

/// What a single provider call attempt produced: either a parsed response,
/// or a retryable/non-retryable failure with enough detail for the
/// gateway's retry loop to decide.
pub enum ProviderSendOutcome {
    Success(CompletionResponse),
    RetryableStatus { status: u16, body: String, retry_after_ms: Option<u64> },
    TerminalStatus { status: u16, body: String },
}
