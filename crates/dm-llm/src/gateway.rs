//! The LLM Gateway: single-flight provider configuration plus a retry loop
//! generalized over any `LlmProvider`. Follows `AnthropicClient::complete_with_mode`'s
//! retry control flow, but hoists it out of the per-provider client and
//! centralizes it here, so this gateway owns retry policy, provider
//! selection, and one-time configuration as a single seam.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::provider_a::ProviderAClient;
use crate::provider_b::ProviderBClient;
use crate::types::{CompletionRequest, CompletionResponse, GatewayConfig, LlmError, LlmProvider, ProviderKind, ProviderSendOutcome};

const BASE_BACKOFF_MS: u64 = 2_000;
const CAP_BACKOFF_MS: u64 = 60_000;

/// An explicit handle to a configured gateway. Deliberately not exposed as a
/// global static — callers obtain one from `LlmGateway::configure` (or
/// `LlmGateway::get`) and pass it down the call stack, per the single
/// explicit-handle pattern this pipeline uses for all shared process state.
#[derive(Clone)]
pub struct LlmGatewayHandle {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    provider: Box<dyn LlmProvider>,
    http: reqwest::Client,
    config: GatewayConfig,
}

/// Process-wide single-flight configuration cell. The first caller to reach
/// `configure` wins; later calls with a different provider return
/// `AlreadyConfigured` rather than silently reconfiguring a gateway that may
/// already be in use by in-flight work.
static GATEWAY: OnceCell<LlmGatewayHandle> = OnceCell::const_new();

pub struct LlmGateway;

impl LlmGateway {
    /// Configures the process-wide gateway exactly once. Subsequent calls
    /// return the already-configured handle if `config.provider` matches,
    /// or `AlreadyConfigured` if it does not.
    pub async fn configure(config: GatewayConfig) -> Result<LlmGatewayHandle, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let requested_provider = config.provider;
        let handle = GATEWAY
            .get_or_try_init(|| async { LlmGatewayHandle::build(config) })
            .await?;
        if handle.inner.config.provider != requested_provider {
            return Err(LlmError::AlreadyConfigured);
        }
        Ok(handle.clone())
    }

    /// Returns the already-configured handle, or `NotConfigured` if
    /// `configure` has not yet run in this process.
    pub fn get() -> Result<LlmGatewayHandle, LlmError> {
        GATEWAY.get().cloned().ok_or(LlmError::NotConfigured)
    }
}

impl LlmGatewayHandle {
    fn build(config: GatewayConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(LlmError::Http)?;
        let provider: Box<dyn LlmProvider> = match config.provider {
            ProviderKind::ProviderA => Box::new(ProviderAClient::new(
                config.base_url.clone(),
                &config.api_key,
                config.model.clone(),
            )?),
            ProviderKind::ProviderB => Box::new(ProviderBClient::new(
                config.base_url.clone(),
                &config.api_key,
                config.model.clone(),
            )?),
        };
        Ok(Self {
            inner: Arc::new(GatewayInner { provider, http, config }),
        })
    }

    /// Constructs a gateway handle without going through the process-wide
    /// single-flight cell. Intended for tests that need an isolated gateway
    /// per test case rather than sharing the one `static` slot.
    pub fn new_standalone(config: GatewayConfig) -> Result<Self, LlmError> {
        Self::build(config)
    }

    pub fn model(&self) -> &str {
        &self.inner.config.model
    }

    /// Sends a completion request, retrying on rate limits and transient
    /// upstream failures: base delay 2s, multiplier 2, jitter +/-50%, capped
    /// at 60s, up to `max_retries` attempts total.
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let max_attempts = self.inner.config.max_retries.max(1);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..max_attempts {
            let outcome = self.inner.provider.send(&self.inner.http, &request, attempt).await;
            match outcome {
                Ok(ProviderSendOutcome::Success(response)) => return Ok(response),
                Ok(ProviderSendOutcome::TerminalStatus { status, body }) => {
                    return Err(LlmError::HttpStatus { status, body });
                }
                Ok(ProviderSendOutcome::RetryableStatus { status, body, retry_after_ms }) => {
                    let is_rate_limited = status == 429 || dm_core::retry::message_indicates_rate_limit(&body);
                    if attempt + 1 >= max_attempts {
                        last_error = Some(if is_rate_limited {
                            LlmError::RateLimited(body)
                        } else {
                            LlmError::HttpStatus { status, body }
                        });
                        break;
                    }
                    let delay_ms = retry_after_ms.unwrap_or_else(|| {
                        dm_core::retry::jittered_backoff_ms(attempt, BASE_BACKOFF_MS, CAP_BACKOFF_MS, true)
                    });
                    warn!(status, attempt, delay_ms, "llm provider call retrying after transient failure");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    last_error = Some(LlmError::HttpStatus { status, body });
                }
                Err(error) => {
                    if attempt + 1 >= max_attempts {
                        last_error = Some(error);
                        break;
                    }
                    let delay_ms = dm_core::retry::jittered_backoff_ms(attempt, BASE_BACKOFF_MS, CAP_BACKOFF_MS, true);
                    debug!(attempt, delay_ms, error = %error, "llm provider call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or(LlmError::NotConfigured))
    }

    /// Sends a completion request and parses the response text as JSON,
    /// attempting one cleaning pass (stripping a leading/trailing code fence)
    /// before giving up on malformed LLM output.
    pub async fn complete_json(&self, mut request: CompletionRequest) -> Result<serde_json::Value, LlmError> {
        request.json_mode = true;
        let response = self.complete(request).await?;
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&response.text) {
            return Ok(value);
        }
        let cleaned = strip_code_fence(&response.text);
        serde_json::from_str::<serde_json::Value>(&cleaned)
            .map_err(|error| LlmError::MalformedOutput(format!("{error}: {cleaned}")))
    }
}

fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let without_leading = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_leading.strip_suffix("```").unwrap_or(without_leading).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fence_removes_json_fence() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"a\": 1}");
    }

    #[test]
    fn strip_code_fence_removes_bare_fence() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"a\": 1}");
    }

    #[test]
    fn strip_code_fence_is_noop_on_plain_json() {
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn standalone_handle_rejects_blank_api_key() {
        let config = GatewayConfig {
            provider: ProviderKind::ProviderA,
            model: "model-x".to_string(),
            base_url: "https://api.example.com".to_string(),
            api_key: String::new(),
            max_tokens: 1024,
            temperature: 0.0,
            request_timeout_ms: 5_000,
            max_retries: 5,
        };
        let result = LlmGatewayHandle::new_standalone(config);
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }
}
