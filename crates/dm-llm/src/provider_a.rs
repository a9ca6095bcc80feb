//! `provider-a`: an Anthropic-style messages API client, grounded on the
//! request-building shape of a Claude Messages API call (system prompt +
//! single user turn, `max_tokens` and `temperature` at the top level).

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use crate::types::{CompletionResponse, LlmError, LlmProvider, ProviderSendOutcome};

pub struct ProviderAClient {
    api_base: String,
    api_key: String,
    model: String,
}

impl ProviderAClient {
    pub fn new(api_base: String, api_key: &str, model: String) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(Self { api_base, api_key: api_key.to_string(), model })
    }

    fn messages_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        if base.ends_with("/messages") {
            base.to_string()
        } else {
            format!("{base}/messages")
        }
    }

    pub fn default_headers(api_key: &str) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|error| LlmError::MalformedOutput(format!("invalid api key header: {error}")))?,
        );
        headers.insert("provider-a-version", HeaderValue::from_static("2024-01-01"));
        Ok(headers)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlockResponse>,
    #[serde(default)]
    usage: Option<UsageResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct UsageResponse {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[async_trait::async_trait]
impl LlmProvider for ProviderAClient {
    async fn send(
        &self,
        client: &reqwest::Client,
        request: &crate::types::CompletionRequest,
        attempt: usize,
    ) -> Result<ProviderSendOutcome, LlmError> {
        let body = json!({
            "model": self.model,
            "system": request.system,
            "messages": [{"role": "user", "content": request.user}],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let response = client
            .post(self.messages_url())
            .headers(Self::default_headers(&self.api_key)?)
            .header("x-dm-request-id", dm_core::retry::new_request_id())
            .header("x-dm-retry-attempt", attempt.to_string())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            let raw = response.text().await?;
            let parsed: MessagesResponse = serde_json::from_str(&raw)
                .map_err(|error| LlmError::MalformedOutput(format!("provider-a response: {error}")))?;
            let text = parsed
                .content
                .iter()
                .filter(|block| block.block_type == "text")
                .filter_map(|block| block.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n");
            let usage = parsed.usage.unwrap_or_default();
            return Ok(ProviderSendOutcome::Success(CompletionResponse {
                text,
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            }));
        }

        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(dm_core::retry::parse_retry_after_ms);
        let body_text = response.text().await.unwrap_or_default();
        if dm_core::retry::should_retry_status(status.as_u16()) {
            Ok(ProviderSendOutcome::RetryableStatus {
                status: status.as_u16(),
                body: body_text,
                retry_after_ms,
            })
        } else {
            Ok(ProviderSendOutcome::TerminalStatus {
                status: status.as_u16(),
                body: body_text,
            })
        }
    }
}
