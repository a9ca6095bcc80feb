//! `provider-b`: an OpenAI-style chat completions client, grounded on the
//! request-building shape of a chat completions call (`messages` array with
//! separate system/user roles, `response_format` for JSON mode).

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use crate::types::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, ProviderSendOutcome};

pub struct ProviderBClient {
    api_base: String,
    api_key: String,
    model: String,
}

impl ProviderBClient {
    pub fn new(api_base: String, api_key: &str, model: String) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(Self { api_base, api_key: api_key.to_string(), model })
    }

    fn chat_completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }

    pub fn default_headers(api_key: &str) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .map_err(|error| LlmError::MalformedOutput(format!("invalid api key header: {error}")))?,
        );
        Ok(headers)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait::async_trait]
impl LlmProvider for ProviderBClient {
    async fn send(
        &self,
        client: &reqwest::Client,
        request: &CompletionRequest,
        attempt: usize,
    ) -> Result<ProviderSendOutcome, LlmError> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        if request.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = client
            .post(self.chat_completions_url())
            .headers(Self::default_headers(&self.api_key)?)
            .header("x-dm-request-id", dm_core::retry::new_request_id())
            .header("x-dm-retry-attempt", attempt.to_string())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            let raw = response.text().await?;
            let parsed: ChatCompletionResponse = serde_json::from_str(&raw)
                .map_err(|error| LlmError::MalformedOutput(format!("provider-b response: {error}")))?;
            let text = parsed
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
                .unwrap_or_default();
            let usage = parsed.usage.unwrap_or_default();
            return Ok(ProviderSendOutcome::Success(CompletionResponse {
                text,
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_api_key() {
        let result = ProviderBClient::new("https://api.example.com/v1".to_string(), "", "model-y".to_string());
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn chat_completions_url_appends_path_once() {
        let client = ProviderBClient::new(
            "https://api.example.com/v1".to_string(),
            "key",
            "model-y".to_string(),
        )
        .expect("client");
        assert_eq!(
            client.chat_completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }
}
