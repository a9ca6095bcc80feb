//! Authenticated HTTP client for the upstream BI service, grounded on the
//! retry-loop shape of `GithubApiClient::request_json` (generic closure
//! request builder, attempt-tagged requests, `Retry-After` floor, bail on
//! exhausted retries) but branching the non-2xx outcome by a typed error
//! taxonomy instead of flattening everything into one `anyhow` error.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::DashboardSourceError;

const BASE_BACKOFF_MS: u64 = 500;
const CAP_BACKOFF_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct DashboardSourceConfig {
    pub api_base: String,
    pub session_cookie: String,
    pub csrf_token: String,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
}

#[derive(Clone)]
pub struct DashboardSourceTransport {
    http: reqwest::Client,
    api_base: String,
    max_retries: usize,
}

impl DashboardSourceTransport {
    pub fn new(config: DashboardSourceConfig) -> Result<Self, DashboardSourceError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::COOKIE,
            reqwest::header::HeaderValue::from_str(&config.session_cookie)
                .map_err(|error| DashboardSourceError::InvalidConfig(error.to_string()))?,
        );
        headers.insert(
            "x-csrf-token",
            reqwest::header::HeaderValue::from_str(&config.csrf_token)
                .map_err(|error| DashboardSourceError::InvalidConfig(error.to_string()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(DashboardSourceError::Http)?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.max(1),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// GETs `path` (relative to `api_base`) and decodes the JSON body as
    /// `T`, retrying on 429/5xx and surfacing 401 as `Auth` (fatal) and
    /// other 4xx as `NotFound` (terminal, per-item).
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DashboardSourceError> {
        let url = format!("{}{}", self.api_base, path);
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            let response = self
                .http
                .get(&url)
                .header("x-dm-retry-attempt", attempt.to_string())
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let raw = response.text().await.map_err(DashboardSourceError::Http)?;
                        return serde_json::from_str(&raw).map_err(|error| {
                            DashboardSourceError::InvalidResponse(format!("{path}: {error}"))
                        });
                    }
                    if status.as_u16() == 401 {
                        return Err(DashboardSourceError::Auth(format!(
                            "401 from {path}: credentials rejected"
                        )));
                    }
                    if !dm_core::retry::should_retry_status(status.as_u16()) {
                        let body = response.text().await.unwrap_or_default();
                        return Err(DashboardSourceError::NotFound(format!(
                            "{path} returned {}: {body}",
                            status.as_u16()
                        )));
                    }

                    let retry_after_ms = response
                        .headers()
                        .get("retry-after")
                        .and_then(|value| value.to_str().ok())
                        .and_then(dm_core::retry::parse_retry_after_ms);
                    last_error = Some(DashboardSourceError::Transient(format!(
                        "{path} returned {}",
                        status.as_u16()
                    )));
                    if attempt + 1 >= self.max_retries {
                        break;
                    }
                    let delay_ms = retry_after_ms.unwrap_or_else(|| {
                        dm_core::retry::jittered_backoff_ms(attempt, BASE_BACKOFF_MS, CAP_BACKOFF_MS, true)
                    });
                    warn!(path, attempt, delay_ms, "dashboard source request retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(error) => {
                    if attempt + 1 >= self.max_retries {
                        return Err(DashboardSourceError::Http(error));
                    }
                    let delay_ms = dm_core::retry::jittered_backoff_ms(attempt, BASE_BACKOFF_MS, CAP_BACKOFF_MS, true);
                    last_error = Some(DashboardSourceError::Http(error));
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DashboardSourceError::Transient(path.to_string())))
    }
}
