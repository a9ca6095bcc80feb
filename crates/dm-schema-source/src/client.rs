//! Transport for the SQL execution engine's query endpoint. Grounded on
//! `dm-dashboard-source::client`'s retry-loop shape, narrowed to a single
//! POST-a-query operation since the only query this source ever issues is
//! `DESCRIBE <table>`.

use std::time::Duration;

use tracing::warn;

use crate::error::SchemaSourceError;

const BASE_BACKOFF_MS: u64 = 500;
const CAP_BACKOFF_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct SchemaSourceConfig {
    pub api_base: String,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    /// Bounds the number of concurrent `DESCRIBE` requests in flight to a
    /// small pool so fan-out doesn't overwhelm the upstream.
    pub max_workers: usize,
}

impl Default for SchemaSourceConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            request_timeout_ms: 30_000,
            max_retries: 3,
            max_workers: 4,
        }
    }
}

#[derive(Clone)]
pub struct SchemaSourceTransport {
    http: reqwest::Client,
    api_base: String,
    max_retries: usize,
    max_workers: usize,
}

impl SchemaSourceTransport {
    pub fn new(config: SchemaSourceConfig) -> Result<Self, SchemaSourceError> {
        if config.api_base.trim().is_empty() {
            return Err(SchemaSourceError::InvalidConfig("api_base must be non-empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.max(1),
            max_workers: config.max_workers.max(1),
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Issues `DESCRIBE <table>` and returns the raw `{column_name: datatype}`
    /// rows the upstream query endpoint reports.
    pub async fn describe_table(&self, table: &str) -> Result<Vec<(String, String)>, SchemaSourceError> {
        let raw = self.query_raw(&format!("DESCRIBE {table}"), table).await?;
        parse_describe_rows(table, &raw)
    }

    /// Issues an arbitrary SQL statement against the query endpoint and
    /// returns the raw response body. `label` identifies the statement in
    /// error messages (a table name for `DESCRIBE`, the catalog table name
    /// for the Table Validator's metadata query).
    pub async fn query_raw(&self, sql: &str, label: &str) -> Result<String, SchemaSourceError> {
        let url = format!("{}/api/v1/query", self.api_base);
        let body = serde_json::json!({"sql": sql});
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            let response = self
                .http
                .post(&url)
                .header("x-dm-retry-attempt", attempt.to_string())
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.text().await?);
                    }
                    if !dm_core::retry::should_retry_status(status.as_u16()) {
                        let text = response.text().await.unwrap_or_default();
                        return Err(SchemaSourceError::QueryFailed {
                            table: label.to_string(),
                            status: status.as_u16(),
                            body: text,
                        });
                    }
                    let text = response.text().await.unwrap_or_default();
                    last_error = Some(SchemaSourceError::QueryFailed {
                        table: label.to_string(),
                        status: status.as_u16(),
                        body: text,
                    });
                    if attempt + 1 >= self.max_retries {
                        break;
                    }
                    let delay_ms = dm_core::retry::jittered_backoff_ms(attempt, BASE_BACKOFF_MS, CAP_BACKOFF_MS, true);
                    warn!(label, attempt, delay_ms, "schema source query retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(error) => {
                    if attempt + 1 >= self.max_retries {
                        return Err(SchemaSourceError::Http(error));
                    }
                    let delay_ms = dm_core::retry::jittered_backoff_ms(attempt, BASE_BACKOFF_MS, CAP_BACKOFF_MS, true);
                    last_error = Some(SchemaSourceError::Http(error));
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }

        Err(last_error.unwrap_or(SchemaSourceError::QueryFailed {
            table: label.to_string(),
            status: 0,
            body: "exhausted retries with no response".to_string(),
        }))
    }
}

fn parse_describe_rows(table: &str, raw: &str) -> Result<Vec<(String, String)>, SchemaSourceError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|error| SchemaSourceError::InvalidResponse {
        table: table.to_string(),
        detail: error.to_string(),
    })?;
    let rows = value
        .get("rows")
        .and_then(|rows| rows.as_array())
        .ok_or_else(|| SchemaSourceError::InvalidResponse {
            table: table.to_string(),
            detail: "response had no 'rows' array".to_string(),
        })?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let column_name = row.get("column_name").and_then(|v| v.as_str()).unwrap_or_default();
        let datatype = row.get("type").and_then(|v| v.as_str()).unwrap_or_default();
        if column_name.is_empty() {
            continue;
        }
        columns.push((column_name.to_string(), datatype.to_string()));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(api_base: String) -> SchemaSourceConfig {
        SchemaSourceConfig { api_base, request_timeout_ms: 5_000, max_retries: 3, max_workers: 4 }
    }

    #[tokio::test]
    async fn describe_table_parses_rows() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/api/v1/query");
            then.status(200).json_body(serde_json::json!({
                "rows": [
                    {"column_name": "amount", "type": "DECIMAL"},
                    {"column_name": "id", "type": "BIGINT"}
                ]
            }));
        });

        let transport = SchemaSourceTransport::new(config_for(server.base_url())).expect("transport");
        let columns = transport.describe_table("hive.sales.orders").await.expect("describe");
        assert_eq!(columns, vec![("amount".to_string(), "DECIMAL".to_string()), ("id".to_string(), "BIGINT".to_string())]);
    }

    #[tokio::test]
    async fn describe_table_surfaces_terminal_error_on_404() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/api/v1/query");
            then.status(404).body("no such table");
        });

        let transport = SchemaSourceTransport::new(config_for(server.base_url())).expect("transport");
        let error = transport.describe_table("hive.sales.missing").await.expect_err("should fail");
        assert!(matches!(error, SchemaSourceError::QueryFailed { status: 404, .. }));
    }

    #[test]
    fn parse_describe_rows_skips_rows_without_column_name() {
        let raw = serde_json::json!({"rows": [{"type": "INT"}, {"column_name": "x", "type": "INT"}]}).to_string();
        let rows = parse_describe_rows("t", &raw).expect("parse");
        assert_eq!(rows, vec![("x".to_string(), "INT".to_string())]);
    }
}
