//! The Table Validator: gates a candidate table set against the
//! authoritative catalog before any LLM call in phases 4+, so invalid
//! tables never incur token cost.
//!
//! Primary path is a single metadata query against a catalog table keyed
//! by fully-qualified name; if that query itself fails, the validator
//! falls back to a per-table `DESCRIBE` probe (via `dm_schema_source`). If
//! both paths fail, validation degrades defensively: every candidate table
//! is treated as valid, with a clear log indicator.

use std::collections::BTreeSet;

use dm_schema_source::SchemaSourceTransport;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct TableValidatorConfig {
    /// The authoritative catalog table name. The source hinted at two
    /// names across commits (`active_datasets_snapshot_v3` vs.
    /// `overall_tables`), so this is a configuration value rather than a
    /// hard-coded constant, defaulting to the more generic of the two.
    pub catalog_table: String,
}

impl Default for TableValidatorConfig {
    fn default() -> Self {
        Self { catalog_table: "overall_tables".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMethod {
    Metadata,
    DescribeFallback,
    MetadataFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: BTreeSet<String>,
    pub invalid: BTreeSet<String>,
    pub method: ValidationMethod,
    pub error: Option<String>,
}

pub async fn validate(
    transport: &SchemaSourceTransport,
    config: &TableValidatorConfig,
    tables: &[String],
) -> ValidationResult {
    if tables.is_empty() {
        return ValidationResult {
            valid: BTreeSet::new(),
            invalid: BTreeSet::new(),
            method: ValidationMethod::Metadata,
            error: None,
        };
    }

    match metadata_query(transport, config, tables).await {
        Ok(found) => partition(tables, &found, ValidationMethod::Metadata, None),
        Err(metadata_error) => {
            warn!(
                catalog_table = %config.catalog_table,
                error = %metadata_error,
                "table validator: metadata query failed, falling back to per-table DESCRIBE probe"
            );
            let schemas = dm_schema_source::describe(transport, tables).await;
            if schemas.is_empty() {
                warn!(
                    error = %metadata_error,
                    "table validator: metadata and DESCRIBE fallback both failed, \
                     proceeding with all candidate tables (defensive degrade)"
                );
                return ValidationResult {
                    valid: tables.iter().cloned().collect(),
                    invalid: BTreeSet::new(),
                    method: ValidationMethod::MetadataFailed,
                    error: Some(metadata_error.to_string()),
                };
            }
            let found: BTreeSet<String> = schemas.keys().cloned().collect();
            partition(tables, &found, ValidationMethod::DescribeFallback, Some(metadata_error.to_string()))
        }
    }
}

fn partition(
    tables: &[String],
    found: &BTreeSet<String>,
    method: ValidationMethod,
    error: Option<String>,
) -> ValidationResult {
    let mut valid = BTreeSet::new();
    let mut invalid = BTreeSet::new();
    for table in tables {
        if found.contains(table) {
            valid.insert(table.clone());
        } else {
            invalid.insert(table.clone());
        }
    }
    ValidationResult { valid, invalid, method, error }
}

async fn metadata_query(
    transport: &SchemaSourceTransport,
    config: &TableValidatorConfig,
    tables: &[String],
) -> Result<BTreeSet<String>, dm_schema_source::SchemaSourceError> {
    let quoted = tables.iter().map(|table| format!("'{}'", table.replace('\'', "''"))).collect::<Vec<_>>().join(", ");
    let sql = format!(
        "SELECT table_name FROM {} WHERE table_name IN ({})",
        config.catalog_table, quoted
    );
    let raw = transport.query_raw(&sql, &config.catalog_table).await?;
    Ok(parse_table_names(&raw))
}

fn parse_table_names(raw: &str) -> BTreeSet<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
        return BTreeSet::new();
    };
    let Some(rows) = value.get("rows").and_then(|rows| rows.as_array()) else {
        return BTreeSet::new();
    };
    rows.iter()
        .filter_map(|row| row.get("table_name").and_then(|v| v.as_str()).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_schema_source::SchemaSourceConfig;

    fn transport_for(api_base: String) -> SchemaSourceTransport {
        SchemaSourceTransport::new(SchemaSourceConfig { api_base, request_timeout_ms: 5_000, max_retries: 1, max_workers: 2 })
            .expect("transport")
    }

    #[tokio::test]
    async fn metadata_path_partitions_valid_and_invalid() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/api/v1/query");
            then.status(200).json_body(serde_json::json!({"rows": [{"table_name": "hive.sales.orders"}]}));
        });

        let transport = transport_for(server.base_url());
        let config = TableValidatorConfig::default();
        let tables = vec!["hive.sales.orders".to_string(), "hive.fake.missing_table".to_string()];
        let result = validate(&transport, &config, &tables).await;

        assert_eq!(result.method, ValidationMethod::Metadata);
        assert!(result.valid.contains("hive.sales.orders"));
        assert!(result.invalid.contains("hive.fake.missing_table"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn falls_back_to_describe_when_metadata_query_fails() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/api/v1/query").body_contains("overall_tables");
            then.status(500).body("catalog offline");
        });
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/api/v1/query").body_contains("DESCRIBE hive.sales.orders");
            then.status(200).json_body(serde_json::json!({"rows": [{"column_name": "amount", "type": "DECIMAL"}]}));
        });
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/api/v1/query").body_contains("DESCRIBE hive.fake.missing_table");
            then.status(404).body("no such table");
        });

        let transport = transport_for(server.base_url());
        let config = TableValidatorConfig::default();
        let tables = vec!["hive.sales.orders".to_string(), "hive.fake.missing_table".to_string()];
        let result = validate(&transport, &config, &tables).await;

        assert_eq!(result.method, ValidationMethod::DescribeFallback);
        assert!(result.valid.contains("hive.sales.orders"));
        assert!(result.invalid.contains("hive.fake.missing_table"));
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn degrades_to_all_valid_when_both_paths_fail() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/api/v1/query");
            then.status(500).body("everything offline");
        });

        let transport = transport_for(server.base_url());
        let config = TableValidatorConfig::default();
        let tables = vec!["hive.sales.orders".to_string()];
        let result = validate(&transport, &config, &tables).await;

        assert_eq!(result.method, ValidationMethod::MetadataFailed);
        assert_eq!(result.valid.len(), 1);
        assert!(result.invalid.is_empty());
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn empty_table_set_is_vacuously_valid() {
        let server = httpmock::MockServer::start();
        let transport = transport_for(server.base_url());
        let config = TableValidatorConfig::default();
        let result = validate(&transport, &config, &[]).await;
        assert!(result.valid.is_empty());
        assert!(result.invalid.is_empty());
    }
}
