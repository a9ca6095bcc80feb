//! Phase 4 — Table Metadata: one `describe_table` LLM
//! call per distinct table, bounded by a worker pool, writing
//! `table_metadata.csv`. Re-validates the table set defensively before
//! calling the LLM, since phase 3's gate runs against a possibly-stale
//! validation and a dashboard can be long-running.

use std::collections::BTreeMap;
use std::sync::Arc;

use dm_llm::LlmGatewayHandle;
use dm_model::{DashboardRecord, TableColumnRow, TableMetadata};
use dm_schema_source::SchemaSourceTransport;
use dm_validator::TableValidatorConfig;
use tokio::sync::Semaphore;
use tracing::warn;

pub async fn run(
    gateway: &LlmGatewayHandle,
    transport: &SchemaSourceTransport,
    validator_config: &TableValidatorConfig,
    enable_table_validation: bool,
    dashboard: &DashboardRecord,
    rows: &[TableColumnRow],
    max_workers: usize,
) -> Vec<TableMetadata> {
    let tables: Vec<String> = rows
        .iter()
        .map(|row| row.table_name.clone())
        .filter(|name| !name.is_empty())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let tables = if enable_table_validation {
        let result = dm_validator::validate(transport, validator_config, &tables).await;
        if !result.invalid.is_empty() {
            warn!(invalid = ?result.invalid, "phase 4: defensive re-validation dropped tables that no longer validate");
        }
        result.valid.into_iter().collect()
    } else {
        tables
    };

    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut handles = Vec::with_capacity(tables.len());

    for table in tables {
        let gateway = gateway.clone();
        let dashboard_title = dashboard.title.clone();
        let columns_with_usage = columns_with_usage_for(&table, rows);
        let sample_sql = sample_sql_for(&table, dashboard);
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let result =
                dm_llm::prompts::describe_table(&gateway, &dashboard_title, &table, &columns_with_usage, &sample_sql)
                    .await;
            (table, result)
        }));
    }

    let mut metadata = Vec::new();
    for handle in handles {
        let Ok((table, result)) = handle.await else {
            continue;
        };
        match result {
            Ok(output) => metadata.push(TableMetadata {
                table_name: table,
                table_description: output.description,
                refresh_frequency: output.refresh_frequency,
                vertical: output.vertical,
                partition_column: output.partition_column,
                remarks: output.remarks,
                relationship_context: output.relationship_context,
            }),
            Err(error) => {
                warn!(table, error = %error, "phase 4: describe_table failed, table omitted from table_metadata.csv");
            }
        }
    }
    metadata
}

fn columns_with_usage_for(table: &str, rows: &[TableColumnRow]) -> serde_json::Value {
    let mut usage: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows.iter().filter(|row| row.table_name == table) {
        usage.entry(row.column_name.clone()).or_default().push(row.chart_label.clone());
    }
    serde_json::to_value(usage).unwrap_or(serde_json::Value::Null)
}

fn sample_sql_for(table: &str, dashboard: &DashboardRecord) -> String {
    dashboard
        .charts_with_sql()
        .find(|chart| chart.sql_query.as_deref().is_some_and(|sql| sql.contains(table_local_name(table))))
        .and_then(|chart| chart.sql_query.clone())
        .unwrap_or_default()
}

/// `table` is fully-qualified (`catalog.schema.table`); SQL text typically
/// references just the trailing segment or `schema.table`, so match on
/// that rather than requiring the full normalized form to appear verbatim.
fn table_local_name(table: &str) -> &str {
    table.rsplit('.').next().unwrap_or(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_model::{ChartRecord, ChartType, SourceOrDerived};

    fn sample_dashboard() -> DashboardRecord {
        DashboardRecord {
            id: 1,
            title: "Sales".to_string(),
            url: String::new(),
            owner: String::new(),
            created_at: chrono::Utc::now(),
            changed_at: chrono::Utc::now(),
            charts: vec![ChartRecord {
                chart_id: 1,
                chart_name: "Volume".to_string(),
                chart_type: ChartType::Line,
                dataset_id: 1,
                dataset_name: "ds".to_string(),
                database_name: "hive".to_string(),
                sql_query: Some("SELECT amount FROM sales.orders".to_string()),
                metrics: vec![],
                columns: vec![],
                groupby_columns: vec![],
                filters: vec![],
                time_range: None,
            }],
        }
    }

    #[test]
    fn sample_sql_matches_on_local_table_name() {
        let dashboard = sample_dashboard();
        let sql = sample_sql_for("hive.sales.orders", &dashboard);
        assert!(sql.contains("SELECT amount"));
    }

    #[test]
    fn columns_with_usage_groups_chart_labels_by_column() {
        let rows = vec![TableColumnRow {
            table_name: "hive.sales.orders".to_string(),
            column_name: "amount".to_string(),
            alias: "amount".to_string(),
            source_or_derived: SourceOrDerived::Source,
            derived_logic: None,
            chart_id: 1,
            chart_label: "Volume".to_string(),
            datatype: None,
        }];
        let usage = columns_with_usage_for("hive.sales.orders", &rows);
        assert_eq!(usage["amount"][0], "Volume");
    }
}
