//! Phase 2 — Tables & Columns: turns each SQL-bearing
//! chart into a set of `TableColumnRow`s, per-chart and bounded by a worker
//! pool (`max_workers_charts`). Honors `ExtractionStrategy`: `Hybrid`
//! attempts the LLM prompt first and falls back to the rule-based SQL
//! walker on any failure for that chart; `RuleBasedOnly` never calls the
//! LLM.

use std::collections::BTreeMap;
use std::sync::Arc;

use dm_model::{ChartRecord, DashboardRecord, SourceOrDerived, TableColumnRow};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::config::ExtractionStrategy;
use crate::sql_extract::extract_rule_based;

pub async fn run(
    llm: Option<&dm_llm::LlmGatewayHandle>,
    strategy: ExtractionStrategy,
    dashboard: &DashboardRecord,
    default_catalog: &str,
    max_workers: usize,
) -> Vec<TableColumnRow> {
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut handles = Vec::new();

    for chart in dashboard.charts_with_sql() {
        let chart = chart.clone();
        let llm = llm.cloned();
        let default_catalog = default_catalog.to_string();
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            extract_chart(llm.as_ref(), strategy, &chart, &default_catalog).await
        }));
    }

    let mut rows = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(chart_rows) => rows.extend(chart_rows),
            Err(error) => warn!(error = %error, "phase 2: chart extraction task panicked, chart skipped"),
        }
    }
    rows
}

async fn extract_chart(
    llm: Option<&dm_llm::LlmGatewayHandle>,
    strategy: ExtractionStrategy,
    chart: &ChartRecord,
    default_catalog: &str,
) -> Vec<TableColumnRow> {
    let sql = chart.sql_query.as_deref().unwrap_or_default();

    if strategy == ExtractionStrategy::Hybrid {
        if let Some(gateway) = llm {
            match extract_via_llm(gateway, sql, chart, default_catalog).await {
                Ok(rows) => return rows,
                Err(error) => {
                    warn!(
                        chart_id = chart.chart_id,
                        error = %error,
                        "phase 2: LLM extraction failed for chart, degrading to rule-based"
                    );
                }
            }
        }
    }

    rows_from_rule_based(sql, chart, default_catalog)
}

async fn extract_via_llm(
    gateway: &dm_llm::LlmGatewayHandle,
    sql: &str,
    chart: &ChartRecord,
    default_catalog: &str,
) -> Result<Vec<TableColumnRow>, dm_llm::LlmError> {
    let chart_metadata = serde_json::json!({
        "chart_id": chart.chart_id,
        "chart_name": chart.chart_name,
        "columns": chart.columns,
        "groupby_columns": chart.groupby_columns,
    });
    let output = dm_llm::prompts::extract_source_tables_columns(gateway, sql, &chart_metadata).await?;

    let tables: Vec<String> = output
        .source_tables
        .iter()
        .filter(|name| !dm_core::is_cte_alias(sql, name))
        .map(|name| dm_core::normalize_table_name(name, default_catalog))
        .collect();

    let mut rows = Vec::new();
    for table in &tables {
        for column in &output.source_columns {
            rows.push(TableColumnRow {
                table_name: table.clone(),
                column_name: column.clone(),
                alias: column.clone(),
                source_or_derived: SourceOrDerived::Source,
                derived_logic: None,
                chart_id: chart.chart_id,
                chart_label: chart.chart_name.clone(),
                datatype: None,
            });
        }
    }
    rows.extend(derived_rows(&output.derived_columns_map, chart));
    Ok(rows)
}

fn rows_from_rule_based(sql: &str, chart: &ChartRecord, default_catalog: &str) -> Vec<TableColumnRow> {
    extract_rule_based(sql, default_catalog)
        .columns
        .into_iter()
        .map(|column| TableColumnRow {
            table_name: column.table_name,
            column_name: column.column_name,
            alias: column.alias,
            source_or_derived: column.source_or_derived,
            derived_logic: column.derived_logic,
            chart_id: chart.chart_id,
            chart_label: chart.chart_name.clone(),
            datatype: None,
        })
        .collect()
}

/// Derived columns are computed in SQL rather than read off a physical
/// table, so they carry no `table_name` attribution.
fn derived_rows(derived_columns_map: &BTreeMap<String, String>, chart: &ChartRecord) -> Vec<TableColumnRow> {
    derived_columns_map
        .iter()
        .map(|(name, expression)| TableColumnRow {
            table_name: String::new(),
            column_name: name.clone(),
            alias: name.clone(),
            source_or_derived: SourceOrDerived::Derived,
            derived_logic: Some(expression.clone()),
            chart_id: chart.chart_id,
            chart_label: chart.chart_name.clone(),
            datatype: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_model::{ChartType, DashboardRecord};

    fn chart_with_sql(id: i64, sql: &str) -> ChartRecord {
        ChartRecord {
            chart_id: id,
            chart_name: format!("chart-{id}"),
            chart_type: ChartType::Table,
            dataset_id: 1,
            dataset_name: "ds".to_string(),
            database_name: "hive".to_string(),
            sql_query: Some(sql.to_string()),
            metrics: vec![],
            columns: vec![],
            groupby_columns: vec![],
            filters: vec![],
            time_range: None,
        }
    }

    #[tokio::test]
    async fn rule_based_only_never_touches_llm_and_still_extracts_rows() {
        let dashboard = DashboardRecord {
            id: 1,
            title: "t".to_string(),
            url: String::new(),
            owner: String::new(),
            created_at: chrono::Utc::now(),
            changed_at: chrono::Utc::now(),
            charts: vec![chart_with_sql(1, "SELECT amount FROM sales.orders")],
        };
        let rows = run(None, ExtractionStrategy::RuleBasedOnly, &dashboard, "hive", 4).await;
        assert!(rows.iter().any(|row| row.table_name == "hive.sales.orders" && row.column_name == "amount"));
    }

    #[tokio::test]
    async fn hybrid_without_gateway_degrades_to_rule_based() {
        let dashboard = DashboardRecord {
            id: 2,
            title: "t".to_string(),
            url: String::new(),
            owner: String::new(),
            created_at: chrono::Utc::now(),
            changed_at: chrono::Utc::now(),
            charts: vec![chart_with_sql(2, "SELECT id FROM sales.customers")],
        };
        let rows = run(None, ExtractionStrategy::Hybrid, &dashboard, "hive", 4).await;
        assert!(rows.iter().any(|row| row.table_name == "hive.sales.customers"));
    }

    #[tokio::test]
    async fn dashboard_with_no_sql_charts_yields_no_rows() {
        let dashboard = DashboardRecord {
            id: 3,
            title: "t".to_string(),
            url: String::new(),
            owner: String::new(),
            created_at: chrono::Utc::now(),
            changed_at: chrono::Utc::now(),
            charts: vec![],
        };
        let rows = run(None, ExtractionStrategy::RuleBasedOnly, &dashboard, "hive", 4).await;
        assert!(rows.is_empty());
    }
}
