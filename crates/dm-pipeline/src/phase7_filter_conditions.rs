//! Phase 7 — Filter Conditions: a single aggregated
//! `extract_filter_conditions` LLM call over the whole dashboard, writing
//! `filter_conditions.txt` as free text, one block per chart rather than
//! a row-oriented CSV.

use std::path::Path;

use anyhow::Result;
use dm_llm::LlmGatewayHandle;
use dm_model::DashboardRecord;

use crate::error::PhaseError;

pub async fn run(
    gateway: &LlmGatewayHandle,
    dashboard: &DashboardRecord,
    dir: &Path,
) -> Result<(), PhaseError> {
    let chart_labels: Vec<String> = dashboard.charts_with_sql().map(|chart| chart.chart_name.clone()).collect();
    let sql = aggregated_sql(dashboard);
    let metrics = aggregated_metrics(dashboard);

    let body = if chart_labels.is_empty() {
        String::new()
    } else {
        match dm_llm::prompts::extract_filter_conditions(gateway, &dashboard.title, &chart_labels, &sql, &metrics).await {
            Ok(output) => output.documentation,
            Err(error) => {
                tracing::warn!(dashboard_id = dashboard.id, error = %error, "phase 7: extract_filter_conditions failed, writing empty document");
                String::new()
            }
        }
    };

    let path = dir.join(format!("{}_filter_conditions.txt", dashboard.id));
    dm_core::write_text_atomic(&path, &body).map_err(PhaseError::from)
}

fn aggregated_sql(dashboard: &DashboardRecord) -> String {
    dashboard
        .charts_with_sql()
        .map(|chart| chart.sql_query.clone().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn aggregated_metrics(dashboard: &DashboardRecord) -> serde_json::Value {
    let metrics: Vec<_> = dashboard.charts.iter().flat_map(|chart| chart.metrics.clone()).collect();
    serde_json::to_value(metrics).unwrap_or(serde_json::Value::Null)
}
