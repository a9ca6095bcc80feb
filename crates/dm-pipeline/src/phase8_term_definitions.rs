//! Phase 8 — Term Definitions: a single aggregated
//! `extract_term_definitions` LLM call over the whole dashboard, writing
//! `definitions.csv`.

use dm_llm::LlmGatewayHandle;
use dm_model::{DashboardRecord, TermDefinition};

pub async fn run(gateway: &LlmGatewayHandle, dashboard: &DashboardRecord) -> Vec<TermDefinition> {
    let chart_names_and_labels = serde_json::to_value(
        dashboard.charts.iter().map(|chart| serde_json::json!({"chart_id": chart.chart_id, "chart_name": chart.chart_name})).collect::<Vec<_>>(),
    )
    .unwrap_or(serde_json::Value::Null);
    let sql = dashboard
        .charts_with_sql()
        .map(|chart| chart.sql_query.clone().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n\n");
    let metrics = serde_json::to_value(dashboard.charts.iter().flat_map(|chart| chart.metrics.clone()).collect::<Vec<_>>())
        .unwrap_or(serde_json::Value::Null);

    match dm_llm::prompts::extract_term_definitions(gateway, &dashboard.title, &chart_names_and_labels, &sql, &metrics).await {
        Ok(output) => output
            .terms
            .into_iter()
            .map(|term| TermDefinition {
                term: term.term,
                term_type: term.term_type,
                definition: term.definition,
                business_alias: term.business_alias,
            })
            .collect(),
        Err(error) => {
            tracing::warn!(dashboard_id = dashboard.id, error = %error, "phase 8: extract_term_definitions failed, definitions.csv will be empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_model::{ChartRecord, ChartType};

    #[test]
    fn builds_without_panicking_on_dashboard_with_no_sql() {
        let dashboard = DashboardRecord {
            id: 1,
            title: "t".to_string(),
            url: String::new(),
            owner: String::new(),
            created_at: chrono::Utc::now(),
            changed_at: chrono::Utc::now(),
            charts: vec![ChartRecord {
                chart_id: 1,
                chart_name: "A".to_string(),
                chart_type: ChartType::Table,
                dataset_id: 1,
                dataset_name: "ds".to_string(),
                database_name: "hive".to_string(),
                sql_query: None,
                metrics: vec![],
                columns: vec![],
                groupby_columns: vec![],
                filters: vec![],
                time_range: None,
            }],
        };
        assert_eq!(dashboard.charts_with_sql().count(), 0);
    }
}
