//! Phase 6 — Joining Conditions: for every pair of
//! tables that co-occur in the same chart's SQL, one `extract_join_condition`
//! LLM call, bounded by a worker pool, deduplicated across charts, writing
//! `joining_conditions.csv`.

use std::collections::BTreeSet;
use std::sync::Arc;

use dm_llm::prompts::JoiningTypeOutput;
use dm_llm::LlmGatewayHandle;
use dm_model::{DashboardRecord, JoiningCondition, JoiningType, TableColumnRow};
use tokio::sync::Semaphore;
use tracing::warn;

pub async fn run(
    gateway: &LlmGatewayHandle,
    dashboard: &DashboardRecord,
    rows: &[TableColumnRow],
    max_workers: usize,
) -> Vec<JoiningCondition> {
    let pairs = co_occurring_pairs(dashboard, rows);
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut handles = Vec::with_capacity(pairs.len());

    for (table1, table2, sql) in pairs {
        let gateway = gateway.clone();
        let semaphore = Arc::clone(&semaphore);
        let context = serde_json::json!({"dashboard_title": dashboard.title});
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let result = dm_llm::prompts::extract_join_condition(&gateway, &table1, &table2, &sql, &context).await;
            (table1, table2, result)
        }));
    }

    let mut conditions = Vec::new();
    for handle in handles {
        let Ok((table1, table2, result)) = handle.await else {
            continue;
        };
        match result {
            Ok(output) => conditions.push(JoiningCondition {
                table1,
                table2,
                joining_condition: output.joining_condition,
                joining_type: map_joining_type(output.joining_type),
                remarks: output.remarks,
            }),
            Err(error) => {
                warn!(table1, table2, error = %error, "phase 6: extract_join_condition failed, pair omitted from joining_conditions.csv");
            }
        }
    }
    conditions
}

fn map_joining_type(output: JoiningTypeOutput) -> JoiningType {
    match output {
        JoiningTypeOutput::Inner => JoiningType::Inner,
        JoiningTypeOutput::Left => JoiningType::Left,
        JoiningTypeOutput::Right => JoiningType::Right,
        JoiningTypeOutput::Full => JoiningType::Full,
    }
}

/// One entry per distinct, order-normalized `(table1, table2)` pair that
/// shares a chart, carrying that chart's SQL as evidence. If the same pair
/// co-occurs in multiple charts, the first chart encountered wins — later
/// charts contribute nothing new the LLM call would need.
fn co_occurring_pairs(dashboard: &DashboardRecord, rows: &[TableColumnRow]) -> Vec<(String, String, String)> {
    let mut seen = BTreeSet::new();
    let mut pairs = Vec::new();

    for chart in dashboard.charts_with_sql() {
        let tables: BTreeSet<String> = rows
            .iter()
            .filter(|row| row.chart_id == chart.chart_id && !row.table_name.is_empty())
            .map(|row| row.table_name.clone())
            .collect();
        let tables: Vec<String> = tables.into_iter().collect();
        for i in 0..tables.len() {
            for j in (i + 1)..tables.len() {
                let key = (tables[i].clone(), tables[j].clone());
                if seen.insert(key.clone()) {
                    pairs.push((key.0, key.1, chart.sql_query.clone().unwrap_or_default()));
                }
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_model::{ChartRecord, ChartType, SourceOrDerived};

    fn row(chart_id: i64, table: &str) -> TableColumnRow {
        TableColumnRow {
            table_name: table.to_string(),
            column_name: "x".to_string(),
            alias: "x".to_string(),
            source_or_derived: SourceOrDerived::Source,
            derived_logic: None,
            chart_id,
            chart_label: "chart".to_string(),
            datatype: None,
        }
    }

    fn chart(id: i64, sql: &str) -> ChartRecord {
        ChartRecord {
            chart_id: id,
            chart_name: "c".to_string(),
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

    #[test]
    fn pairs_within_a_single_chart_are_paired_once() {
        let dashboard = DashboardRecord {
            id: 1,
            title: "t".to_string(),
            url: String::new(),
            owner: String::new(),
            created_at: chrono::Utc::now(),
            changed_at: chrono::Utc::now(),
            charts: vec![chart(1, "SELECT 1 FROM a JOIN b JOIN c")],
        };
        let rows = vec![row(1, "hive.s.a"), row(1, "hive.s.b"), row(1, "hive.s.c")];
        let pairs = co_occurring_pairs(&dashboard, &rows);
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn single_table_chart_yields_no_pairs() {
        let dashboard = DashboardRecord {
            id: 2,
            title: "t".to_string(),
            url: String::new(),
            owner: String::new(),
            created_at: chrono::Utc::now(),
            changed_at: chrono::Utc::now(),
            charts: vec![chart(1, "SELECT 1 FROM a")],
        };
        let rows = vec![row(1, "hive.s.a")];
        assert!(co_occurring_pairs(&dashboard, &rows).is_empty());
    }
}
