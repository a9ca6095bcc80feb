//! Phase 5 — Column Metadata: one `describe_column` LLM
//! call per distinct `(table, column)` pair, bounded by a worker pool,
//! writing `columns_metadata.csv`.

use std::sync::Arc;

use dm_llm::LlmGatewayHandle;
use dm_model::{ColumnMetadata, DashboardRecord, TableColumnRow};
use tokio::sync::Semaphore;
use tracing::warn;

pub async fn run(
    gateway: &LlmGatewayHandle,
    dashboard: &DashboardRecord,
    rows: &[TableColumnRow],
    max_workers: usize,
) -> Vec<ColumnMetadata> {
    let pairs = distinct_pairs(rows);
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut handles = Vec::with_capacity(pairs.len());

    for (table, column) in pairs {
        let gateway = gateway.clone();
        let datatype = rows
            .iter()
            .find(|row| row.table_name == table && row.column_name == column)
            .and_then(|row| row.datatype.clone());
        let chart_labels = chart_labels_for(&table, &column, rows);
        let sql_usage = sql_usage_for(&table, dashboard);
        let required_flag = is_required(&column, &table, dashboard);
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let result = dm_llm::prompts::describe_column(
                &gateway,
                &column,
                &table,
                datatype.as_deref(),
                &chart_labels,
                &sql_usage,
            )
            .await;
            (table, column, datatype, required_flag, result)
        }));
    }

    let mut metadata = Vec::new();
    for handle in handles {
        let Ok((table, column, datatype, required_flag, result)) = handle.await else {
            continue;
        };
        match result {
            Ok(output) => metadata.push(ColumnMetadata {
                table_name: table,
                column_name: column,
                variable_type: datatype.unwrap_or_default(),
                column_description: output.description,
                required_flag,
            }),
            Err(error) => {
                warn!(table, column, error = %error, "phase 5: describe_column failed, pair omitted from columns_metadata.csv");
            }
        }
    }
    metadata
}

fn distinct_pairs(rows: &[TableColumnRow]) -> Vec<(String, String)> {
    let mut pairs: std::collections::BTreeSet<(String, String)> = std::collections::BTreeSet::new();
    for row in rows {
        if row.table_name.is_empty() {
            continue;
        }
        pairs.insert((row.table_name.clone(), row.column_name.clone()));
    }
    pairs.into_iter().collect()
}

fn chart_labels_for(table: &str, column: &str, rows: &[TableColumnRow]) -> Vec<String> {
    rows.iter()
        .filter(|row| row.table_name == table && row.column_name == column)
        .map(|row| row.chart_label.clone())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn sql_usage_for(table: &str, dashboard: &DashboardRecord) -> String {
    let local = table.rsplit('.').next().unwrap_or(table);
    dashboard
        .charts_with_sql()
        .find(|chart| chart.sql_query.as_deref().is_some_and(|sql| sql.contains(local)))
        .and_then(|chart| chart.sql_query.clone())
        .unwrap_or_default()
}

/// Heuristic: a column is provisionally "required" if some chart groups by
/// it, since that's the only local signal this phase has of the column
/// being a load-bearing dimension rather than incidental. The merge engine
/// later combines this across dashboards (any source saying required wins),
/// so a false negative here is correctable; a false positive is not, so
/// this stays conservative.
fn is_required(column: &str, table: &str, dashboard: &DashboardRecord) -> bool {
    let local = table.rsplit('.').next().unwrap_or(table);
    dashboard.charts_with_sql().any(|chart| {
        chart.database_name.contains(local) || chart.sql_query.as_deref().unwrap_or_default().contains(local)
    }) && dashboard.charts.iter().any(|chart| chart.groupby_columns.iter().any(|c| c == column))
}
