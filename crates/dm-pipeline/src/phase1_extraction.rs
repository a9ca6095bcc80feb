//! Phase 1 — Dashboard Extraction: fetches the
//! dashboard via the Dashboard Source Client and writes its three
//! artifacts: `<id>_json.json` (the full `DashboardRecord`),
//! `<id>_csv.csv` (a flat per-chart summary), and `<id>_queries.sql` (a
//! labeled dump of every chart's SQL). Serial — there is exactly one
//! dashboard fetch per run of this phase.

use std::path::Path;

use anyhow::{Context, Result};
use dm_model::DashboardRecord;

use crate::error::PhaseError;

const CHART_SUMMARY_HEADER: [&str; 7] =
    ["chart_id", "chart_name", "chart_type", "dataset_id", "dataset_name", "database_name", "has_sql"];

pub async fn run(
    transport: &dm_dashboard_source::DashboardSourceTransport,
    dashboard_id: i64,
    dir: &Path,
) -> Result<DashboardRecord, PhaseError> {
    let record = dm_dashboard_source::fetch_dashboard(transport, dashboard_id).await?;

    write_json(dir, dashboard_id, &record)?;
    write_chart_summary_csv(dir, dashboard_id, &record)?;
    write_queries_sql(dir, dashboard_id, &record)?;

    Ok(record)
}

fn write_json(dir: &Path, dashboard_id: i64, record: &DashboardRecord) -> Result<()> {
    let path = dir.join(format!("{dashboard_id}_json.json"));
    let body = serde_json::to_string_pretty(record).context("serializing dashboard record")?;
    dm_core::write_text_atomic(&path, &body)
}

fn write_chart_summary_csv(dir: &Path, dashboard_id: i64, record: &DashboardRecord) -> Result<()> {
    let path = dir.join(format!("{dashboard_id}_csv.csv"));
    let mut buffer = Vec::new();
    {
        let mut writer = csv::WriterBuilder::new().from_writer(&mut buffer);
        writer.write_record(CHART_SUMMARY_HEADER)?;
        for chart in &record.charts {
            writer.write_record([
                chart.chart_id.to_string(),
                chart.chart_name.clone(),
                format!("{:?}", chart.chart_type),
                chart.dataset_id.to_string(),
                chart.dataset_name.clone(),
                chart.database_name.clone(),
                chart.has_sql().to_string(),
            ])?;
        }
        writer.flush()?;
    }
    let content = String::from_utf8(buffer).context("chart summary csv was not valid utf-8")?;
    dm_core::write_text_atomic(&path, &content)
}

fn write_queries_sql(dir: &Path, dashboard_id: i64, record: &DashboardRecord) -> Result<()> {
    let path = dir.join(format!("{dashboard_id}_queries.sql"));
    let mut body = String::new();
    for chart in &record.charts {
        let Some(sql) = chart.sql_query.as_deref().filter(|sql| !sql.trim().is_empty()) else {
            continue;
        };
        body.push_str(&format!("-- chart_id={} chart_name={}\n", chart.chart_id, chart.chart_name));
        body.push_str(sql.trim());
        body.push_str("\n\n");
    }
    dm_core::write_text_atomic(&path, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_model::{ChartRecord, ChartType};

    fn sample_record() -> DashboardRecord {
        DashboardRecord {
            id: 964,
            title: "UPI Traffic Dashboard".to_string(),
            url: "https://bi.example.com/d/964".to_string(),
            owner: "analytics-team".to_string(),
            created_at: chrono::Utc::now(),
            changed_at: chrono::Utc::now(),
            charts: vec![ChartRecord {
                chart_id: 1,
                chart_name: "Daily Volume".to_string(),
                chart_type: ChartType::Line,
                dataset_id: 10,
                dataset_name: "upi_transactions".to_string(),
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
    fn writes_json_csv_and_sql_artifacts() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let record = sample_record();

        write_json(tempdir.path(), 964, &record).expect("json");
        write_chart_summary_csv(tempdir.path(), 964, &record).expect("csv");
        write_queries_sql(tempdir.path(), 964, &record).expect("sql");

        assert!(tempdir.path().join("964_json.json").exists());
        let csv_content = std::fs::read_to_string(tempdir.path().join("964_csv.csv")).expect("read csv");
        assert!(csv_content.contains("Daily Volume"));
        let sql_content = std::fs::read_to_string(tempdir.path().join("964_queries.sql")).expect("read sql");
        assert!(sql_content.contains("SELECT amount FROM sales.orders"));
    }

    #[test]
    fn queries_sql_omits_charts_without_sql() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let mut record = sample_record();
        record.charts.push(ChartRecord {
            chart_id: 2,
            chart_name: "No SQL Chart".to_string(),
            chart_type: ChartType::BigNumber,
            dataset_id: 11,
            dataset_name: "other".to_string(),
            database_name: "hive".to_string(),
            sql_query: None,
            metrics: vec![],
            columns: vec![],
            groupby_columns: vec![],
            filters: vec![],
            time_range: None,
        });

        write_queries_sql(tempdir.path(), 964, &record).expect("sql");
        let sql_content = std::fs::read_to_string(tempdir.path().join("964_queries.sql")).expect("read sql");
        assert!(!sql_content.contains("No SQL Chart"));
    }
}
