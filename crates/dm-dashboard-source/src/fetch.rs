//! `fetch_dashboard` / `fetch_dashboards_by_tags` — the client's two operations.

use dm_model::{ChartRecord, ChartType, DashboardRecord, DashboardSummary, Filter, Metric, TimeRange};
use tracing::debug;

use crate::client::DashboardSourceTransport;
use crate::error::DashboardSourceError;
use crate::wire::{ChartDataResponse, ChartMetadataResponse, DashboardHeaderResponse, DashboardSummaryResponse, DatasetResponse, MetricResponse};

pub async fn fetch_dashboard(
    transport: &DashboardSourceTransport,
    id: i64,
) -> Result<DashboardRecord, DashboardSourceError> {
    let header: DashboardHeaderResponse = transport.get_json(&format!("/api/v1/dashboard/{id}")).await?;

    let mut charts = Vec::with_capacity(header.chart_ids.len());
    for chart_id in &header.chart_ids {
        match fetch_chart(transport, *chart_id).await {
            Ok(chart) => charts.push(chart),
            Err(error) if !error.is_run_fatal() => {
                debug!(chart_id, error = %error, "skipping chart that failed to fetch");
            }
            Err(error) => return Err(error),
        }
    }

    Ok(DashboardRecord {
        id: header.id,
        title: header.dashboard_title,
        url: header.url,
        owner: header.owner,
        created_at: header.created_on_utc,
        changed_at: header.changed_on_utc,
        charts,
    })
}

async fn fetch_chart(transport: &DashboardSourceTransport, chart_id: i64) -> Result<ChartRecord, DashboardSourceError> {
    let metadata: ChartMetadataResponse = transport.get_json(&format!("/api/v1/chart/{chart_id}")).await?;
    let sql_query = resolve_chart_sql(transport, chart_id, metadata.datasource_id).await;

    let metrics = metadata
        .params
        .metrics
        .into_iter()
        .map(|metric| match metric {
            MetricResponse::Label(label) => Metric { label, expression: String::new(), aggregate: None },
            MetricResponse::Expression { label, sql_expression, expression_type, aggregate } => Metric {
                label,
                expression: sql_expression.unwrap_or_else(|| expression_type.unwrap_or_default()),
                aggregate,
            },
        })
        .collect();

    let filters = metadata
        .params
        .adhoc_filters
        .into_iter()
        .map(|filter| Filter { column: filter.subject, operator: filter.operator, value: filter.comparator })
        .collect();

    let time_range = metadata.params.time_range.map(|raw_range| {
        let (since, until) = split_time_range(&raw_range);
        TimeRange {
            column: metadata.params.granularity_sqla.clone().unwrap_or_default(),
            since,
            until,
            grain: metadata.params.time_grain_sqla.clone(),
        }
    });

    Ok(ChartRecord {
        chart_id: metadata.id,
        chart_name: metadata.slice_name,
        chart_type: parse_chart_type(&metadata.viz_type),
        dataset_id: metadata.datasource_id,
        dataset_name: metadata.datasource_name,
        database_name: metadata.database_name.unwrap_or_default(),
        sql_query,
        metrics,
        columns: metadata.params.columns,
        groupby_columns: metadata.params.groupby,
        filters,
        time_range,
    })
}

/// Tries the chart-exec endpoint first (may contain executed SQL),
/// falling back to the dataset's stored query template. If both fail, the
/// chart keeps `sql_query = None`.
async fn resolve_chart_sql(transport: &DashboardSourceTransport, chart_id: i64, dataset_id: i64) -> Option<String> {
    let chart_exec: Result<ChartDataResponse, _> = transport.get_json(&format!("/api/v1/chart/{chart_id}/data")).await;
    if let Ok(response) = chart_exec {
        if let Some(query) = response.query.filter(|query| !query.trim().is_empty()) {
            return Some(query);
        }
    }

    let dataset: Result<DatasetResponse, _> = transport.get_json(&format!("/api/v1/dataset/{dataset_id}")).await;
    dataset.ok().and_then(|response| response.sql).filter(|sql| !sql.trim().is_empty())
}

/// Splits a BI service time-range string of the form `"since : until"` into
/// its two halves. Ranges expressed as a relative keyword (e.g. "Last week")
/// have no `:` separator and are returned as `(Some(raw), None)`.
fn split_time_range(raw: &str) -> (Option<String>, Option<String>) {
    match raw.split_once(" : ") {
        Some((since, until)) => {
            let since = since.trim();
            let until = until.trim();
            (
                (!since.is_empty()).then(|| since.to_string()),
                (!until.is_empty()).then(|| until.to_string()),
            )
        }
        None => (Some(raw.trim().to_string()), None),
    }
}

fn parse_chart_type(raw: &str) -> ChartType {
    match raw.to_ascii_lowercase().as_str() {
        "table" => ChartType::Table,
        "line" | "echarts_timeseries_line" => ChartType::Line,
        "bar" | "echarts_timeseries_bar" | "dist_bar" => ChartType::Bar,
        "pie" => ChartType::Pie,
        "big_number" | "big_number_total" => ChartType::BigNumber,
        "area" | "echarts_area" => ChartType::Area,
        "scatter" => ChartType::Scatter,
        _ => ChartType::Other,
    }
}

/// Lists dashboards matching any of `tags` (case-insensitive), ordering
/// sub-vertical tags ahead of vertical tags when a dashboard carries both.
/// "sub-vertical" tags are those prefixed `sv:`; "vertical" tags are
/// prefixed `v:`.
pub async fn fetch_dashboards_by_tags(
    transport: &DashboardSourceTransport,
    tags: &[String],
) -> Result<Vec<DashboardSummary>, DashboardSourceError> {
    let wanted: Vec<String> = tags.iter().map(|tag| tag.to_ascii_lowercase()).collect();
    let query = wanted.join(",");
    let responses: Vec<DashboardSummaryResponse> = transport
        .get_json(&format!("/api/v1/dashboard/?tags={query}"))
        .await?;

    let mut summaries: Vec<DashboardSummary> = responses
        .into_iter()
        .filter(|dashboard| {
            dashboard
                .tags
                .iter()
                .any(|tag| wanted.contains(&tag.to_ascii_lowercase()))
        })
        .map(|dashboard| DashboardSummary { id: dashboard.id, title: dashboard.dashboard_title, tags: dashboard.tags })
        .collect();

    summaries.sort_by_key(|summary| std::cmp::Reverse(tag_precedence(&summary.tags)));
    Ok(summaries)
}

fn tag_precedence(tags: &[String]) -> u8 {
    let has_sub_vertical = tags.iter().any(|tag| tag.starts_with("sv:"));
    let has_vertical = tags.iter().any(|tag| tag.starts_with("v:"));
    match (has_sub_vertical, has_vertical) {
        (true, _) => 2,
        (false, true) => 1,
        (false, false) => 0,
    }
}
