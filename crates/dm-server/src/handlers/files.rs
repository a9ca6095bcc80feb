//! `GET /dashboards/{id}/files`, `GET /dashboards/{id}/file/{type}`, and
//! `GET /dashboards/{id}/download/{type}`: list, parse, and raw-serve
//! a dashboard's per-phase artifacts.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::ApiError;
use crate::state::SharedState;

/// `(type name, filename suffix, extension)` for every artifact a
/// dashboard directory can hold.
const ARTIFACT_TYPES: &[(&str, &str, &str)] = &[
    ("json", "json", "json"),
    ("csv", "csv", "csv"),
    ("queries", "queries", "sql"),
    ("tables_columns", "tables_columns", "csv"),
    ("tables_columns_enriched", "tables_columns_enriched", "csv"),
    ("table_metadata", "table_metadata", "csv"),
    ("columns_metadata", "columns_metadata", "csv"),
    ("joining_conditions", "joining_conditions", "csv"),
    ("filter_conditions", "filter_conditions", "txt"),
    ("definitions", "definitions", "csv"),
];

fn resolve(dashboard_id: i64, artifact_type: &str) -> Option<(std::path::PathBuf, &'static str)> {
    ARTIFACT_TYPES.iter().find(|(name, _, _)| *name == artifact_type).map(|(_, suffix, extension)| {
        (std::path::PathBuf::from(format!("{dashboard_id}_{suffix}.{extension}")), *extension)
    })
}

pub async fn handle_files(
    State(state): State<SharedState>,
    Path(dashboard_id): Path<i64>,
) -> axum::response::Response {
    let dir = state.pipeline_config.dashboard_dir(dashboard_id);
    if !dir.exists() {
        return ApiError::not_found("dashboard_not_found", format!("no artifacts for dashboard {dashboard_id}")).into_response();
    }

    let mut files = Vec::new();
    for (artifact_type, suffix, extension) in ARTIFACT_TYPES {
        let path = dir.join(format!("{dashboard_id}_{suffix}.{extension}"));
        if let Ok(metadata) = std::fs::metadata(&path) {
            files.push(json!({
                "type": artifact_type,
                "file_name": path.file_name().and_then(|name| name.to_str()),
                "size_bytes": metadata.len(),
            }));
        }
    }

    Json(json!({ "dashboard_id": dashboard_id, "files": files })).into_response()
}

pub async fn handle_file_parsed(
    State(state): State<SharedState>,
    Path((dashboard_id, artifact_type)): Path<(i64, String)>,
) -> axum::response::Response {
    let Some((file_name, extension)) = resolve(dashboard_id, &artifact_type) else {
        return ApiError::bad_request("unknown_artifact_type", format!("unknown artifact type '{artifact_type}'")).into_response();
    };
    let path = state.pipeline_config.dashboard_dir(dashboard_id).join(file_name);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return ApiError::not_found("artifact_not_found", format!("artifact '{artifact_type}' not found for dashboard {dashboard_id}")).into_response(),
    };

    match extension {
        "json" => match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => Json(value).into_response(),
            Err(error) => ApiError::internal(format!("malformed json artifact: {error}")).into_response(),
        },
        "csv" => match parse_csv_rows(&content) {
            Ok(parsed) => Json(parsed).into_response(),
            Err(error) => ApiError::internal(format!("malformed csv artifact: {error}")).into_response(),
        },
        _ => Json(json!({ "content": content })).into_response(),
    }
}

fn parse_csv_rows(content: &str) -> anyhow::Result<serde_json::Value> {
    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(json!({ "header": header, "rows": rows }))
}

pub async fn handle_file_download(
    State(state): State<SharedState>,
    Path((dashboard_id, artifact_type)): Path<(i64, String)>,
) -> axum::response::Response {
    let Some((file_name, extension)) = resolve(dashboard_id, &artifact_type) else {
        return ApiError::bad_request("unknown_artifact_type", format!("unknown artifact type '{artifact_type}'")).into_response();
    };
    let path = state.pipeline_config.dashboard_dir(dashboard_id).join(&file_name);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(_) => return ApiError::not_found("artifact_not_found", format!("artifact '{artifact_type}' not found for dashboard {dashboard_id}")).into_response(),
    };

    let content_type = match extension {
        "json" => "application/json",
        "csv" => "text/csv",
        _ => "text/plain",
    };
    (
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, "attachment")],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_maps_every_documented_artifact_type() {
        for (artifact_type, _, _) in ARTIFACT_TYPES {
            assert!(resolve(964, artifact_type).is_some());
        }
        assert!(resolve(964, "not_a_type").is_none());
    }

    #[test]
    fn parse_csv_rows_splits_header_from_data() {
        let parsed = parse_csv_rows("table_name,vertical\nhive.sales.orders,sales\n").expect("parse");
        assert_eq!(parsed["header"], json!(["table_name", "vertical"]));
        assert_eq!(parsed["rows"], json!([["hive.sales.orders", "sales"]]));
    }
}
