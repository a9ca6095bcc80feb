//! `POST /dashboards/process`: spawns a background run and returns
//! immediately; progress is observed via `GET /progress`.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use dm_pipeline::DashboardMode;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::run::{self, ProcessRequest};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct ProcessBody {
    ids: Vec<i64>,
    #[serde(default = "default_true")]
    extract: bool,
    #[serde(default = "default_true")]
    merge: bool,
    #[serde(default)]
    build_kb: bool,
    #[serde(default)]
    modes: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn parse_mode(value: &str) -> Result<DashboardMode, ApiError> {
    match value {
        "fresh" => Ok(DashboardMode::Fresh),
        "use_existing" => Ok(DashboardMode::UseExisting),
        other => Err(ApiError::bad_request("invalid_mode", format!("mode must be 'fresh' or 'use_existing', got '{other}'"))),
    }
}

pub async fn handle_process(State(state): State<SharedState>, Json(body): Json<ProcessBody>) -> axum::response::Response {
    if body.ids.is_empty() {
        return ApiError::bad_request("empty_ids", "ids must contain at least one dashboard id").into_response();
    }

    let mut modes = HashMap::with_capacity(body.modes.len());
    for (id, mode) in &body.modes {
        let id: i64 = match id.parse() {
            Ok(id) => id,
            Err(_) => return ApiError::bad_request("invalid_mode_key", format!("'{id}' is not a valid dashboard id")).into_response(),
        };
        match parse_mode(mode) {
            Ok(mode) => {
                modes.insert(id, mode);
            }
            Err(error) => return error.into_response(),
        }
    }

    if !state.run_lock.try_acquire() {
        return ApiError::new(axum::http::StatusCode::CONFLICT, "run_in_progress", "a run is already in progress").into_response();
    }

    let request = ProcessRequest { dashboard_ids: body.ids, extract: body.extract, merge: body.merge, build_kb: body.build_kb, modes };
    let spawned_state = state.clone();
    tokio::spawn(async move {
        run::run(spawned_state, request).await;
    });

    (StatusCode::ACCEPTED, Json(json!({"status": "accepted"}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mode_accepts_the_two_documented_values() {
        assert_eq!(parse_mode("fresh").unwrap(), DashboardMode::Fresh);
        assert_eq!(parse_mode("use_existing").unwrap(), DashboardMode::UseExisting);
        assert!(parse_mode("stale").is_err());
    }

    #[test]
    fn process_body_defaults_extract_and_merge_to_true() {
        let body: ProcessBody = serde_json::from_str(r#"{"ids": [1, 2]}"#).expect("deserialize");
        assert!(body.extract);
        assert!(body.merge);
        assert!(!body.build_kb);
        assert!(body.modes.is_empty());
    }
}
