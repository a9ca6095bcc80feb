//! `GET /progress`: returns the current `ProgressState` snapshot.

use axum::extract::State;
use axum::Json;

use crate::state::SharedState;

pub async fn handle_progress(State(state): State<SharedState>) -> Json<dm_model::ProgressState> {
    Json(state.progress.snapshot())
}
