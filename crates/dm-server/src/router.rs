//! Router wiring for the REST façade, following
//! `build_gateway_openresponses_router`'s route/state wiring shape.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{files, knowledge_base, process, progress};
use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/dashboards/process", post(process::handle_process))
        .route("/progress", get(progress::handle_progress))
        .route("/dashboards/{id}/files", get(files::handle_files))
        .route("/dashboards/{id}/file/{type}", get(files::handle_file_parsed))
        .route("/dashboards/{id}/download/{type}", get(files::handle_file_download))
        .route("/knowledge-base/download", get(knowledge_base::handle_knowledge_base_download))
        .with_state(state)
}
