//! `GET /knowledge-base/download`: serves the pre-built knowledge-base
//! ZIP; 404 if `build_kb` has never produced one.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::error::ApiError;
use crate::state::SharedState;

pub async fn handle_knowledge_base_download(State(state): State<SharedState>) -> axum::response::Response {
    let path = state.pipeline_config.merged_dir().join("knowledge_base.zip");
    match std::fs::read(&path) {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "application/zip"), (header::CONTENT_DISPOSITION, "attachment; filename=\"knowledge_base.zip\"")],
            bytes,
        )
            .into_response(),
        Err(_) => ApiError::not_found("knowledge_base_not_built", "the knowledge base has not been built yet").into_response(),
    }
}
