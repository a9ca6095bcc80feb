//! End-to-end coverage of the REST façade: binds the real router to an
//! ephemeral port and drives it with `reqwest`, a live client against a
//! real in-process server.

use std::sync::Arc;

use dm_core::CancellationToken;
use dm_dashboard_source::{DashboardSourceConfig, DashboardSourceTransport};
use dm_llm::{GatewayConfig, LlmGatewayHandle, ProviderKind};
use dm_pipeline::{ExtractionStrategy, PipelineConfig};
use dm_progress::ProgressTracker;
use dm_schema_source::{SchemaSourceConfig, SchemaSourceTransport};
use dm_server::state::{AppState, RunLock};
use dm_validator::TableValidatorConfig;
use tokio::net::TcpListener;

fn state(base_dir: std::path::PathBuf) -> Arc<AppState> {
    let dashboard_transport = DashboardSourceTransport::new(DashboardSourceConfig {
        api_base: "https://unused.example.com".to_string(),
        session_cookie: "session=x".to_string(),
        csrf_token: "token".to_string(),
        request_timeout_ms: 1_000,
        max_retries: 1,
    })
    .expect("dashboard transport");
    let schema_transport = SchemaSourceTransport::new(SchemaSourceConfig {
        api_base: "https://unused.example.com".to_string(),
        request_timeout_ms: 1_000,
        max_retries: 1,
        max_workers: 2,
    })
    .expect("schema transport");
    let gateway = LlmGatewayHandle::new_standalone(GatewayConfig {
        provider: ProviderKind::ProviderA,
        model: "model-x".to_string(),
        base_url: "https://unused.example.com".to_string(),
        api_key: "test-key".to_string(),
        max_tokens: 256,
        temperature: 0.0,
        request_timeout_ms: 1_000,
        max_retries: 1,
    })
    .expect("standalone gateway");
    let pipeline_config = PipelineConfig {
        base_dir: base_dir.clone(),
        default_catalog: "hive".to_string(),
        max_workers_charts: 2,
        extraction_strategy: ExtractionStrategy::RuleBasedOnly,
        enable_table_validation: false,
        enable_schema_enrichment: false,
        catalog_table: "overall_tables".to_string(),
    };
    let progress = ProgressTracker::load_or_init(pipeline_config.progress_path()).expect("progress tracker");

    Arc::new(AppState {
        dashboard_transport,
        schema_transport,
        gateway,
        pipeline_config,
        validator_config: TableValidatorConfig::default(),
        max_workers_dashboards: 2,
        progress,
        cancellation: CancellationToken::new(),
        run_lock: RunLock::default(),
    })
}

async fn spawn_server(state: Arc<AppState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = dm_server::router::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn progress_endpoint_returns_the_current_snapshot() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let base = spawn_server(state(tempdir.path().to_path_buf())).await;

    let response = reqwest::get(format!("{base}/progress")).await.expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["overall_status"], serde_json::json!("idle"));
}

#[tokio::test]
async fn files_endpoint_404s_for_an_unknown_dashboard() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let base = spawn_server(state(tempdir.path().to_path_buf())).await;

    let response = reqwest::get(format!("{base}/dashboards/964/files")).await.expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn process_endpoint_accepts_a_request_when_idle() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let base = spawn_server(state(tempdir.path().to_path_buf())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/dashboards/process"))
        .json(&serde_json::json!({"ids": [964], "extract": false, "merge": false}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
}

#[tokio::test]
async fn process_endpoint_refuses_a_request_while_a_run_is_already_in_progress() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let shared = state(tempdir.path().to_path_buf());
    assert!(shared.run_lock.try_acquire());
    let base = spawn_server(shared).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/dashboards/process"))
        .json(&serde_json::json!({"ids": [964]}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
}

#[tokio::test]
async fn process_endpoint_rejects_an_empty_id_list() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let base = spawn_server(state(tempdir.path().to_path_buf())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/dashboards/process"))
        .json(&serde_json::json!({"ids": []}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn knowledge_base_download_404s_until_a_build_has_run() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let base = spawn_server(state(tempdir.path().to_path_buf())).await;

    let response = reqwest::get(format!("{base}/knowledge-base/download")).await.expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}
