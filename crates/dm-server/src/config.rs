//! Env-var configuration, read once at process startup for both the
//! `serve` and `process` CLI subcommands.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use dm_dashboard_source::DashboardSourceConfig;
use dm_llm::{GatewayConfig, ProviderKind};
use dm_pipeline::config::{ExtractionStrategy, PipelineConfig};
use dm_schema_source::SchemaSourceConfig;
use dm_validator::TableValidatorConfig;

fn env_string(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required environment variable {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => bail!("{key} must be a boolean, got '{value}'"),
        },
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(value) => value.trim().parse().map_err(|error| anyhow::anyhow!("{key}: {error}")),
    }
}

fn parse_provider(value: &str) -> Result<ProviderKind> {
    match value {
        "provider-a" => Ok(ProviderKind::ProviderA),
        "provider-b" => Ok(ProviderKind::ProviderB),
        other => bail!("LLM_PROVIDER must be 'provider-a' or 'provider-b', got '{other}'"),
    }
}

/// Everything the `serve`/`process` entry points need, assembled once from
/// the environment.
pub struct AppConfig {
    pub dashboard_source: DashboardSourceConfig,
    pub schema_source: SchemaSourceConfig,
    pub gateway: GatewayConfig,
    pub pipeline: PipelineConfig,
    pub validator: TableValidatorConfig,
    pub max_workers_dashboards: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_timeout_seconds: u64 = env_parsed("HTTP_TIMEOUT_SECONDS", 30)?;
        let llm_timeout_seconds: u64 = env_parsed("LLM_TIMEOUT_SECONDS", 120)?;
        let max_workers_charts: usize = env_parsed("MAX_WORKERS_CHARTS", 8)?;
        let max_workers_dashboards: usize = env_parsed("MAX_WORKERS_DASHBOARDS", 5)?;

        let dashboard_source = DashboardSourceConfig {
            api_base: env_string("BI_BASE_URL")?,
            session_cookie: env_string("BI_COOKIE")?,
            csrf_token: env_string("BI_CSRF_TOKEN")?,
            request_timeout_ms: http_timeout_seconds * 1_000,
            max_retries: 5,
        };

        let schema_source = SchemaSourceConfig {
            api_base: env_string("BI_BASE_URL")?,
            request_timeout_ms: http_timeout_seconds * 1_000,
            max_retries: 5,
            max_workers: max_workers_charts,
        };

        let gateway = GatewayConfig {
            provider: parse_provider(&env_string("LLM_PROVIDER")?)?,
            model: env_string("LLM_MODEL")?,
            base_url: env_string("LLM_BASE_URL")?,
            api_key: env_string("LLM_API_KEY")?,
            max_tokens: env_parsed("LLM_MAX_TOKENS", 4096)?,
            temperature: env_parsed("LLM_TEMPERATURE", 0.1)?,
            request_timeout_ms: llm_timeout_seconds * 1_000,
            max_retries: 5,
        };

        let enable_llm_extraction = env_bool("ENABLE_LLM_EXTRACTION", true)?;
        let pipeline = PipelineConfig {
            base_dir: PathBuf::from(env_or("BASE_DIR", "./extracted_meta")),
            default_catalog: "hive".to_string(),
            max_workers_charts,
            extraction_strategy: ExtractionStrategy::from_enable_llm_extraction(enable_llm_extraction),
            enable_table_validation: env_bool("ENABLE_TABLE_VALIDATION", true)?,
            enable_schema_enrichment: env_bool("ENABLE_SCHEMA_ENRICHMENT", true)?,
            catalog_table: "overall_tables".to_string(),
        };

        let validator = TableValidatorConfig { catalog_table: pipeline.catalog_table.clone() };

        Ok(Self { dashboard_source, schema_source, gateway, pipeline, validator, max_workers_dashboards })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_provider_accepts_the_two_documented_values() {
        assert_eq!(parse_provider("provider-a").unwrap(), ProviderKind::ProviderA);
        assert_eq!(parse_provider("provider-b").unwrap(), ProviderKind::ProviderB);
        assert!(parse_provider("provider-c").is_err());
    }

    #[test]
    fn env_bool_accepts_common_truthy_and_falsy_spellings() {
        std::env::set_var("DM_SERVER_TEST_BOOL", "false");
        assert!(!env_bool("DM_SERVER_TEST_BOOL", true).unwrap());
        std::env::set_var("DM_SERVER_TEST_BOOL", "1");
        assert!(env_bool("DM_SERVER_TEST_BOOL", false).unwrap());
        std::env::remove_var("DM_SERVER_TEST_BOOL");
        assert!(env_bool("DM_SERVER_TEST_BOOL", true).unwrap());
    }
}
