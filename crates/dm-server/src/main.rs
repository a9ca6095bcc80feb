//! CLI entry point: `serve` runs the REST façade; `process` drives one
//! run to completion and exits with a code reflecting the outcome: 0
//! success, 1 usage, 2 upstream-auth failure, 3 partial, 4 total
//! failure.

use std::collections::HashMap;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dm_pipeline::DashboardMode;
use dm_server::config::AppConfig;
use dm_server::run::{self, ProcessRequest, RunOutcome};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dm-server", about = "BI dashboard metadata extraction and merge pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the REST façade.
    Serve {
        #[arg(long, env = "DM_SERVER_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Runs one extraction/merge/knowledge-base pass to completion, then exits.
    Process {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,
        #[arg(long, default_value_t = true)]
        extract: bool,
        #[arg(long, default_value_t = true)]
        merge: bool,
        #[arg(long)]
        build_kb: bool,
        /// `id=fresh` or `id=use_existing`, comma-separated; unlisted ids default to fresh.
        #[arg(long, value_delimiter = ',')]
        mode: Vec<String>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::builder().with_default_directive(LevelFilter::WARN.into()).from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).compact().init();
}

fn parse_modes(entries: &[String]) -> Result<HashMap<i64, DashboardMode>> {
    let mut modes = HashMap::with_capacity(entries.len());
    for entry in entries {
        let (id, mode) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("--mode entries must be 'id=fresh' or 'id=use_existing', got '{entry}'"))?;
        let id: i64 = id.parse().map_err(|_| anyhow::anyhow!("'{id}' is not a valid dashboard id"))?;
        let mode = match mode {
            "fresh" => DashboardMode::Fresh,
            "use_existing" => DashboardMode::UseExisting,
            other => anyhow::bail!("mode must be 'fresh' or 'use_existing', got '{other}'"),
        };
        modes.insert(id, mode);
    }
    Ok(modes)
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let exit_code = match run_cli(cli).await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(error = %error, "dm-server: fatal error");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run_cli(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Serve { bind } => {
            let config = AppConfig::from_env()?;
            let state = dm_server::build_state(config).await?;
            dm_server::serve(state, &bind).await?;
            Ok(0)
        }
        Command::Process { ids, extract, merge, build_kb, mode } => {
            if ids.is_empty() {
                eprintln!("--ids must name at least one dashboard id");
                return Ok(1);
            }
            let modes = parse_modes(&mode)?;
            let config = AppConfig::from_env()?;
            let state = dm_server::build_state(config).await?;

            if !state.run_lock.try_acquire() {
                eprintln!("a run is already in progress");
                return Ok(1);
            }

            let request = ProcessRequest { dashboard_ids: ids, extract, merge, build_kb, modes };
            let outcome = run::run(state, request).await;
            Ok(match outcome {
                RunOutcome::AllSucceeded => 0,
                RunOutcome::AuthFailure => 2,
                RunOutcome::Partial => 3,
                RunOutcome::TotalFailure => 4,
            })
        }
    }
}
