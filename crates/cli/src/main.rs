//! `blockflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `run`: execute a `{blocks, connections}` graph file.
//! - `validate`: check a graph file without executing it.
//! - `operations`: list every built-in connector and its operations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use connectors::{builtin_registry, BuiltinSettings, FallbackMode, RemoteSettings};
use engine::{
    find_cycle, select_start_block, validate_graph, EngineConfig, ExecutionStore, Orchestrator,
    RunOptions, TraversalPolicy, WorkflowGraph,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blockflow", about = "Block-based workflow execution engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a workflow graph and print the run summary as JSON.
    Run {
        /// Path to the `{blocks, connections}` JSON file.
        path: PathBuf,
        /// Start at this block instead of the first trigger.
        #[arg(long)]
        start: Option<String>,
        /// `continue` (only failed conditions halt) or `halt` (any failure halts).
        #[arg(long, default_value = "continue")]
        policy: TraversalPolicy,
        /// Fail any block that runs longer than this.
        #[arg(long)]
        block_timeout_secs: Option<u64>,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Validate a workflow graph file.
    Validate {
        /// Path to the `{blocks, connections}` JSON file.
        path: PathBuf,
    },
    /// Print the connector catalog (application → operations).
    Operations,
}

/// Remote API settings for the built-in connectors.
#[derive(Args)]
struct RemoteArgs {
    #[arg(long, env = "BLOCKFLOW_NOTES_URL")]
    notes_url: Option<String>,
    #[arg(long, env = "BLOCKFLOW_NOTES_TOKEN", hide_env_values = true)]
    notes_token: Option<String>,
    #[arg(long, env = "BLOCKFLOW_AI_URL")]
    ai_url: Option<String>,
    #[arg(long, env = "BLOCKFLOW_AI_TOKEN", hide_env_values = true)]
    ai_token: Option<String>,
    #[arg(long, env = "BLOCKFLOW_DESIGN_URL")]
    design_url: Option<String>,
    #[arg(long, env = "BLOCKFLOW_DESIGN_TOKEN", hide_env_values = true)]
    design_token: Option<String>,
    /// Per-request timeout for remote calls.
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,
    /// Fail unreachable or unconfigured remote calls instead of simulating them.
    #[arg(long)]
    no_simulate: bool,
}

impl RemoteArgs {
    fn settings(&self) -> BuiltinSettings {
        let fallback = if self.no_simulate {
            FallbackMode::Fail
        } else {
            FallbackMode::Simulate
        };
        let remote = |base_url: &Option<String>, api_token: &Option<String>| RemoteSettings {
            base_url: base_url.clone(),
            api_token: api_token.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            fallback,
        };

        BuiltinSettings {
            notes: remote(&self.notes_url, &self.notes_token),
            ai_text: remote(&self.ai_url, &self.ai_token),
            design_file: remote(&self.design_url, &self.design_token),
            webhook: remote(&None, &None),
        }
    }
}

fn load_graph(path: &Path) -> anyhow::Result<WorkflowGraph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid graph JSON in {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            path,
            start,
            policy,
            block_timeout_secs,
            remote,
        } => {
            let graph = load_graph(&path)?;

            let mut config = EngineConfig::default().with_policy(policy);
            if let Some(secs) = block_timeout_secs {
                config = config.with_block_timeout(Duration::from_secs(secs));
            }
            let orchestrator = Arc::new(Orchestrator::new(
                builtin_registry(remote.settings()),
                Arc::new(ExecutionStore::new()),
                config,
            ));

            let interrupt = {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupt received, cancelling run");
                        let cancelled = orchestrator.cancel_all_executions();
                        info!(cancelled, "executions cancelled");
                    }
                })
            };

            info!(path = %path.display(), blocks = graph.blocks.len(), "running workflow");
            let options = RunOptions {
                start_block_id: start,
                policy: None,
            };
            let result = orchestrator.execute_graph(&graph, options).await;
            interrupt.abort();

            let summary = result.context("workflow run rejected")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);

            Ok(if summary.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Validate { path } => {
            let graph = load_graph(&path)?;

            if let Err(e) = validate_graph(&graph.blocks, &graph.connections) {
                eprintln!("❌ Validation failed: {e}");
                return Ok(ExitCode::FAILURE);
            }
            println!(
                "✅ {} blocks, {} connections",
                graph.blocks.len(),
                graph.connections.len()
            );

            match select_start_block(&graph.blocks, None) {
                Ok(block) => println!("   start block: {}", block.id),
                Err(e) => println!("⚠️  {e}"),
            }
            if let Some(cycle) = find_cycle(&graph.blocks, &graph.connections) {
                println!(
                    "⚠️  cycle: {} (re-entry will be skipped at run time)",
                    cycle.join(" -> ")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Operations => {
            let catalog = builtin_registry(BuiltinSettings::default()).catalog();
            println!("{}", serde_json::to_string_pretty(&catalog)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
