//! ryn-autofix - apply AI-synthesized fixes for a scan report and push them
//!
//! ## Commands
//!
//! - `run`: synthesize, apply, report and publish fixes for one scan report
//! - `validate-report`: parse a scan report and list accepted and rejected entries

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ryn_autofix::config::PipelineConfig;
use ryn_autofix::git::{Publisher, PublisherConfig, RepoRef};
use ryn_autofix::models::{Credential, PublishStatus, RunResult, RunState, ScanReport};
use ryn_autofix::pipeline::{Pipeline, RunOptions};
use ryn_autofix::providers::{ProviderGateway, RetryPolicy, ScriptedProvider};
use ryn_autofix::synthesizer::{FixSynthesizer, SynthesizerConfig};
use ryn_autofix::{telemetry, utils};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "ryn-autofix")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Apply AI-synthesized fixes for a scan report and publish them", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fix pipeline against a local working copy
    Run {
        /// Working copy of the target repository
        #[arg(long)]
        repo: PathBuf,

        /// Scan report (JSON)
        #[arg(long)]
        report: PathBuf,

        /// Pipeline config (TOML); defaults to the user config file when present
        #[arg(long)]
        config: Option<PathBuf>,

        /// Push URL; defaults to the configured remote's URL
        #[arg(long)]
        remote_url: Option<String>,

        /// Branch that fixes must never be pushed to
        #[arg(long, default_value = "main")]
        default_branch: String,

        /// Run id (generated when omitted)
        #[arg(long)]
        run_id: Option<String>,

        /// Apply and report only, do not commit or push
        #[arg(long)]
        no_publish: bool,

        /// Write the run report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Environment variable holding the push token
        #[arg(long, default_value = "GITHUB_TOKEN")]
        token_env: String,

        /// Overall run timeout in seconds, overrides the config
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Replay recorded completions (JSON object: issue id -> completion text) instead of calling providers
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Parse a scan report and list accepted and rejected entries
    ValidateReport {
        /// Scan report (JSON)
        #[arg(long)]
        report: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    utils::load_env();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    telemetry::init_tracing(cli.json_logs, level);

    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run {
            repo,
            report,
            config,
            remote_url,
            default_branch,
            run_id,
            no_publish,
            output,
            token_env,
            timeout_secs,
            replay,
        } => {
            let config = PipelineConfig::load(config.as_deref()).context("loading config")?;
            let scan = ScanReport::from_path(&report)
                .with_context(|| format!("reading scan report {}", report.display()))?;

            let pipeline = match replay {
                Some(path) => replay_pipeline(&config, &path)?,
                None => Pipeline::from_config(&config).context("configuring providers")?,
            };

            let mut repo_ref = RepoRef::new(&repo)
                .with_remote_name(config.publish.remote_name.clone())
                .with_default_branch(default_branch);
            if let Some(url) = remote_url {
                repo_ref = repo_ref.with_remote_url(url);
            }

            let cancel = CancellationToken::new();
            let mut options = RunOptions::default().with_cancel(cancel.clone());
            if let Some(id) = run_id {
                options = options.with_run_id(id);
            }
            if let Some(timeout) = timeout_secs.map(Duration::from_secs).or(config.run_timeout()) {
                options = options.with_timeout(timeout);
            }

            let credential = if no_publish {
                options = options.without_publish();
                None
            } else {
                let credential = Credential::from_env(&token_env);
                if credential.is_none() {
                    warn!(token_env = %token_env, "no push token set, pushing without credentials");
                }
                credential
            };

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling run");
                    cancel.cancel();
                }
            });

            let result = pipeline.run(scan, &repo_ref, credential, options).await;
            write_report(&result, output.as_deref())?;
            Ok(exit_code(&result, no_publish))
        }

        Commands::ValidateReport { report } => {
            let scan = ScanReport::from_path(&report)
                .with_context(|| format!("reading scan report {}", report.display()))?;

            println!("accepted: {}", scan.issues.len());
            for issue in &scan.issues {
                println!(
                    "  {} {}:{}-{} [{}] {}",
                    issue.id,
                    issue.file_path,
                    issue.line_start,
                    issue.line_end,
                    issue.severity.as_str(),
                    issue.description
                );
            }
            println!("rejected: {}", scan.rejected.len());
            for entry in &scan.rejected {
                println!("  {}: {}", entry.issue_id, entry.reason);
            }

            Ok(if scan.rejected.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
    }
}

/// Pipeline whose only provider replays recorded completions
fn replay_pipeline(config: &PipelineConfig, path: &Path) -> Result<Pipeline> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading replay file {}", path.display()))?;
    let provider = ScriptedProvider::from_replay_json("replay", &raw)
        .with_context(|| format!("parsing replay file {}", path.display()))?;
    info!(file = %path.display(), "replaying recorded completions");

    let gateway = ProviderGateway::new(Arc::new(provider), RetryPolicy::default());
    Ok(Pipeline::new(
        FixSynthesizer::new(vec![gateway], SynthesizerConfig::from(config)),
        Publisher::new(PublisherConfig::from(&config.publish)),
        config.max_concurrent_synthesis,
    ))
}

fn write_report(result: &RunResult, output: Option<&Path>) -> Result<()> {
    let json = result.to_json_pretty().context("serializing run report")?;
    match output {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("writing run report {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

/// 0 when the run is done, or when a local-only run had no failed issues; 2 otherwise
fn exit_code(result: &RunResult, no_publish: bool) -> ExitCode {
    let clean_local_run = no_publish
        && result.failed_issues.is_empty()
        && result.publish_status == PublishStatus::Disabled;
    if result.state == RunState::Done || clean_local_run {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}
