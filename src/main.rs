//! Binary entrypoint: wires config, credentials, the host and gateway
//! clients, and the orchestrator, then drives the cycle loop until the
//! queue is exhausted or the user halts with Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use sovereign::cli::Args;
use sovereign::config::{Config, Credentials};
use sovereign::env::Env;
use sovereign::gateway::http::HttpGateway;
use sovereign::host::github::GithubHost;
use sovereign::journal::LogCategory;
use sovereign::orchestrator::CycleOrchestrator;
use sovereign::pipeline::PipelineTable;
use sovereign::store::StateStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let env = Env::real();

    let cwd = std::env::current_dir().ok();
    let mut config = Config::load(cwd.as_deref(), &env).context("loading configuration")?;
    args.apply(&mut config);

    let credentials = Credentials::from_env(&env);
    let Some(identifier) = config.repo.identifier.clone() else {
        bail!(
            "no target repository: pass one as an argument, set {}, or configure [repo] identifier",
            sovereign::constants::ENV_REPO
        );
    };

    let host = Arc::new(GithubHost::new(
        credentials.repo_token.clone().unwrap_or_default(),
    ));
    let gateway = Arc::new(HttpGateway::new(
        credentials.model_key.clone().unwrap_or_default(),
    ));

    let mut orchestrator = CycleOrchestrator::new(
        host,
        gateway,
        StateStore::new(),
        PipelineTable::default(),
        config,
        credentials,
    );

    let queued = orchestrator
        .discover(&identifier)
        .await
        .with_context(|| format!("discovering {identifier}"))?;
    if args.resume {
        orchestrator.restore_cursor();
    }
    eprintln!(
        "{} {} file(s) queued from {}",
        "▸".cyan().bold(),
        queued,
        identifier.dimmed()
    );

    // Ctrl-C cancels the in-flight call; the next tick returns to idle.
    let halt = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            halt.cancel();
        }
    });

    orchestrator.start();
    if args.once {
        orchestrator.tick().await;
    } else {
        orchestrator.run().await;
    }

    print_summary(&orchestrator);
    Ok(())
}

fn print_summary(orchestrator: &CycleOrchestrator) {
    let metrics = orchestrator.metrics();
    eprintln!();
    for entry in orchestrator.recent_log() {
        let tag = match entry.category {
            LogCategory::Mutated => entry.category.to_string().green().bold(),
            LogCategory::Error => entry.category.to_string().red().bold(),
            LogCategory::Cancelled => entry.category.to_string().yellow().bold(),
            _ => entry.category.to_string().dimmed(),
        };
        eprintln!("  {tag} {}", entry.message);
    }
    eprintln!();
    let headline = if orchestrator.is_finished() {
        "queue exhausted".green().to_string()
    } else {
        "stopped".yellow().to_string()
    };
    eprintln!(
        "  {} {headline}: {} mutated, {} step(s), {} error(s), {}%",
        "✔".green().bold(),
        metrics.mutations,
        metrics.steps,
        metrics.errors,
        metrics.progress_percent
    );
}
