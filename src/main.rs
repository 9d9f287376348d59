//! Leafcutter worker entry point
//!
//! Command-line entry for one crawl worker process. Connection settings
//! come from the environment; everything else arrives through the
//! orchestrator bootstrap call.

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use leafcutter::config::{parse_run_input, EngineKind};
use leafcutter::engine::{resolve_engine, stealth_engine_available};
use leafcutter::fetch::{BrowserEngine, ChromiumEngine, PageFetcher};
use leafcutter::proxy::ProxySettings;
use leafcutter::queue::{
    HttpQueueClient, QueueConfig, QueueService, RunEvent, EVENT_RUNTIME_CRASHED,
    EVENT_RUNTIME_INPUT_INVALID, LEVEL_ERROR, STAGE_RUNTIME,
};
use leafcutter::worker::CrawlWorker;

/// Leafcutter: a distributed crawl worker
///
/// Leafcutter leases crawl requests from its orchestrator, fetches each page
/// with the engine the run asks for, extracts content and links, and reports
/// every outcome back until a stop budget is crossed. The orchestrator
/// endpoint, run id, and token come from `LEAFCUTTER_API_BASE_URL`,
/// `LEAFCUTTER_RUN_ID`, and `LEAFCUTTER_RUN_TOKEN`.
#[derive(Parser, Debug)]
#[command(name = "leafcutter")]
#[command(version = "1.0.0")]
#[command(about = "Distributed crawl worker", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the generated worker id used for queue leases
    #[arg(long, value_name = "ID")]
    worker_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    if let Err(error) = run(cli).await {
        tracing::error!("Worker crashed: {error:#}");
        report_crash(&format!("{error:#}")).await;
        return Err(error);
    }
    Ok(())
}

/// Bootstraps the run and drives the crawl loop to completion
async fn run(cli: Cli) -> anyhow::Result<()> {
    let queue_config = QueueConfig::from_env().context("reading queue connection settings")?;
    tracing::info!("Bootstrapping run {}", queue_config.run_id);
    let client = HttpQueueClient::new(queue_config)?;
    let bootstrap = client.bootstrap().await.context("bootstrap call failed")?;

    let config = match parse_run_input(&bootstrap.run.input) {
        Ok(config) => config,
        Err(error) => {
            let message = error.to_string();
            let event = RunEvent::new(
                EVENT_RUNTIME_INPUT_INVALID,
                STAGE_RUNTIME,
                json!({ "error": message }),
            )
            .with_message(message.clone())
            .with_level(LEVEL_ERROR);
            if let Err(error) = client.emit_event(&event).await {
                tracing::warn!("Input-invalid event could not be delivered: {error}");
            }
            anyhow::bail!("Invalid input: {message}");
        }
    };
    tracing::info!(
        "Run {} configured with {} start URLs",
        bootstrap.run.id,
        config.start_urls.len()
    );

    let proxy = ProxySettings::from_env();
    let resolution = resolve_engine(config.crawler_type, stealth_engine_available());
    tracing::info!(
        "Engine resolved: requested {}, selected {}",
        resolution.requested,
        resolution.selected
    );

    let browser: Option<Box<dyn BrowserEngine>> = if resolution.selected == EngineKind::HttpFast {
        None
    } else {
        Some(Box::new(ChromiumEngine::new()))
    };
    let fetcher = PageFetcher::new(proxy.clone(), browser)?;

    let mut worker = CrawlWorker::new(
        Box::new(client),
        config,
        resolution,
        &bootstrap.run.concurrency,
        proxy,
        fetcher,
    )?;
    if let Some(worker_id) = cli.worker_id {
        worker = worker.with_worker_id(worker_id);
    }
    worker.run().await?;
    Ok(())
}

/// Sets up the tracing subscriber from the verbosity flags
///
/// An explicit `RUST_LOG` wins over the flag-derived default.
fn setup_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "leafcutter=info,warn",
            1 => "leafcutter=debug,info",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Best-effort `runtime.crashed` event so the orchestrator can close the
/// run out. Failures here are logged and swallowed; the process is already
/// exiting non-zero.
async fn report_crash(message: &str) {
    let queue_config = match QueueConfig::from_env() {
        Ok(queue_config) => queue_config,
        Err(_) => return,
    };
    let client = match HttpQueueClient::new(queue_config) {
        Ok(client) => client,
        Err(_) => return,
    };
    let event = RunEvent::new(
        EVENT_RUNTIME_CRASHED,
        STAGE_RUNTIME,
        json!({ "error": message }),
    )
    .with_message(message)
    .with_level(LEVEL_ERROR);
    if let Err(error) = client.emit_event(&event).await {
        tracing::warn!("Crash event could not be delivered: {error}");
    }
}
