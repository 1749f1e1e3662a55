//! Video moderation worker binary.
//!
//! Reads one JSON event from stdin, runs the requested stage and writes the
//! `{ status_code, body }` response to stdout.
//!
//! ```text
//! vmod-worker run [monolithic|distributed]
//! vmod-worker capture | moderate | consolidate
//! vmod-worker schema
//! ```

use std::net::SocketAddr;

use anyhow::{anyhow, bail, Context};
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vmod_models::ModerationTrigger;
use vmod_worker::{dispatch, metrics, PipelineContext, Stage, WorkerConfig};

const USAGE: &str =
    "usage: vmod-worker <run [monolithic|distributed] | capture | moderate | consolidate | schema>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let stage = match parse_args(&args)? {
        Some(stage) => stage,
        None => {
            let schema = schemars::schema_for!(ModerationTrigger);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(());
        }
    };

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid METRICS_ADDR: {}", addr))?;
        metrics::init_metrics(addr).context("Failed to install Prometheus exporter")?;
        info!("Serving metrics on {}", addr);
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Ctrl-C flips the cancel signal; the pipeline cleans up and exits
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling");
            cancel_tx.send(true).ok();
        }
    });

    let ctx = PipelineContext::from_env(config, cancel_rx.clone())
        .await
        .context("Failed to create pipeline context")?;

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read event from stdin")?;

    let response = dispatch(ctx, stage, &input, cancel_rx).await;
    println!("{}", serde_json::to_string(&response)?);

    if !response.is_success() {
        error!(
            stage = %stage,
            status_code = response.status_code,
            "Stage failed"
        );
        std::process::exit(1);
    }

    info!(stage = %stage, "Stage complete");
    Ok(())
}

/// Colored output for dev, JSON for production.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vmod=info".parse()?);

    // Logs go to stderr so stdout carries only the response
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    Ok(())
}

/// `None` means print the trigger schema.
fn parse_args(args: &[String]) -> anyhow::Result<Option<Stage>> {
    let mut args = args.iter().map(String::as_str);

    let stage = match (args.next(), args.next()) {
        (Some("schema"), None) => return Ok(None),
        (Some("run"), None) | (Some("run"), Some("monolithic")) => Stage::Monolithic,
        (Some("run"), Some("distributed")) => Stage::Distributed,
        (Some(name), None) if name != "run" => name.parse().map_err(|_| anyhow!(USAGE))?,
        _ => bail!(USAGE),
    };

    if args.next().is_some() {
        bail!(USAGE);
    }
    Ok(Some(stage))
}
