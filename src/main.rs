//! etlflow - CLI entry point for running and inspecting dataflows.

mod cli;

use std::net::TcpListener;
use std::path::{Path, PathBuf};

use clap::Parser;
use eyre::{bail, Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use cli::{Cli, Command};
use etlflow::core::{logging, metrics};
use etlflow::{EtlEngine, EventBus, ExecutionStatus, Settings, Store, StoreSink};

const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9898";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => Settings::load(path).context("Failed to load settings")?,
        None => Settings::default(),
    };
    logging::init_with_default(settings.log_level());

    match cli.command {
        Command::Run { metadata, dataflow, db, pushgateway, events } => {
            let mut settings = settings;
            if db.is_some() {
                settings.db_path = db;
            }
            if pushgateway.is_some() {
                settings.pushgateway_url = pushgateway;
            }
            cmd_run(&settings, &metadata, dataflow.as_deref(), events).await
        }
        Command::History { db, limit } => cmd_history(db.or(settings.db_path.clone()), limit),
        Command::Validate { metadata } => cmd_validate(&metadata),
        Command::ServeMetrics { addr } => {
            let addr = addr
                .or(settings.metrics_addr.clone())
                .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
            cmd_serve_metrics(&addr).await
        }
    }
}

async fn cmd_run(settings: &Settings, metadata: &Path, dataflow: Option<&str>, print_events: bool) -> Result<()> {
    let gateway = settings.pushgateway().context("Invalid pushgateway URL")?;
    let mut engine = EtlEngine::from_path(metadata)
        .with_context(|| format!("Invalid metadata document {}", metadata.display()))?;

    let store = match &settings.db_path {
        Some(path) => Store::open(path).with_context(|| format!("Failed to open lineage store {}", path.display()))?,
        None => Store::in_memory().context("Failed to create in-memory lineage store")?,
    };
    let interrupted = store.mark_inflight_as_failed().unwrap_or(0);
    if interrupted > 0 {
        warn!(count = interrupted, "marked in-flight executions from a previous session as failed");
    }
    engine = engine.lineage(StoreSink::new(store));

    let printer = if print_events {
        let (sink, mut rx) = EventBus::new(4096).split();
        engine = engine.lineage(sink);
        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(error = %e, "failed to serialize lineage event"),
                }
            }
        }))
    } else {
        None
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            let _ = cancel_tx.send(true);
        }
    });

    let executions = match dataflow {
        Some(name) => vec![engine.run_dataflow_with_cancel(name, cancel_rx).await?],
        None => engine.run_all_with_cancel(cancel_rx).await,
    };

    if let Some(url) = gateway {
        if let Err(e) = metrics::push_to_gateway(&url, settings.push_job()).await {
            warn!(error = %e, "failed to push metrics");
        }
    }

    // Dropping the engine closes the event channel so the printer drains and exits.
    drop(engine);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let mut failed = 0;
    for execution in &executions {
        match execution.status {
            ExecutionStatus::Failed => {
                failed += 1;
                eprintln!(
                    "{} {} failed at {}: {}",
                    execution.dataflow,
                    execution.id,
                    execution.failed_stage.as_deref().unwrap_or("-"),
                    execution.error.as_deref().unwrap_or("unknown error"),
                );
            }
            _ => info!(
                dataflow = %execution.dataflow,
                execution = %execution.id,
                records = execution.records_processed,
                "dataflow succeeded"
            ),
        }
    }

    if failed > 0 {
        bail!("{failed} of {} execution(s) failed", executions.len());
    }
    Ok(())
}

fn cmd_history(db: Option<PathBuf>, limit: usize) -> Result<()> {
    let Some(db) = db else {
        bail!("no lineage store configured; pass --db or set db_path in the settings file");
    };
    let store = Store::open(&db).with_context(|| format!("Failed to open lineage store {}", db.display()))?;
    for row in store.recent_executions(limit)? {
        println!(
            "{}  {:<20} {:<9} {:>8} records  {}{}",
            row.started_at,
            row.dataflow,
            row.status,
            row.records_processed,
            row.id,
            row.error.map(|e| format!("  error: {e}")).unwrap_or_default(),
        );
    }
    Ok(())
}

fn cmd_validate(metadata: &Path) -> Result<()> {
    let engine = EtlEngine::from_path(metadata)
        .with_context(|| format!("Invalid metadata document {}", metadata.display()))?;
    for name in engine.dataflows() {
        if let Some(plan) = engine.plan(name) {
            println!("{name}: {}", plan.execution_order().join(" -> "));
        }
    }
    Ok(())
}

async fn cmd_serve_metrics(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "serving metrics on /metrics");
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    metrics::start_exporter_with_shutdown(listener, shutdown)
        .await
        .context("Metrics exporter task failed")?;
    Ok(())
}
