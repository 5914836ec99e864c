use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use cadence_core::domain::{RecurrenceConfig, RecurrenceKind};
use cadence_core::impls::{BroadcastSink, JsonFileStore, OwnerInbox};
use cadence_core::persistence::ImportReport;
use cadence_core::{Engine, EngineBuilder, EngineConfig};
use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "cadence", version, about = "Task dependency and recurrence engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a dependency scenario and a short auto-reset scenario
    Demo {
        /// Auto-reset delay in seconds for the recurrence part
        #[arg(long, default_value_t = 2)]
        reset_after: i64,
    },
    /// Load a snapshot into a fresh engine and print what it holds
    Inspect { snapshot: PathBuf },
    /// Host an engine until Ctrl-C, applying resets as timers fire
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG が不正なら info にフォールバック
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match Cli::parse().command {
        Command::Demo { reset_after } => demo(reset_after).await,
        Command::Inspect { snapshot } => inspect(&snapshot).await,
        Command::Run { config } => run(config.as_deref()).await,
    }
}

/// 通知を stdout に流す購読タスク
fn print_notifications(sink: &BroadcastSink) -> tokio::task::JoinHandle<()> {
    let mut rx = sink.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(n) => println!("[{}] {:?}: {}", n.level, n.topic, n.message),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    println!("... {skipped} notifications dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn demo(reset_after: i64) -> anyhow::Result<()> {
    if reset_after <= 0 {
        bail!("--reset-after must be positive");
    }

    let sink = Arc::new(BroadcastSink::new(64));
    let printer = print_notifications(&sink);
    let (mut engine, mut inbox) = EngineBuilder::new()
        .notifier(sink.clone())
        .build_with_inbox()?;

    // (A) 依存関係: design -> build -> ship
    let design = engine.create_task("design");
    let build = engine.create_task("build");
    let ship = engine.create_task("ship");
    engine.add_relation(design, build)?;
    engine.add_relation(build, ship)?;

    if let Err(err) = engine.try_complete(ship, None) {
        println!("ship: {err}");
    }
    engine.try_complete(design, None)?;
    engine.try_complete(build, None)?;
    engine.try_complete(ship, None)?;

    // (B) 繰り返し: 完了後 reset_after 秒で自動リセット
    let standup = engine.create_task("standup");
    engine.configure_recurring_task(
        standup,
        RecurrenceConfig::new(RecurrenceKind::Minutes, 1)
            .with_auto_reset(TimeDelta::seconds(reset_after)),
    )?;
    engine.try_complete(standup, None)?;
    println!("waiting {reset_after}s for standup to reset ...");

    let deadline = Duration::from_secs(reset_after.unsigned_abs() + 5);
    match tokio::time::timeout(deadline, inbox.recv()).await {
        Ok(Some(request)) => {
            engine.apply_reset(&request);
        }
        Ok(None) => bail!("reset inbox closed"),
        Err(_) => bail!("no reset within {}s", deadline.as_secs()),
    }

    print_tasks(&engine);

    engine.shutdown();
    drop(engine);
    drop(sink);
    // 最後の通知を出し切る
    let _ = tokio::time::timeout(Duration::from_millis(200), printer).await;
    Ok(())
}

async fn inspect(path: &Path) -> anyhow::Result<()> {
    let store = JsonFileStore::new(path);
    let (mut engine, _inbox) = EngineBuilder::new().build_with_inbox()?;
    let report = engine
        .load_from(&store)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let Some(report) = report else {
        bail!("no snapshot at {}", path.display());
    };

    print_report(&report);
    print_tasks(&engine);
    Ok(())
}

async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let store = config.storage.snapshot_path.clone().map(JsonFileStore::new);

    let (mut engine, mut inbox) = EngineBuilder::new().config(config).build_with_inbox()?;

    if let Some(store) = &store
        && let Some(report) = engine.load_from(store).await?
    {
        print_report(&report);
    }

    tracing::info!(tasks = engine.graph().len(), "engine running, Ctrl-C to stop");
    serve(&mut engine, &mut inbox).await?;

    engine.shutdown();
    if let Some(store) = &store {
        engine.save_to(store).await?;
        tracing::info!(path = %store.path().display(), "snapshot saved");
    }
    Ok(())
}

/// Owner loop: the only place resets are applied.
async fn serve(engine: &mut Engine, inbox: &mut OwnerInbox) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            request = inbox.recv() => match request {
                Some(request) => {
                    engine.apply_reset(&request);
                }
                None => return Ok(()),
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for Ctrl-C")?;
                tracing::info!("shutdown requested");
                return Ok(());
            }
        }
    }
}

fn print_report(report: &ImportReport) {
    println!(
        "imported: {} tasks created, {} updated, {} relations, {} completions, {} recurrences",
        report.tasks_created,
        report.tasks_updated,
        report.relations_added,
        report.completions_replayed,
        report.recurrences_restored,
    );
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}

fn print_tasks(engine: &Engine) {
    for board in engine.boards().iter() {
        println!("{} ({})", board.name, board.id);
        for &id in board.tasks() {
            let Some(task) = engine.task(id) else { continue };
            let blockers = engine.blockers(id);
            print!("  {:<24} {:<12}", task.title(), task.status());
            if !blockers.is_empty() {
                let titles: Vec<&str> = blockers
                    .iter()
                    .filter_map(|b| engine.task(*b).map(|t| t.title()))
                    .collect();
                print!(" blocked by {}", titles.join(", "));
            }
            println!();

            if let Some(config) = engine.get_recurring_task(id) {
                let next_due = config
                    .next_due
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "    {:?} x{} auto_reset={} next_due={}",
                    config.kind, config.interval, config.auto_reset, next_due
                );
            }
        }
    }
}
