//! `gatherly-draft` -- inspect or discard the saved event-creation draft.
//!
//! ```bash
//! gatherly-draft status        # JSON progress report of the saved draft
//! gatherly-draft clear         # delete the saved draft
//! gatherly-draft --key s-42 status
//! ```
//!
//! Configuration comes from the environment (see [`WizardConfig`]); a
//! `.env` file is honoured.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gatherly_core::wizard::{AutosaveSnapshot, StepRegistry, ValidationEngine};
use gatherly_events::{
    names, AnalyticsForwarder, AnalyticsLogger, AnalyticsSink, EventBus, TrackedEvent,
};
use gatherly_wizard::storage::{DraftStore, FileDraftStore};
use gatherly_wizard::WizardConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "gatherly_draft=info,gatherly_wizard=info,gatherly_events=info";

/// How long `clear` waits for pending analytics deliveries before giving up.
const FORWARD_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[clap(name = "gatherly-draft")]
#[clap(about = "Inspect or discard the saved event-creation draft")]
struct Args {
    /// Draft slot to operate on (defaults to DRAFT_KEY)
    #[clap(long)]
    key: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a progress report of the saved draft
    Status,
    /// Delete the saved draft
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = WizardConfig::from_env().context("Invalid configuration")?;
    let key = args.key.unwrap_or_else(|| config.draft_key.clone());
    let store = FileDraftStore::new(&config.draft_dir);
    tracing::debug!(dir = %store.dir().display(), key = %key, "Opened draft store");

    match args.command {
        Command::Status => status(&store, &key).await,
        Command::Clear => clear(&store, &key, &config).await,
    }
}

async fn status(store: &FileDraftStore, key: &str) -> anyhow::Result<()> {
    let Some(contents) = store.load(key).await? else {
        println!("{}", serde_json::json!({ "key": key, "draft": null }));
        return Ok(());
    };

    let registry = StepRegistry::standard();
    let Some(snapshot) = AutosaveSnapshot::parse(&contents, registry.count()) else {
        tracing::warn!(key, "Saved draft is unreadable and would be ignored by the wizard");
        println!("{}", serde_json::json!({ "key": key, "draft": "unreadable" }));
        return Ok(());
    };

    let engine = ValidationEngine::standard();
    let report = engine.report(&snapshot.form_values);
    let current = registry.step_at(snapshot.current_step)?;
    let output = serde_json::json!({
        "key": key,
        "title": snapshot.form_values.title,
        "template_id": snapshot.template_id,
        "current_step": snapshot.current_step,
        "current_step_title": current.title,
        "completed_steps": snapshot.completed_steps,
        "remaining_minutes": registry.remaining_minutes(&snapshot.completed_steps),
        "last_saved": snapshot.last_saved,
        "writer_id": snapshot.writer_id,
        "overall_progress": report.overall_progress,
        "steps": report.steps,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn clear(store: &FileDraftStore, key: &str, config: &WizardConfig) -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::default());
    let logger = tokio::spawn(AnalyticsLogger::run(bus.subscribe()));

    let cancel = CancellationToken::new();
    let forwarder = match &config.analytics_webhook_url {
        Some(url) => {
            let forwarder = AnalyticsForwarder::new(url.clone())?;
            let receiver = bus.subscribe();
            let token = cancel.clone();
            Some(tokio::spawn(async move { forwarder.run(receiver, token).await }))
        }
        None => None,
    };

    store.remove(key).await?;
    tracing::info!(key, "Draft cleared");
    bus.track(
        TrackedEvent::new(names::DRAFT_DISCARDED)
            .with_properties(serde_json::json!({ "key": key, "source": "cli" })),
    );

    // Closing the bus lets both consumers drain and exit.
    drop(bus);
    logger.await?;
    if let Some(mut handle) = forwarder {
        let summary = match tokio::time::timeout(FORWARD_GRACE, &mut handle).await {
            Ok(joined) => joined?,
            Err(_) => {
                tracing::warn!("Analytics delivery still pending, cancelling");
                cancel.cancel();
                handle.await?
            }
        };
        tracing::debug!(
            delivered = summary.delivered,
            dropped = summary.dropped,
            "Analytics flushed"
        );
    }
    Ok(())
}
