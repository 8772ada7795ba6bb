use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use survey_bridge::config::Config;
use survey_bridge::host::memory::RecordingEngine;
use survey_bridge::host::{Document, MemoryDocument};
use survey_bridge::nav::gate::{MESSAGE_CLASS, SURROGATE_CLASS};
use survey_bridge::runtime::{PageRuntime, seconds_to_duration};

#[derive(Args)]
pub struct SimulateCommands {
    /// Message shown when the blocked control is clicked
    #[arg(long, default_value = "Please take a moment before continuing.")]
    pub message: String,
    /// Block period in seconds
    #[arg(long, default_value_t = 5.0)]
    pub seconds: f64,
    /// Clicks on the blocked control while the block is active
    #[arg(long, default_value_t = 3)]
    pub clicks: u32,
    /// Bottom margin of the rendered next control
    #[arg(long, default_value = "45px")]
    pub margin: String,
    /// Block again with this period right after the first activation
    #[arg(long)]
    pub reactivate: Option<f64>,
    /// Participant identifier rendered into the page
    #[arg(long, default_value = "sim-participant")]
    pub participant: String,
    /// Survey identifier rendered into the page
    #[arg(long, default_value = "sim-survey")]
    pub survey: String,
}

/// Run a navigation block against an in-memory page and report what happened
pub async fn handle_simulate_command(args: SimulateCommands, config: Config) -> Result<()> {
    for seconds in std::iter::once(args.seconds).chain(args.reactivate) {
        if !seconds.is_finite() {
            anyhow::bail!("Block period must be a finite number of seconds, got {}", seconds);
        }
    }

    let counter_key = config.navigation.counter_key.clone();

    let document = MemoryDocument::new();
    document.add_embedded_data("participant_id", &args.participant);
    document.add_embedded_data("survey_id", &args.survey);
    document.add_embedded_data(&counter_key, "0");
    let controls = document.add_nav_controls(&args.margin, true);

    let engine = Arc::new(RecordingEngine::new());
    let runtime = PageRuntime::builder(Arc::new(document.clone()), engine.clone())
        .config(config)
        .build()
        .context("Failed to build page runtime")?;

    runtime.on_page_load();

    println!("⏳ Blocking navigation for {}s", args.seconds);
    if let Err(err) = runtime
        .temporarily_block_navigation(&args.message, args.seconds)
        .await
    {
        println!("{} {}", "✗".bright_red().bold(), err);
        return Ok(());
    }

    let mut period = seconds_to_duration(args.seconds);
    if let Some(seconds) = args.reactivate {
        println!("🔁 Re-blocking for {}s", seconds);
        runtime
            .temporarily_block_navigation(&args.message, seconds)
            .await?;
        period = seconds_to_duration(seconds);
    }

    if let Some(session) = runtime.gate().session() {
        for _ in 0..args.clicks {
            document.click(session.surrogate);
        }
        println!(
            "🖱  {} blocked click(s), message: {}",
            args.clicks,
            document.text(session.message_node).unwrap_or_default().italic()
        );
    }

    tokio::time::sleep(period.saturating_add(Duration::from_millis(100))).await;
    let outcomes = runtime.flush().await;

    let report = json!({
        "blocked_clicks": runtime.data(&counter_key)?.unwrap_or_default(),
        "block_active": runtime.gate().is_blocked(),
        "next_visible": document.is_visible(controls.next),
        "surrogates_remaining": document.find_by_class(SURROGATE_CLASS).len(),
        "messages_remaining": document.find_by_class(MESSAGE_CLASS).len(),
        "pending_timers": runtime.gate().pending_timers(),
        "embedded_writes": engine.embedded_writes().len(),
        "sync_outcomes": outcomes.len(),
        "stats": runtime.stats(),
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
