use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::sync::Arc;

use survey_bridge::config::Config;
use survey_bridge::sync::url::participant_data_url;
use survey_bridge::sync::{HttpProbeSender, RetryPolicy, SyncDispatcher, SyncOutcome};

#[derive(Args)]
pub struct ProbeCommands {
    /// Name of the value
    pub key: String,
    /// Value to send
    pub value: String,
    /// Participant identifier
    #[arg(long)]
    pub participant: String,
    /// Survey identifier
    #[arg(long)]
    pub survey: String,
    /// Override the configured domain
    #[arg(long)]
    pub domain: Option<String>,
}

pub async fn handle_probe_command(args: ProbeCommands, mut config: Config) -> Result<()> {
    if let Some(domain) = &args.domain {
        config.set_domain(domain);
    }
    let domain = config.domain();
    if domain.is_empty() {
        anyhow::bail!("No domain configured; use --domain or `survey-bridge config set-domain`");
    }

    let url = participant_data_url(domain, &args.participant, &args.survey, &args.key, &args.value);
    println!("📡 {}", url.dimmed());

    let sender = HttpProbeSender::new(config.sync.probe_timeout())
        .context("Failed to build probe sender")?;
    let dispatcher = SyncDispatcher::new(
        Arc::new(sender),
        RetryPolicy::new(config.sync.retry_config()),
    );
    dispatcher.dispatch(&args.key, url);

    for outcome in dispatcher.flush().await {
        match outcome {
            SyncOutcome::Delivered { attempts } => {
                println!("{} delivered after {} attempt(s)", "✓".bright_green().bold(), attempts);
            }
            SyncOutcome::Abandoned { attempts } => {
                println!("{} abandoned after {} attempt(s)", "✗".bright_red().bold(), attempts);
            }
        }
    }

    Ok(())
}
