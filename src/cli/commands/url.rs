use anyhow::Result;
use clap::Args;
use colored::*;

use survey_bridge::config::{Config, UrlScheme};
use survey_bridge::sync::url::{is_placeholder, page_data_url, participant_data_url};

#[derive(Args)]
pub struct UrlCommands {
    /// Name of the value
    pub key: String,
    /// Value to send
    pub value: String,
    /// Participant identifier
    #[arg(long, default_value = "")]
    pub participant: String,
    /// Survey identifier
    #[arg(long, default_value = "")]
    pub survey: String,
    /// User identifier (page-level layout)
    #[arg(long, default_value = "")]
    pub user: String,
    /// Activity ordinal (page-level layout)
    #[arg(long, default_value = "")]
    pub ordinal: String,
    /// Override the configured domain
    #[arg(long)]
    pub domain: Option<String>,
    /// Override the configured url scheme (neptune, yosemite)
    #[arg(long)]
    pub scheme: Option<String>,
}

pub fn handle_url_command(args: UrlCommands, config: &Config) -> Result<()> {
    let mut config = config.clone();
    if let Some(domain) = &args.domain {
        config.set_domain(domain);
    }
    let scheme = match &args.scheme {
        Some(scheme) => scheme.parse::<UrlScheme>()?,
        None => config.url_scheme,
    };

    let inputs = [&args.value, &args.participant, &args.survey, &args.user];
    if inputs.iter().any(|v| is_placeholder(v)) {
        println!(
            "{} placeholder data detected; a preview page would not sync",
            "⚠".yellow().bold()
        );
        return Ok(());
    }

    let domain = config.domain();
    if domain.is_empty() {
        anyhow::bail!("No domain configured; use --domain or `survey-bridge config set-domain`");
    }

    let url = match scheme {
        UrlScheme::Neptune => {
            participant_data_url(domain, &args.participant, &args.survey, &args.key, &args.value)
        }
        UrlScheme::Yosemite => {
            let pairs = vec![
                ("variable", args.key.clone()),
                ("value", args.value.clone()),
                ("user", args.user.clone()),
                ("program", config.program().to_string()),
                ("activity_ordinal", args.ordinal.clone()),
            ];
            page_data_url(domain, &pairs)
        }
    };

    println!("{}", url);
    Ok(())
}
