use anyhow::Result;
use clap::{Args, Subcommand};
use colored::*;

use survey_bridge::config::{Config, UrlScheme};

#[derive(Args)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Show the current configuration
    Show,
    /// Set the platform domain (no trailing slash needed)
    SetDomain {
        /// Domain, e.g. https://platform.example.org
        domain: String,
    },
    /// Set the program identifier
    SetProgram {
        /// Program identifier
        program: String,
    },
    /// Set the remote-store url layout
    SetScheme {
        /// neptune or yosemite
        scheme: String,
    },
}

pub fn handle_config_command(args: ConfigCommands, mut config: Config) -> Result<()> {
    match args.command {
        ConfigSubcommands::Show => {
            println!("{}", "Configuration".bold());
            println!("  path:      {}", Config::get_config_path()?.display().to_string().cyan());
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigSubcommands::SetDomain { domain } => {
            config.set_domain(&domain);
            config.save()?;
            println!("{} domain set to {}", "✓".bright_green().bold(), config.domain().cyan());
        }
        ConfigSubcommands::SetProgram { program } => {
            config.set_program(&program);
            config.save()?;
            println!("{} program set to {}", "✓".bright_green().bold(), config.program().cyan());
        }
        ConfigSubcommands::SetScheme { scheme } => {
            config.url_scheme = scheme.parse::<UrlScheme>()?;
            config.save()?;
            println!("{} url scheme set to {:?}", "✓".bright_green().bold(), config.url_scheme);
        }
    }
    Ok(())
}
