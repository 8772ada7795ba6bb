use anyhow::Result;
use clap::Parser;
use log::info;

use survey_bridge::config::Config;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("survey-bridge.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    info!("Starting survey-bridge");

    match cli.command {
        Commands::Url(args) => cli::commands::url::handle_url_command(args, &config),
        Commands::Probe(args) => cli::commands::probe::handle_probe_command(args, config).await,
        Commands::Simulate(args) => {
            cli::commands::simulate::handle_simulate_command(args, config).await
        }
        Commands::Config(args) => cli::commands::settings::handle_config_command(args, config),
    }
}
