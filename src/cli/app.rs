use super::commands::probe::ProbeCommands;
use super::commands::settings::ConfigCommands;
use super::commands::simulate::SimulateCommands;
use super::commands::url::UrlCommands;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "survey-bridge")]
#[command(about = "State sync and navigation gating for embedded survey pages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the remote-store URL for a value
    Url(UrlCommands),
    /// Send a value to the remote store with the configured retry policy
    Probe(ProbeCommands),
    /// Run a navigation block against an in-memory page
    Simulate(SimulateCommands),
    /// Configuration management
    Config(ConfigCommands),
}
