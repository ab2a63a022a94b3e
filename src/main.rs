//! postforge - recurring content-generation job scheduler
//!
//! Main entry point for the postforge CLI and server.

mod cli;
mod server;

use clap::Parser;

use postforge_config::ConfigLoader;

use crate::cli::{Cli, Commands};
use crate::server::{check_config, init_tracing, run_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(ConfigLoader::default_path);
    let mut config = ConfigLoader::load_or_default(&config_path)?;

    init_tracing(&config.logging)?;

    match cli.command {
        Some(Commands::CheckConfig) => {
            check_config(&config)?;
            println!("Configuration OK: {}", config_path.display());
            Ok(())
        }
        Some(Commands::Run { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await
        }
        None => run_server(config).await,
    }
}
