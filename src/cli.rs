//! CLI definitions for postforge.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// postforge CLI.
#[derive(Parser)]
#[command(name = "postforge")]
#[command(about = "Recurring content-generation job scheduler")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long, global = true, env = "POSTFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler and control server in foreground (default)
    Run {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,

        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration file and exit
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::parse_from([
            "postforge",
            "--config",
            "/tmp/pf.toml",
            "run",
            "--port",
            "9100",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/pf.toml")));
        match cli.command {
            Some(Commands::Run { host, port }) => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9100));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_parse_check_config() {
        let cli = Cli::parse_from(["postforge", "check-config"]);
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
    }

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::parse_from(["postforge"]);
        assert!(cli.command.is_none());
    }
}
