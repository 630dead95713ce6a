use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use watchdog_service::database::models::TargetId;

/// Service health monitor
///
/// Probes registered endpoints on their own interval and alerts when they go
/// down or recover.
#[derive(Parser, Debug)]
#[command(name = "watchdog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler until Ctrl-C
    Run,

    /// Probe a target once and store the result
    Check {
        id: TargetId,
    },

    /// Manage monitored targets
    #[command(subcommand)]
    Target(TargetCommand),

    /// Show recent results and uptime
    History {
        id: TargetId,

        /// Window size in hours
        #[arg(long, default_value_t = 24)]
        hours: u32,

        /// Maximum number of results
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Show the notification audit trail
    Notifications {
        id: TargetId,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// Register a new target
    Add(AddTargetArgs),

    /// Change settings of a target
    Update(UpdateTargetArgs),

    /// Delete a target
    Remove {
        id: TargetId,

        /// Keep stored results and notifications
        #[arg(long)]
        keep_history: bool,
    },

    /// List all targets
    List,
}

#[derive(Args, Debug)]
pub struct AddTargetArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub host: String,

    #[arg(long)]
    pub port: u16,

    /// tcp, http or https
    #[arg(long, default_value = "tcp")]
    pub check_type: String,

    /// Check interval in seconds, defaults to the configured interval
    #[arg(long)]
    pub interval: Option<u64>,

    /// Who receives alerts
    #[arg(long)]
    pub recipient: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Request path for http/https checks
    #[arg(long)]
    pub path: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateTargetArgs {
    pub id: TargetId,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub check_type: Option<String>,

    #[arg(long)]
    pub interval: Option<u64>,

    #[arg(long)]
    pub recipient: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_target_add() {
        let cli = Cli::parse_from([
            "watchdog", "--json", "target", "add", "--name", "api", "--host", "10.0.0.5", "--port", "443",
            "--check-type", "https", "--recipient", "ops@example.com",
        ]);
        assert!(cli.json);
        match cli.command {
            Commands::Target(TargetCommand::Add(args)) => {
                assert_eq!(args.port, 443);
                assert_eq!(args.check_type, "https");
                assert!(args.interval.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_history_defaults() {
        let cli = Cli::parse_from(["watchdog", "history", "3"]);
        assert!(matches!(cli.command, Commands::History { id: 3, hours: 24, limit: 100 }));
    }
}
