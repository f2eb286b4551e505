//! Herald CLI
//!
//! Delivers a rendered report to a list of recipients and inspects the
//! channels available for delivery.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use herald_dispatcher::HeraldConfig;
use tracing_subscriber::{EnvFilter, fmt};

/// Herald: deliver rendered reports over SFTP, SMB, email and Slack.
#[derive(Parser, Debug)]
#[command(name = "herald", version, about)]
struct Cli {
    /// Configuration file. Defaults are used when it does not exist.
    #[arg(
        long,
        env = "HERALD_CONFIG",
        default_value = "herald.toml",
        global = true
    )]
    config: PathBuf,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deliver a report to every recipient in a file.
    Send(commands::send::SendArgs),
    /// List the registered channel types and their configuration keys.
    Channels,
    /// Re-encode a CSV export with the configured settings.
    Reencode(commands::reencode::ReencodeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = HeraldConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Send(args) => commands::send::run(&config, &args, &cli.format).await,
        Command::Channels => commands::channels::run(&config, &cli.format),
        Command::Reencode(args) => commands::reencode::run(&config, &args),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_accepts_repeated_screenshots() {
        let cli = Cli::try_parse_from([
            "herald",
            "--config",
            "custom.toml",
            "send",
            "--recipients",
            "recipients.json",
            "--name",
            "Daily",
            "--screenshot",
            "a.png",
            "--screenshot",
            "b.png",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Command::Send(args) => assert_eq!(args.screenshots.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
