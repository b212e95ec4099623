//! sessiongate CLI - drive a session against a login/refresh-cookie backend

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "sessiongate")]
#[command(about = "Session client with silent token refresh")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Configuration file (TOML or YAML)
    #[arg(short = 'c', long, global = true, env = "SESSIONGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the configuration file
    #[arg(short = 'u', long, global = true)]
    base_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Timeout for one-shot commands in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.into(), cli.log_file.as_deref())?;
    info!("Starting sessiongate");

    let settings = config::Settings {
        config_path: cli.config,
        base_url: cli.base_url,
    };

    // The interactive shell runs until stdin closes.
    let timeout = (cli.timeout > 0 && !cli.command.is_interactive())
        .then(|| Duration::from_secs(cli.timeout));

    let outcome = match timeout {
        None => cli.command.execute(settings).await,
        Some(duration) => match tokio::time::timeout(duration, cli.command.execute(settings)).await
        {
            Ok(result) => result,
            Err(_) => {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        },
    };

    if let Err(e) = outcome {
        error!("Command failed: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
