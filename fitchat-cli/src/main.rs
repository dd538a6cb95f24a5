//! Command-line client for fitchat conversations.

use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use directories::BaseDirs;
use dotenv::dotenv;
use shared::config::{ClientConfig, ConfigOverrides};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod commands;
mod render;
mod stream;

use commands::{follow::FollowArgs, history::HistoryArgs, send::SendArgs};

/// fitchat CLI
#[derive(Parser)]
#[command(name = "fitchat")]
#[command(about = "Read, follow, and send fitchat messages from the terminal", long_about = None)]
struct Cli {
    /// Path to a configuration file (yaml, json, or toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Chat server base URL
    #[arg(long, global = true)]
    server: Option<String>,

    /// Id of the signed-in user
    #[arg(long, global = true)]
    user: Option<String>,

    /// Seconds between history fetches while the live channel is down
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    History(HistoryArgs),
    Follow(FollowArgs),
    Send(SendArgs),

    /// Generate a configuration file in the current directory
    Config {
        /// Format of the configuration file to generate (yaml, json, or toml). Defaults to yaml.
        #[arg(long, short)]
        format: Option<String>,
    },
}

/// `<config dir>/fitchat/config.yaml` when it exists.
fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("fitchat").join("config.yaml"))
        .filter(|path| path.is_file())
}

fn init_tracing(config: &ClientConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    if let Commands::Config { format } = &cli.command {
        let format = format.as_deref().unwrap_or("yaml");
        return commands::config::generate_config(format, &env::current_dir()?);
    }

    let overrides = ConfigOverrides {
        server_url: cli.server,
        user_id: cli.user,
        poll_interval_secs: cli.poll_interval,
    };
    let config_path = cli.config.or_else(default_config_path);
    let config = ClientConfig::load_config(config_path.as_deref(), &overrides)?;
    init_tracing(&config);

    match cli.command {
        Commands::History(args) => commands::history::handle_history(args, &config).await?,
        Commands::Follow(args) => commands::follow::handle_follow(args, &config).await?,
        Commands::Send(args) => commands::send::handle_send(args, &config).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
