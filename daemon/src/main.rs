//! Gatekeeper daemon: entry point for running the admission bot.

use anyhow::Context;
use clap::Parser;
use gatekeeper_node::{init_logging, BotConfig, GatekeeperBot};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gatekeeper-daemon", about = "Phone-verified admission bot for group chats")]
struct Cli {
    /// Bot API token.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// User id of the administrator.
    #[arg(long, env = "ADMIN_ID")]
    admin_id: Option<i64>,

    /// Data directory for the LMDB store.
    #[arg(long, env = "GATEKEEPER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "GATEKEEPER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "GATEKEEPER_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the bot until SIGINT/SIGTERM.
    Run,
    /// Print the effective configuration (token omitted) and exit.
    #[command(name = "print-config")]
    PrintConfig,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(BotConfig, Command)> {
        let mut config = match &self.config {
            Some(path) => BotConfig::from_toml_file(&path.to_string_lossy())
                .with_context(|| format!("loading {}", path.display()))?,
            None => BotConfig::default(),
        };
        if let Some(token) = self.bot_token {
            config.bot_token = Some(token);
        }
        if let Some(admin_id) = self.admin_id {
            config.admin_id = admin_id;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok((config, self.command))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, command) = Cli::parse().into_config()?;

    match command {
        Command::PrintConfig => {
            let shown = BotConfig {
                bot_token: None,
                ..config
            };
            print!("{}", shown.to_toml_string()?);
        }
        Command::Run => {
            init_logging(config.log_format()?, &config.log_level)?;
            tracing::info!(
                data_dir = %config.data_dir.display(),
                admin_id = config.admin_id,
                "starting gatekeeper"
            );

            let bot = GatekeeperBot::open(config).context("starting bot")?;
            bot.run().await?;

            tracing::info!("gatekeeper daemon exited cleanly");
        }
    }

    Ok(())
}
