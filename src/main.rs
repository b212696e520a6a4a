//! # Rekindle
//!
//! Telegram giveaway bot with a time-gated warmup sequence: registers
//! participants on /start, tracks completion via the web-app event, and
//! re-engages everyone else with delayed reminder nudges.
//!
//! Usage:
//!   rekindle                          # config from ~/.rekindle/config.toml
//!   rekindle --config ./bot.toml
//!   rekindle --db-path ./users.db -v

mod bot;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rekindle_channels::telegram::{TelegramChannel, TelegramConfig};
use rekindle_core::config::RekindleConfig;
use rekindle_store::UserStore;
use rekindle_warmup::{StagePlan, WarmupScheduler};

#[derive(Parser)]
#[command(
    name = "rekindle",
    version,
    about = "🎁 Rekindle — giveaway bot with warmup reminders"
)]
struct Cli {
    /// Path to config.toml (default: ~/.rekindle/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the database path from the config
    #[arg(long)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => RekindleConfig::load_from(Path::new(path))?,
        None => RekindleConfig::load()?,
    };
    // Fatal before any scheduling starts.
    config.validate()?;

    let db_path = expand_path(cli.db_path.as_deref().unwrap_or(&config.db_path));
    let store = Arc::new(UserStore::open(Path::new(&db_path))?);

    let channel = Arc::new(TelegramChannel::new(TelegramConfig {
        bot_token: config.bot_token.clone(),
        webapp_url: config.webapp_url.clone(),
        button_text: config.messages.button.clone(),
        poll_timeout_secs: 30,
    }));

    let me = channel.get_me().await?;
    tracing::info!(
        "🤖 bot online: @{}",
        me.username.as_deref().unwrap_or("unknown")
    );

    let scheduler = WarmupScheduler::new(
        store.clone(),
        channel.clone(),
        StagePlan::from_config(&config.warmup),
        std::time::Duration::from_secs(config.warmup.tick_secs),
        std::time::Duration::from_millis(config.warmup.pace_ms),
    )
    .start();

    let mut updates = channel.clone().start_polling();
    let bot = bot::Bot::new(store, channel, config);

    loop {
        tokio::select! {
            Some(msg) = updates.recv() => bot.handle(msg).await,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("👋 shutting down");
    scheduler.stop().await;
    Ok(())
}
