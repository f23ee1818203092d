//! Collector bot
//!
//! A Telegram bot that stores incoming voice messages as 16kHz WAV files
//! and keeps the photos in which a face is detected.

mod audio;
mod bot;
mod config;
mod database;
mod image;

use config::Config;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,collector_bot=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Collector bot starting...");

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Please ensure TELEGRAM_BOT_TOKEN is set in .env file");
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully");

    // Create the on-disk data tree up front
    let mut dirs = vec![config.audio_dir(), config.image_dir()];
    if let Some(db_dir) = config.database_path.parent() {
        dirs.push(db_dir.to_path_buf());
    }
    for dir in dirs {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            error!("Failed to create data directory {:?}: {}", dir, e);
            std::process::exit(1);
        }
    }

    // Run the bot
    if let Err(e) = bot::run(config).await {
        error!("Bot error: {}", e);
        std::process::exit(1);
    }
}
