//! Configuration management for the collector bot
//!
//! Loads settings from environment variables (.env file)

use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Sample rate every stored voice message is converted to
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub telegram_token: String,
    /// Root of the on-disk data tree
    pub data_dir: PathBuf,
    /// SQLite database file
    pub database_path: PathBuf,
    /// SeetaFace frontal detection model
    pub face_model_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let telegram_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()))?;

        let data_dir: PathBuf = env::var("DATA_DIR")
            .unwrap_or_else(|_| "data".to_string())
            .into();

        let database_path = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("db").join("bot.db"));

        let face_model_path = env::var("FACE_MODEL_PATH")
            .unwrap_or_else(|_| "models/seeta_fd_frontal_v1.0.bin".to_string())
            .into();

        Ok(Self {
            telegram_token,
            data_dir,
            database_path,
            face_model_path,
        })
    }

    /// Per-user WAV files live under here
    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir.join("audio_data")
    }

    /// Accepted photos live under here
    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join("image_data")
    }
}
