//! Telegram front end: dispatcher wiring and message handlers

use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use tokio::task;
use tracing::{debug, info, warn};

use crate::audio::{AudioError, AudioProcessor};
use crate::config::Config;
use crate::database::{Database, DatabaseError};
use crate::image::{preprocess, DetectionParams, FaceDetector, ImageError, ImageStore};

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Telegram API error: {0}")]
    Request(#[from] teloxide::RequestError),
    #[error("Download error: {0}")]
    Download(#[from] teloxide::DownloadError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Worker task failed: {0}")]
    Join(#[from] task::JoinError),
}

/// Bot state shared across handlers
pub struct BotState {
    pub audio: AudioProcessor,
    pub detector: FaceDetector,
    pub images: ImageStore,
    pub db: Arc<Database>,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "say hi.")]
    Start,
    #[command(description = "how many voice messages we have from you.")]
    AudioCount,
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> Result<(), BotError> {
    match cmd {
        Command::Start => {
            let name = msg
                .from
                .as_ref()
                .map_or_else(|| "there".to_string(), |user| user.first_name.clone());
            bot.send_message(msg.chat.id, format!("Hi {name}!")).await?;
        }
        Command::AudioCount => {
            let Some(user) = msg.from.as_ref() else {
                return Ok(());
            };
            let count = state.db.count_audios(user.id.0)?;
            bot.send_message(msg.chat.id, format!("We have {count} audios from you"))
                .await?;
        }
    }
    Ok(())
}

/// Voice messages: normalize to 16kHz WAV and record the submission
async fn handle_voice(bot: Bot, msg: Message, state: Arc<BotState>) -> Result<(), BotError> {
    let (Some(user), Some(voice)) = (msg.from.as_ref(), msg.voice()) else {
        return Ok(());
    };
    let user_id = user.id.0;

    let data = download(&bot, voice.file.id.clone()).await?;
    debug!("Downloaded {} voice bytes from user {}", data.len(), user_id);

    let worker_state = state.clone();
    let result = task::spawn_blocking(move || worker_state.audio.process(&data, user_id)).await?;

    match result {
        Ok(record) => info!("Stored {} for user {}", record.name, user_id),
        Err(AudioError::Decode(reason)) => {
            warn!("Discarding undecodable voice from user {}: {}", user_id, reason);
        }
        Err(e) => return Err(e.into()),
    }

    bot.send_message(msg.chat.id, "Let's check this audio!")
        .await?;
    Ok(())
}

/// Photos: keep only the ones containing at least one face
async fn handle_photo(bot: Bot, msg: Message, state: Arc<BotState>) -> Result<(), BotError> {
    // Telegram sends several sizes, the last one is the largest
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };

    let data = download(&bot, photo.file.id.clone()).await?;
    debug!("Downloaded {} photo bytes", data.len());

    let worker_state = state.clone();
    let result = task::spawn_blocking(move || -> Result<bool, ImageError> {
        let prepared = preprocess::prepare(&data)?;
        let found = worker_state.detector.has_face(&prepared)?;
        if found {
            worker_state.images.save(&data)?;
        }
        Ok(found)
    })
    .await?;

    let has_face = match result {
        Ok(found) => found,
        Err(ImageError::Decode(reason)) => {
            warn!("Discarding undecodable photo: {}", reason);
            false
        }
        Err(e) => return Err(e.into()),
    };

    let reply = if has_face {
        "What a beautiful face!"
    } else {
        "Wow, thanks!"
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

/// Fetch a file payload into memory
async fn download(bot: &Bot, file_id: String) -> Result<Vec<u8>, BotError> {
    let file = bot.get_file(file_id).await?;
    let mut buffer = Vec::new();
    bot.download_file(&file.path, &mut buffer).await?;
    Ok(buffer)
}

/// Build the teloxide update handler tree
fn handler_tree() -> UpdateHandler<BotError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.voice().is_some()).endpoint(handle_voice),
        )
        .branch(
            dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(handle_photo),
        )
}

/// Create and run the Telegram bot
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db = Arc::new(Database::open(&config.database_path)?);

    let state = Arc::new(BotState {
        audio: AudioProcessor::new(db.clone(), config.audio_dir()),
        detector: FaceDetector::new(&config.face_model_path, DetectionParams::default()),
        images: ImageStore::new(config.image_dir()),
        db,
    });

    let bot = Bot::new(&config.telegram_token);

    info!("Starting dispatcher...");
    Dispatcher::builder(bot, handler_tree())
        .dependencies(dptree::deps![state])
        .default_handler(|update| async move {
            debug!("Unhandled update: {:?}", update);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("Handler error"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
