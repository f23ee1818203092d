//! Audio module for decoding, resampling and storing voice messages

pub mod decoder;
pub mod processor;

pub use decoder::DecodedAudio;
pub use processor::AudioProcessor;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error("WAV write error: {0}")]
    Wav(#[from] hound::Error),
    #[error(transparent)]
    Database(#[from] crate::database::DatabaseError),
}
