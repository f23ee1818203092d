//! One-shot processing of a received voice message
//!
//! Decodes, resamples to the target rate and writes the WAV file at the
//! path the record store assigned.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::{decoder, AudioError};
use crate::config::TARGET_SAMPLE_RATE;
use crate::database::{AudioRecord, Database};

/// Audio pipeline for incoming voice messages
pub struct AudioProcessor {
    db: Arc<Database>,
    audio_dir: PathBuf,
}

impl AudioProcessor {
    pub fn new(db: Arc<Database>, audio_dir: PathBuf) -> Self {
        Self { db, audio_dir }
    }

    /// Normalize a voice payload and store it for the given user.
    ///
    /// The record store allocates the sequential name before anything is
    /// written, so the returned record always matches the file on disk.
    pub fn process(&self, data: &[u8], user_id: u64) -> Result<AudioRecord, AudioError> {
        let decoded = decoder::decode(data)?;
        debug!(
            "Decoded {} samples at {}Hz from user {}",
            decoded.samples.len(),
            decoded.sample_rate,
            user_id
        );

        let samples = if decoded.sample_rate == TARGET_SAMPLE_RATE {
            decoded.samples
        } else {
            decoder::resample(&decoded.samples, decoded.sample_rate, TARGET_SAMPLE_RATE)?
        };

        let record = self.db.create_audio_record(user_id, &self.audio_dir)?;

        if let Some(parent) = record.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_wav(&record.path, &samples)?;

        info!("Saved {} for user {} to {:?}", record.name, user_id, record.path);
        Ok(record)
    }
}

/// Write mono f32 samples as 16-bit PCM at the target rate
fn write_wav(path: &Path, samples: &[f32]) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}
