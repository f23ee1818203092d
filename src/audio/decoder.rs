//! Decoding of incoming voice payloads to mono f32 samples
//!
//! Telegram voice notes arrive as OGG/Opus; anything else is handed to
//! symphonia.

use std::io::Cursor;

use audiopus::coder::Decoder as OpusDecoder;
use audiopus::{Channels, SampleRate};
use ogg::PacketReader;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use super::AudioError;

/// Opus always decodes at 48kHz
const OPUS_SAMPLE_RATE: u32 = 48_000;

/// Largest possible Opus frame: 120ms at 48kHz
const MAX_OPUS_FRAME: usize = 5760;

/// Decoded audio, mono
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode raw bytes into mono f32 samples plus the source sample rate
pub fn decode(data: &[u8]) -> Result<DecodedAudio, AudioError> {
    if data.starts_with(b"OggS") {
        if let Some(audio) = decode_ogg_opus(data)? {
            return Ok(audio);
        }
    }
    decode_with_symphonia(data)
}

/// Decode an OGG/Opus stream.
///
/// Returns `Ok(None)` when the container is OGG but the first packet is not
/// an `OpusHead`, so the caller can fall back to symphonia (e.g. Vorbis).
fn decode_ogg_opus(data: &[u8]) -> Result<Option<DecodedAudio>, AudioError> {
    let mut reader = PacketReader::new(Cursor::new(data));

    let head = reader
        .read_packet()
        .map_err(|e| AudioError::Decode(format!("ogg read: {e}")))?
        .ok_or_else(|| AudioError::Decode("empty ogg stream".into()))?;

    if !head.data.starts_with(b"OpusHead") {
        return Ok(None);
    }
    if head.data.len() < 12 {
        return Err(AudioError::Decode("truncated OpusHead".into()));
    }

    let channel_count = head.data[9] as usize;
    let pre_skip = u16::from_le_bytes([head.data[10], head.data[11]]) as usize;

    let channels = match channel_count {
        1 => Channels::Mono,
        2 => Channels::Stereo,
        n => return Err(AudioError::Decode(format!("unsupported channel count {n}"))),
    };

    let mut decoder = OpusDecoder::new(SampleRate::Hz48000, channels)
        .map_err(|e| AudioError::Decode(format!("opus init: {e}")))?;

    // Second packet is OpusTags, drop it
    reader
        .read_packet()
        .map_err(|e| AudioError::Decode(format!("ogg read: {e}")))?;

    let mut samples = Vec::new();
    let mut frame = vec![0.0f32; MAX_OPUS_FRAME * channel_count];

    while let Some(packet) = reader
        .read_packet()
        .map_err(|e| AudioError::Decode(format!("ogg read: {e}")))?
    {
        if packet.data.is_empty() {
            continue;
        }
        let decoded = decoder
            .decode_float(Some(packet.data.as_slice()), frame.as_mut_slice(), false)
            .map_err(|e| AudioError::Decode(format!("opus decode: {e}")))?;

        match channel_count {
            1 => samples.extend_from_slice(&frame[..decoded]),
            _ => {
                for pair in frame[..decoded * channel_count].chunks(channel_count) {
                    samples.push(pair.iter().sum::<f32>() / channel_count as f32);
                }
            }
        }
    }

    // Opus encoders front-load priming samples; the header says how many
    let samples = if pre_skip < samples.len() {
        samples.split_off(pre_skip)
    } else {
        Vec::new()
    };

    if samples.is_empty() {
        return Err(AudioError::Decode("no audio samples decoded".into()));
    }

    debug!("Decoded {} opus samples at 48kHz", samples.len());
    Ok(Some(DecodedAudio {
        samples,
        sample_rate: OPUS_SAMPLE_RATE,
    }))
}

/// Decode WAV/MP3/FLAC/Vorbis payloads, mixing down to mono
fn decode_with_symphonia(data: &[u8]) -> Result<DecodedAudio, AudioError> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(format!("probe failed: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("no audio track found".into()))?;

    let codec_params = track.codec_params.clone();
    let track_id = track.id;
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("unknown sample rate".into()))?;
    let channels = codec_params.channels.map_or(1, |c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("codec init failed: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AudioError::Decode(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| AudioError::Decode(format!("decode: {e}")))?;

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let interleaved = sample_buf.samples();

        if channels > 1 {
            for chunk in interleaved.chunks(channels) {
                samples.push(chunk.iter().sum::<f32>() / channels as f32);
            }
        } else {
            samples.extend_from_slice(interleaved);
        }
    }

    if samples.is_empty() {
        return Err(AudioError::Decode("no audio samples decoded".into()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Resample mono audio from `from_rate` to `to_rate`
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| AudioError::Resample(format!("init: {e}")))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + 1024);

    for chunk in samples.chunks(chunk_size) {
        let input = if chunk.len() < chunk_size {
            // Pad last chunk with zeros
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            vec![padded]
        } else {
            vec![chunk.to_vec()]
        };

        let resampled = resampler
            .process(&input, None)
            .map_err(|e| AudioError::Resample(format!("process: {e}")))?;

        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, samples: &[f32]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                writer.write_sample(v).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode(b"not audio data").is_err());
        assert!(decode(b"").is_err());
    }

    #[test]
    fn test_decode_truncated_ogg_fails() {
        assert!(decode(b"OggS\x00\x00").is_err());
    }

    #[test]
    fn test_decode_wav() {
        let tone: Vec<f32> = (0..4800)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        let bytes = wav_bytes(48_000, &tone);
        let audio = decode(&bytes).unwrap();
        assert_eq!(audio.sample_rate, 48_000);
        assert_eq!(audio.samples.len(), tone.len());
        assert!(audio.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_resample_identity() {
        let samples: Vec<f32> = (0..16000).map(|i| (i as f32 / 16000.0).sin()).collect();
        let result = resample(&samples, 16000, 16000).unwrap();
        let ratio = result.len() as f64 / samples.len() as f64;
        assert!((ratio - 1.0).abs() < 0.1, "ratio: {ratio}");
    }

    #[test]
    fn test_resample_downsample() {
        // 48kHz -> 16kHz should produce ~1/3 the samples
        let samples: Vec<f32> = (0..48000).map(|i| (i as f32 / 48000.0).sin()).collect();
        let result = resample(&samples, 48000, 16000).unwrap();
        let ratio = result.len() as f64 / samples.len() as f64;
        assert!((ratio - 1.0 / 3.0).abs() < 0.05, "ratio: {ratio}");
    }
}
