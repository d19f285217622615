//! Audio Codec: pure transforms, no I/O beyond in-memory buffers.
//!
//! `decode_to_pcm` accepts any container `symphonia` can self-describe from
//! the byte stream (WAV, MP3, FLAC, AAC, Ogg/Vorbis, AIFF), downmixes to
//! mono, resamples to the caller's target rate, and quantizes to 16-bit
//! signed little-endian PCM. `pcm_to_wav` wraps raw PCM back into a minimal
//! WAV container for client playback.

use std::io::Cursor;

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::BridgeError;

/// Minimum audio duration the orchestrator expects a caller to honor;
/// shorter decodes are returned as-is with a warning rather than rejected.
const MIN_DURATION_MS: f64 = 100.0;

/// Decode an arbitrary container to 16-bit mono PCM at `target_rate`.
pub fn decode_to_pcm(bytes: &[u8], target_rate: u32) -> Result<Vec<u8>, BridgeError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| BridgeError::CodecFailed(format!("unrecognized container: {e}")))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| BridgeError::CodecFailed("no decodable track".to_string()))?;
    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| BridgeError::CodecFailed("track has no sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| BridgeError::CodecFailed(format!("unsupported codec: {e}")))?;

    let mut mono_samples: Vec<f32> = Vec::new();
    loop {
        let packet = match probed.format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(_)) => break,
            Err(e) => return Err(BridgeError::CodecFailed(format!("demux error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => push_downmixed(decoded, &mut mono_samples),
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(BridgeError::CodecFailed(format!("decode error: {e}"))),
        }
    }

    let resampled = if source_rate == target_rate {
        mono_samples
    } else {
        resample(&mono_samples, source_rate, target_rate)?
    };

    let pcm = quantize_i16le(&resampled);

    let duration_ms = (pcm.len() as f64 / 2.0) / target_rate as f64 * 1000.0;
    if duration_ms < MIN_DURATION_MS {
        tracing::warn!(duration_ms, "decoded audio shorter than minimum duration");
    }

    Ok(pcm)
}

fn push_downmixed(decoded: AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => downmix_planar(buf.planes().planes(), out),
        AudioBufferRef::S32(buf) => {
            let planes: Vec<Vec<f32>> = buf
                .planes()
                .planes()
                .iter()
                .map(|p| p.iter().map(|s| *s as f32 / i32::MAX as f32).collect())
                .collect();
            let refs: Vec<&[f32]> = planes.iter().map(|p| p.as_slice()).collect();
            downmix_planar(&refs, out);
        }
        AudioBufferRef::S16(buf) => {
            let planes: Vec<Vec<f32>> = buf
                .planes()
                .planes()
                .iter()
                .map(|p| p.iter().map(|s| *s as f32 / i16::MAX as f32).collect())
                .collect();
            let refs: Vec<&[f32]> = planes.iter().map(|p| p.as_slice()).collect();
            downmix_planar(&refs, out);
        }
        _ => {}
    }
}

fn downmix_planar(planes: &[&[f32]], out: &mut Vec<f32>) {
    if planes.is_empty() {
        return;
    }
    let frames = planes[0].len();
    let channels = planes.len() as f32;
    for i in 0..frames {
        let sum: f32 = planes.iter().map(|plane| plane[i]).sum();
        out.push(sum / channels);
    }
}

fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, BridgeError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| BridgeError::CodecFailed(format!("resampler init failed: {e}")))?;

    let output = resampler
        .process(&[samples.to_vec()], None)
        .map_err(|e| BridgeError::CodecFailed(format!("resample failed: {e}")))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

fn quantize_i16le(samples: &[f32]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let quantized = (clamped * i16::MAX as f32) as i16;
        pcm.extend_from_slice(&quantized.to_le_bytes());
    }
    pcm
}

/// Wrap raw 16-bit mono PCM in a minimal WAV container at `rate`.
pub fn pcm_to_wav(pcm: &[u8], rate: u32) -> Result<Vec<u8>, BridgeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buffer, spec)
            .map_err(|e| BridgeError::CodecFailed(format!("wav writer init failed: {e}")))?;
        for chunk in pcm.chunks_exact(2) {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            writer
                .write_sample(sample)
                .map_err(|e| BridgeError::CodecFailed(format!("wav write failed: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| BridgeError::CodecFailed(format!("wav finalize failed: {e}")))?;
    }

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wav(rate: u32, seconds: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buffer, spec).unwrap();
            let samples = (rate as f32 * seconds) as usize;
            for i in 0..samples {
                let t = i as f32 / rate as f32;
                let sample = (t * 440.0 * std::f32::consts::TAU).sin() * i16::MAX as f32 * 0.5;
                writer.write_sample(sample as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn decodes_wav_and_resamples_to_target_rate() {
        let wav = sine_wav(48000, 0.2);
        let pcm = decode_to_pcm(&wav, 24000).unwrap();
        let expected_samples = (24000.0 * 0.2) as usize;
        let actual_samples = pcm.len() / 2;
        assert!(
            (actual_samples as i64 - expected_samples as i64).unsigned_abs() < 200,
            "actual={actual_samples} expected={expected_samples}"
        );
    }

    #[test]
    fn decode_passes_through_when_already_target_rate() {
        let wav = sine_wav(16000, 0.1);
        let pcm = decode_to_pcm(&wav, 16000).unwrap();
        assert!(!pcm.is_empty());
    }

    #[test]
    fn pcm_to_wav_round_trips_sample_values() {
        let pcm: Vec<u8> = vec![0x00, 0x10, 0xFF, 0x7F];
        let wav = pcm_to_wav(&pcm, 24000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let garbage = vec![0u8; 16];
        assert!(decode_to_pcm(&garbage, 16000).is_err());
    }
}
