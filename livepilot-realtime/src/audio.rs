//! Audio formats and the PCM16 wire codec.
//!
//! Capture produces normalized `f32` samples in `[-1, 1]`. On the wire audio
//! travels as base64-encoded 16-bit little-endian PCM tagged with its sample
//! rate (`audio/pcm;rate=16000`). Received audio is turned back into a planar
//! [`PcmBuffer`] that the playback side can schedule.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{RealtimeError, Result};

/// Sample rate of microphone audio sent to the service.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of audio produced by the service unless the payload says otherwise.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Mime type used for still frames.
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

const PCM_MIME_PREFIX: &str = "audio/pcm";

/// Sample rate and channel layout of a PCM16 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz (e.g., 24000, 16000).
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16_24khz()
    }
}

impl AudioFormat {
    /// Create a new PCM16 format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels }
    }

    /// Mono PCM16 at 24kHz (service output default).
    pub fn pcm16_24khz() -> Self {
        Self::new(OUTPUT_SAMPLE_RATE, 1)
    }

    /// Mono PCM16 at 16kHz (microphone input).
    pub fn pcm16_16khz() -> Self {
        Self::new(INPUT_SAMPLE_RATE, 1)
    }

    /// The wire mime type, e.g. `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        format!("{};rate={}", PCM_MIME_PREFIX, self.sample_rate)
    }

    /// Parse a PCM mime type. Missing rates fall back to the output default.
    ///
    /// Returns `None` for non-PCM mime types.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let mut params = mime.split(';').map(str::trim);
        if !params.next()?.eq_ignore_ascii_case(PCM_MIME_PREFIX) {
            return None;
        }
        let rate = params
            .filter_map(|p| p.split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("rate"))
            .and_then(|(_, v)| v.trim().parse::<u32>().ok())
            .unwrap_or(OUTPUT_SAMPLE_RATE);
        Some(Self::new(rate, 1))
    }
}

/// A base64 payload with its mime type, as carried by realtime input messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBlob {
    /// Mime type of the payload.
    pub mime_type: String,
    /// Base64-encoded payload bytes.
    pub data: String,
}

impl MediaBlob {
    /// Wrap raw bytes.
    pub fn new(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Wrap an encoded JPEG still frame.
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self::new(JPEG_MIME_TYPE, bytes)
    }
}

/// Audio chunk with format information.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw PCM16 little-endian audio data.
    pub data: Vec<u8>,
    /// Audio format of this chunk.
    pub format: AudioFormat,
}

impl AudioChunk {
    /// Create a new audio chunk.
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }

    /// Create a PCM16 16kHz audio chunk (microphone format).
    pub fn pcm16_16khz(data: Vec<u8>) -> Self {
        Self::new(data, AudioFormat::pcm16_16khz())
    }

    /// Encode audio data as base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Wrap as a wire blob tagged with the sample rate.
    pub fn to_blob(&self) -> MediaBlob {
        MediaBlob { mime_type: self.format.mime_type(), data: self.to_base64() }
    }

    /// Create a chunk from normalized float samples.
    ///
    /// Samples are clamped to `[-1, 1]` before conversion so overdriven input
    /// saturates instead of wrapping.
    pub fn from_f32_samples(samples: &[f32], format: AudioFormat) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&f32_to_i16(*sample).to_le_bytes());
        }
        Self::new(data, format)
    }

    /// Create an AudioChunk from i16 samples (converts to PCM16 little-endian bytes).
    pub fn from_i16_samples(samples: &[i16], format: AudioFormat) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Self::new(data, format)
    }

    /// Convert the audio data to a vector of i16 samples.
    pub fn to_i16_samples(&self) -> Result<Vec<i16>> {
        if self.data.len() % 2 != 0 {
            return Err(RealtimeError::audio(format!(
                "Invalid data length for PCM16: {} (must be even)",
                self.data.len()
            )));
        }
        Ok(self.data.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect())
    }
}

/// Decoded, playable audio in planar float layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Build a buffer from planar channel data. All channels must be equally long.
    pub fn from_planar(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(RealtimeError::audio("Sample rate must be non-zero"));
        }
        if channels.is_empty() {
            return Err(RealtimeError::audio("At least one channel is required"));
        }
        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(RealtimeError::audio("Channels have differing lengths"));
        }
        Ok(Self { sample_rate, channels })
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Samples for one channel.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Playback duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Encode capture samples for the wire.
///
/// Fails on an empty frame; the service rejects zero-length media chunks.
pub fn encode(samples: &[f32]) -> Result<MediaBlob> {
    if samples.is_empty() {
        return Err(RealtimeError::audio("Cannot encode an empty sample frame"));
    }
    Ok(AudioChunk::from_f32_samples(samples, AudioFormat::pcm16_16khz()).to_blob())
}

/// Inverse of the transport base64 wrapping.
pub fn decode(data: &str) -> Result<Vec<u8>> {
    Ok(base64::engine::general_purpose::STANDARD.decode(data)?)
}

/// Reinterpret PCM16 little-endian bytes as a playable buffer.
///
/// The byte length must be a whole number of interleaved frames
/// (`2 * channels` bytes each).
pub fn decode_audio_data(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<PcmBuffer> {
    if channels == 0 {
        return Err(RealtimeError::audio("Channel count must be non-zero"));
    }
    let frame_bytes = 2 * channels as usize;
    if bytes.len() % frame_bytes != 0 {
        return Err(RealtimeError::audio(format!(
            "PCM16 payload of {} bytes is not a multiple of {} bytes per frame",
            bytes.len(),
            frame_bytes
        )));
    }

    let frames = bytes.len() / frame_bytes;
    let mut planar = vec![Vec::with_capacity(frames); channels as usize];
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        planar[i % channels as usize].push(sample as f32 / 32768.0);
    }
    PcmBuffer::from_planar(sample_rate, planar)
}

/// Mean absolute sample value, used as a cheap speech-energy estimate.
pub fn mean_abs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}

fn f32_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 { (s * 32768.0) as i16 } else { (s * 32767.0) as i16 }
}

/// Collects capture samples into fixed-size frames.
///
/// Platforms deliver microphone audio in whatever block size the device uses;
/// the service is fed uniform frames so the per-frame energy estimate and the
/// send cadence stay stable.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    buffer: Vec<f32>,
    frame_size: usize,
}

impl FrameBuffer {
    /// Create a framer emitting `frame_size` samples per frame.
    pub fn new(frame_size: usize) -> Self {
        Self { buffer: Vec::with_capacity(frame_size * 2), frame_size: frame_size.max(1) }
    }

    /// Configured frame size.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Push new samples into the buffer.
    pub fn push(&mut self, samples: &[f32]) {
        self.buffer.extend_from_slice(samples);
    }

    /// Take the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Vec<f32>> {
        if self.buffer.len() < self.frame_size {
            return None;
        }
        let rest = self.buffer.split_off(self.frame_size);
        Some(std::mem::replace(&mut self.buffer, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_emits_fixed_frames() {
        let mut framer = FrameBuffer::new(4);

        framer.push(&[0.1, 0.2, 0.3]);
        assert!(framer.next_frame().is_none());

        framer.push(&[0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);
        assert_eq!(framer.next_frame().unwrap(), vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(framer.next_frame().unwrap(), vec![0.5, 0.6, 0.7, 0.8]);
        assert!(framer.next_frame().is_none());

        framer.push(&[1.0, 1.1, 1.2]);
        assert_eq!(framer.next_frame().unwrap(), vec![0.9, 1.0, 1.1, 1.2]);
    }

    #[test]
    fn test_mime_type_roundtrip() {
        let format = AudioFormat::pcm16_16khz();
        assert_eq!(format.mime_type(), "audio/pcm;rate=16000");
        assert_eq!(AudioFormat::from_mime_type("audio/pcm;rate=16000"), Some(format));
        assert_eq!(
            AudioFormat::from_mime_type("audio/pcm"),
            Some(AudioFormat::pcm16_24khz())
        );
        assert_eq!(AudioFormat::from_mime_type("image/jpeg"), None);
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        let blob = encode(&[2.0, -2.0, 0.0]).unwrap();
        assert_eq!(blob.mime_type, "audio/pcm;rate=16000");

        let bytes = decode(&blob.data).unwrap();
        let chunk = AudioChunk::pcm16_16khz(bytes);
        assert_eq!(chunk.to_i16_samples().unwrap(), vec![32767, -32768, 0]);
    }

    #[test]
    fn test_encode_rejects_empty() {
        assert!(matches!(encode(&[]), Err(RealtimeError::AudioFormatError(_))));
    }

    #[test]
    fn test_decode_audio_data_stereo_deinterleaves() {
        let chunk = AudioChunk::from_i16_samples(&[16384, -16384, 0, 32767], AudioFormat::new(24000, 2));
        let buffer = decode_audio_data(&chunk.data, 24000, 2).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.channel(0).unwrap(), &[0.5, 0.0]);
        assert_eq!(buffer.channel(1).unwrap(), &[-0.5, 32767.0 / 32768.0]);
    }

    #[test]
    fn test_decode_audio_data_rejects_partial_frames() {
        assert!(decode_audio_data(&[0, 1, 2], 24000, 1).is_err());
        assert!(decode_audio_data(&[0, 1, 2, 3, 4, 5], 24000, 2).is_err());
        assert!(decode_audio_data(&[0, 1], 24000, 0).is_err());
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = decode_audio_data(&vec![0u8; 48000], 24000, 1).unwrap();
        assert!((buffer.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_abs() {
        assert_eq!(mean_abs(&[]), 0.0);
        assert!((mean_abs(&[0.5, -0.5, 0.0, 0.0]) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_i16_samples_odd_bytes_error() {
        let chunk = AudioChunk::pcm16_16khz(vec![0, 1, 2]);
        assert!(chunk.to_i16_samples().is_err());
    }
}
