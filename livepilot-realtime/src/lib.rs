//! # livepilot-realtime
//!
//! Transport layer for live voice sessions.
//!
//! This crate provides a provider-neutral session interface over a bidirectional
//! streaming connection to a conversational AI service, plus the PCM16 codec used
//! to move microphone and response audio across it.
//!
//! ## Architecture
//!
//! ```text
//!   f32 capture ──► audio::encode ──► MediaBlob ──► RealtimeSession::send_media
//!                                                          │
//!                                                  (remote service)
//!                                                          │
//!   PcmBuffer ◄── audio::decode_audio_data ◄── ServerEvent::Audio ◄── next_event
//! ```
//!
//! - **RealtimeModel** opens sessions from a [`RealtimeConfig`]
//! - **RealtimeSession** sends media, text and tool responses and yields [`ServerEvent`]s
//! - **audio** converts between capture samples, wire blobs and playable buffers
//!
//! ## Example
//!
//! ```rust,ignore
//! use livepilot_realtime::{RealtimeConfig, RealtimeModel, ServerEvent};
//! use livepilot_realtime::gemini::{GeminiLiveBackend, GeminiLiveModel};
//!
//! let model = GeminiLiveModel::with_default_model(GeminiLiveBackend::from_env()?);
//! let session = model.connect(RealtimeConfig::default().with_transcription()).await?;
//!
//! while let Some(event) = session.next_event().await {
//!     match event? {
//!         ServerEvent::Audio { data, .. } => { /* play audio */ }
//!         ServerEvent::OutputTranscription { text } => println!("{}", text),
//!         _ => {}
//!     }
//! }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod session;

// Provider implementations
#[cfg(feature = "gemini")]
pub mod gemini;

// Re-exports
pub use audio::{AudioChunk, AudioFormat, FrameBuffer, MediaBlob, PcmBuffer};
pub use config::{Modality, RealtimeConfig, ToolDefinition};
pub use error::{RealtimeError, Result};
pub use events::{FunctionCall, ServerEvent, ToolResponse};
pub use model::{BoxedModel, RealtimeModel};
pub use session::{BoxedSession, RealtimeSession, SharedSession};
