//! # livepilot
//!
//! Real-time voice sessions with a live conversational model, with camera or
//! screen stills streamed alongside and an optional mode in which the model
//! answers with pointer commands instead of speech.
//!
//! ## Overview
//!
//! - [`LiveSessionManager`] opens and tears down the session, pumps the
//!   microphone into it, plays response audio back gaplessly, and restarts the
//!   session when the mode changes
//! - [`capture`] defines the platform seams (audio contexts, microphone,
//!   camera, screen) and the sequence-guarded [`MediaCapture`] adapter
//! - [`playback::PlaybackScheduler`] lays response chunks end to end on the
//!   output clock and flushes them on interruption
//! - [`command`] extracts pointer commands from model output
//! - [`testing`] provides in-memory devices and transport for tests and
//!   headless hosts
//!
//! The transport itself lives in `livepilot-realtime`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use livepilot::{ConnectOptions, LiveSessionManager, LiveSettings, Shortcut};
//! use livepilot_realtime::gemini::{GeminiLiveBackend, GeminiLiveModel};
//!
//! livepilot_telemetry::init_telemetry("livepilot");
//!
//! let model = GeminiLiveModel::with_default_model(GeminiLiveBackend::from_env()?);
//! let manager = LiveSessionManager::builder()
//!     .model(Arc::new(model))
//!     .devices(my_platform_devices())
//!     .settings(LiveSettings::from_env())
//!     .build()?;
//!
//! if let Some(shortcut) = Shortcut::from_key("Enter") {
//!     manager.handle_shortcut(shortcut).await?;
//! }
//! ```

pub mod capture;
pub mod command;
pub mod error;
pub mod frames;
pub mod manager;
pub mod outbound;
pub mod playback;
pub mod settings;
pub mod shortcuts;
pub mod status;
pub mod testing;

pub use capture::{
    AudioContext, AudioOutput, MediaCapture, MediaDevices, MediaTrack, MicrophoneStream,
    ScheduledSource, StreamHandle, VideoSource, VideoStream,
};
pub use command::{Action, Command, Direction, looks_like_command, try_parse};
pub use error::{CaptureError, LiveError, Result};
pub use manager::{
    ConnectOptions, LiveSessionManager, LiveSessionManagerBuilder, MOUSE_CONTROL_TOOL,
    ManagerOptions, mouse_control_tool,
};
pub use playback::PlaybackScheduler;
pub use settings::{FacingMode, LiveSettings, SettingsHandle, VisualSource};
pub use shortcuts::Shortcut;
pub use status::{LiveEvent, LiveStatus, SessionStatus, TranscriptRole};
