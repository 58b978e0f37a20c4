//! Transport for the Gemini Live bidirectional WebSocket API.
//!
//! - Input audio: 16kHz mono PCM
//! - Output audio: 24kHz mono PCM
//! - Instruction, voice and tools are fixed for the lifetime of a session
//!
//! # Example
//!
//! ```rust,ignore
//! use livepilot_realtime::gemini::{GeminiLiveBackend, GeminiLiveModel};
//! use livepilot_realtime::{RealtimeConfig, RealtimeModel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = GeminiLiveModel::with_default_model(GeminiLiveBackend::from_env()?);
//!
//!     let config = RealtimeConfig::default()
//!         .with_instruction("You are a helpful assistant.")
//!         .with_transcription();
//!
//!     let session = model.connect(config).await?;
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

mod model;
mod protocol;
mod session;

pub use model::{GeminiLiveBackend, GeminiLiveModel};
pub use session::GeminiLiveSession;

/// Endpoint for API-key authenticated sessions.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Native-audio model used when none is configured.
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";

/// Default prebuilt voice.
pub const DEFAULT_VOICE: &str = "Puck";

/// Install the process-wide rustls provider once. Later calls are no-ops.
pub(crate) fn ensure_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
