//! The connection factory seam.

use crate::audio::AudioFormat;
use crate::config::RealtimeConfig;
use crate::error::Result;
use crate::session::BoxedSession;
use async_trait::async_trait;

/// A factory for live sessions.
///
/// # Example
///
/// ```rust,ignore
/// use livepilot_realtime::{RealtimeConfig, RealtimeModel};
/// use livepilot_realtime::gemini::{GeminiLiveBackend, GeminiLiveModel};
///
/// let model = GeminiLiveModel::with_default_model(GeminiLiveBackend::from_env()?);
/// let session = model
///     .connect(RealtimeConfig::default().with_instruction("You are a helpful assistant."))
///     .await?;
/// session.close().await?;
/// ```
#[async_trait]
pub trait RealtimeModel: Send + Sync {
    /// Short backend name, used in logs.
    fn provider(&self) -> &str;

    /// Model id sent in setup unless the config overrides it.
    fn model_id(&self) -> &str;

    /// Audio format the service expects from the microphone. Sizes the
    /// capture context.
    fn input_format(&self) -> AudioFormat;

    /// Audio format the service produces unless a payload says otherwise.
    /// Sizes the playback context and is the fallback decode rate.
    fn output_format(&self) -> AudioFormat;

    /// Open a session configured with `config`.
    ///
    /// Resolves once the service has accepted the setup.
    async fn connect(&self, config: RealtimeConfig) -> Result<BoxedSession>;
}

/// Model handle shared by the manager and its restarts.
pub type BoxedModel = std::sync::Arc<dyn RealtimeModel>;
