//! Gemini Live model implementation.

use crate::audio::AudioFormat;
use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::model::RealtimeModel;
use crate::session::BoxedSession;
use async_trait::async_trait;
use std::time::Duration;

use super::session::GeminiLiveSession;
use super::{DEFAULT_MODEL, GEMINI_LIVE_URL};

const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach the Live API.
#[derive(Clone)]
pub enum GeminiLiveBackend {
    /// Public API (Google AI Studio), authenticated with an API key.
    Studio {
        /// API Key
        api_key: String,
    },
    /// Any compatible endpoint, used verbatim (proxies, local test servers).
    Endpoint {
        /// Full `ws://` or `wss://` URL.
        url: String,
    },
}

impl GeminiLiveBackend {
    /// Build a backend from the environment.
    ///
    /// `LIVEPILOT_ENDPOINT` wins when set; otherwise `GEMINI_API_KEY` or
    /// `GOOGLE_API_KEY` selects the public API.
    pub fn from_env() -> Result<Self> {
        if let Ok(url) = std::env::var("LIVEPILOT_ENDPOINT") {
            if !url.trim().is_empty() {
                return Ok(Self::Endpoint { url });
            }
        }
        std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(|api_key| Self::Studio { api_key })
            .ok_or_else(|| {
                RealtimeError::config("Set GEMINI_API_KEY, GOOGLE_API_KEY or LIVEPILOT_ENDPOINT")
            })
    }

    /// Resolve the WebSocket URL for this backend.
    pub fn url(&self) -> Result<String> {
        match self {
            Self::Studio { api_key } => {
                let url = url::Url::parse_with_params(GEMINI_LIVE_URL, &[("key", api_key)])
                    .map_err(|e| RealtimeError::config(format!("Invalid live URL: {}", e)))?;
                Ok(url.to_string())
            }
            Self::Endpoint { url } => {
                let parsed = url::Url::parse(url)
                    .map_err(|e| RealtimeError::config(format!("Invalid endpoint: {}", e)))?;
                match parsed.scheme() {
                    "ws" | "wss" => Ok(parsed.to_string()),
                    other => Err(RealtimeError::config(format!(
                        "Endpoint scheme must be ws or wss, got {}",
                        other
                    ))),
                }
            }
        }
    }
}

impl std::fmt::Debug for GeminiLiveBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Studio { .. } => f.debug_struct("Studio").field("api_key", &"<redacted>").finish(),
            Self::Endpoint { url } => f.debug_struct("Endpoint").field("url", url).finish(),
        }
    }
}

/// Gemini Live model for creating live sessions.
///
/// # Example
///
/// ```rust,ignore
/// use livepilot_realtime::gemini::{GeminiLiveBackend, GeminiLiveModel};
/// use livepilot_realtime::RealtimeModel;
///
/// let backend = GeminiLiveBackend::Studio { api_key: "key".to_string() };
/// let model = GeminiLiveModel::new(backend, "models/gemini-2.0-flash-live-001");
/// let session = model.connect(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct GeminiLiveModel {
    backend: GeminiLiveBackend,
    model_id: String,
    setup_timeout: Duration,
}

impl GeminiLiveModel {
    /// Create a new Gemini Live model.
    pub fn new(backend: GeminiLiveBackend, model_id: impl Into<String>) -> Self {
        Self { backend, model_id: model_id.into(), setup_timeout: DEFAULT_SETUP_TIMEOUT }
    }

    /// Create with the default Live model.
    pub fn with_default_model(backend: GeminiLiveBackend) -> Self {
        Self::new(backend, DEFAULT_MODEL)
    }

    /// Bound how long to wait for the setup acknowledgement.
    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    /// Get the backend configuration.
    pub fn backend(&self) -> &GeminiLiveBackend {
        &self.backend
    }
}

#[async_trait]
impl RealtimeModel for GeminiLiveModel {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn input_format(&self) -> AudioFormat {
        AudioFormat::pcm16_16khz()
    }

    fn output_format(&self) -> AudioFormat {
        AudioFormat::pcm16_24khz()
    }

    async fn connect(&self, config: RealtimeConfig) -> Result<BoxedSession> {
        let model = config.model.clone().unwrap_or_else(|| self.model_id.clone());
        let url = self.backend.url()?;
        let session = GeminiLiveSession::connect(&url, &model, config, self.setup_timeout).await?;
        Ok(Box::new(session))
    }
}
