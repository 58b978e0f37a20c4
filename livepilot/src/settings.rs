//! Desired session configuration.
//!
//! [`LiveSettings`] describes what the next session should look like. It can
//! change while no session exists; the manager reads it when it (re)connects.
//! Capture tasks hold a [`watch::Receiver`] and read the latest snapshot on
//! every frame, so a flag flipped mid-session takes effect immediately.

use livepilot_realtime::gemini::{DEFAULT_MODEL, DEFAULT_VOICE};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Instruction used for ordinary spoken conversation.
pub const CONVERSATION_INSTRUCTION: &str = "You are a friendly, concise voice assistant. \
Answer in short spoken sentences. You can see the user's camera or screen when they share it. \
If the user asks you to take control of their mouse or computer, call set_mouse_control with \
enabled set to true.";

/// Instruction used while the model drives the pointer.
pub const MOUSE_CONTROL_INSTRUCTION: &str = "You are controlling the user's computer. \
Respond ONLY with a single JSON object and no other words, in the form \
{\"action\": \"move|left_click|right_click|double_click|scroll|open|none\", \
\"direction\": \"up|down|left|right|\", \"value\": <number>, \"application\": \"<name or empty>\"}. \
Use \"none\" when the request is not a pointer action. When the user asks to stop controlling \
the computer, call set_mouse_control with enabled set to false.";

/// Which camera to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera.
    #[default]
    User,
    /// Rear camera.
    Environment,
}

impl FacingMode {
    /// The other camera.
    pub fn flipped(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

/// Visual capture sources. At most one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualSource {
    Camera,
    Screen,
}

/// Desired session parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSettings {
    /// Model identifier passed to the transport.
    pub model: String,
    /// Voice name.
    pub voice: String,
    /// Whether model output is expected to be pointer commands.
    pub mouse_mode: bool,
    /// System instruction for the next session.
    pub instruction: String,
    /// Local microphone mute.
    pub muted: bool,
    /// Camera requested.
    pub camera_enabled: bool,
    /// Screen share requested.
    pub screen_enabled: bool,
    /// Camera facing.
    pub facing: FacingMode,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            mouse_mode: false,
            instruction: CONVERSATION_INSTRUCTION.to_string(),
            muted: false,
            camera_enabled: false,
            screen_enabled: false,
            facing: FacingMode::User,
        }
    }
}

impl LiveSettings {
    /// Defaults, with `LIVEPILOT_MODEL` and `LIVEPILOT_VOICE` applied when set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(model) = non_empty_var("LIVEPILOT_MODEL") {
            settings.model = model;
        }
        if let Some(voice) = non_empty_var("LIVEPILOT_VOICE") {
            settings.voice = voice;
        }
        settings
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Switch mode and install the matching instruction.
    pub fn with_mouse_mode(mut self, enabled: bool) -> Self {
        self.set_mouse_mode(enabled);
        self
    }

    pub(crate) fn set_mouse_mode(&mut self, enabled: bool) {
        self.mouse_mode = enabled;
        self.instruction = instruction_for(enabled).to_string();
    }

    /// The requested visual source, if any. Camera wins if both flags are set.
    pub fn visual_source(&self) -> Option<VisualSource> {
        if self.camera_enabled {
            Some(VisualSource::Camera)
        } else if self.screen_enabled {
            Some(VisualSource::Screen)
        } else {
            None
        }
    }

    pub(crate) fn request_visual(&mut self, source: Option<VisualSource>) {
        self.camera_enabled = source == Some(VisualSource::Camera);
        self.screen_enabled = source == Some(VisualSource::Screen);
    }
}

/// The instruction for a mode.
pub fn instruction_for(mouse_mode: bool) -> &'static str {
    if mouse_mode { MOUSE_CONTROL_INSTRUCTION } else { CONVERSATION_INSTRUCTION }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Single-writer holder for [`LiveSettings`].
///
/// Only the owner mutates; everyone else subscribes and reads the latest value.
#[derive(Debug)]
pub struct SettingsHandle {
    tx: watch::Sender<LiveSettings>,
}

impl SettingsHandle {
    pub fn new(settings: LiveSettings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { tx }
    }

    /// Current settings.
    pub fn snapshot(&self) -> LiveSettings {
        self.tx.borrow().clone()
    }

    /// Read a single field without cloning the whole snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&LiveSettings) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// A receiver that always observes the latest settings.
    pub fn subscribe(&self) -> watch::Receiver<LiveSettings> {
        self.tx.subscribe()
    }

    /// Mutate in place. Subscribers are notified only if something changed.
    pub fn update(&self, f: impl FnOnce(&mut LiveSettings)) {
        self.tx.send_if_modified(|settings| {
            let before = settings.clone();
            f(settings);
            *settings != before
        });
    }
}
