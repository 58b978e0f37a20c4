//! Published session state.
//!
//! Presentation layers (buttons, waveform, command overlay) are driven by a
//! [`LiveStatus`] snapshot on a `watch` channel and by [`LiveEvent`]s on a
//! `broadcast` channel.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::settings::VisualSource;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
}

/// Snapshot of everything a UI needs to render.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveStatus {
    pub status: SessionStatus,
    /// Microphone energy is above the speech threshold.
    pub user_talking: bool,
    /// Response audio is scheduled or playing.
    pub model_talking: bool,
    pub muted: bool,
    pub mouse_mode: bool,
    pub camera_active: bool,
    pub screen_active: bool,
    /// Command currently on display, cleared after the display window.
    pub command: Option<Command>,
}

impl LiveStatus {
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    /// The visual source currently streaming.
    pub fn visual_source(&self) -> Option<VisualSource> {
        if self.camera_active {
            Some(VisualSource::Camera)
        } else if self.screen_active {
            Some(VisualSource::Screen)
        } else {
            None
        }
    }
}

/// Who produced a transcript fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Model,
}

/// Notifications published by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A session finished its setup and is streaming.
    SessionOpened { session_id: String, mouse_mode: bool },
    /// The session was torn down.
    SessionClosed { session_id: String },
    /// The desired mode changed.
    ModeChanged { mouse_mode: bool },
    /// A pointer command was parsed from model output.
    CommandIssued { command: Command },
    /// The displayed command was cleared.
    CommandExpired { command: Command },
    /// Model text output.
    ModelText { text: String },
    /// A transcription fragment.
    Transcript { role: TranscriptRole, text: String },
    /// A visual source could not be acquired or ended on its own.
    VisualStopped { source: VisualSource, reason: String },
}
