//! Keyboard shortcuts exposed to the host.

use serde::{Deserialize, Serialize};

/// A host-level shortcut action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shortcut {
    /// Enter: connect when idle, disconnect when connected.
    ToggleConnection,
    /// M: toggle the microphone mute.
    ToggleMute,
    /// Escape: disconnect if connected.
    Disconnect,
}

impl Shortcut {
    /// Map a DOM-style key name (`"Enter"`, `"m"`, `"Escape"`) to a shortcut.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "Enter" => Some(Shortcut::ToggleConnection),
            "m" | "M" => Some(Shortcut::ToggleMute),
            "Escape" | "Esc" => Some(Shortcut::Disconnect),
            _ => None,
        }
    }
}
