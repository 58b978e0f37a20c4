//! Pointer command interpreter.
//!
//! In mouse mode the model answers with a JSON object describing a pointer
//! action. Model output is noisy (code fences, leading prose, partial
//! transcripts), so extraction is lenient and failure is silent.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Pointer action requested by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Move,
    LeftClick,
    RightClick,
    DoubleClick,
    Scroll,
    Open,
    /// Sentinel: the request was not a pointer action.
    None,
}

/// Direction for `move` and `scroll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// A parsed pointer intent, handed to a downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    /// Empty on the wire when the action has no direction.
    #[serde(default, with = "direction_field")]
    pub direction: Option<Direction>,
    /// Magnitude, e.g. pixels or scroll steps.
    #[serde(default)]
    pub value: f64,
    /// Target application for `open`.
    #[serde(default)]
    pub application: String,
}

mod direction_field {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Direction>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(direction) => direction.serialize(s),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Direction>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(other) => serde_json::from_value(serde_json::Value::String(other.to_lowercase()))
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum CommandParseError {
    #[error("no JSON object in text")]
    NoPayload,
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("action is none")]
    NoAction,
}

/// Cheap pre-filter: trimmed text opens an object and mentions `"action"`.
pub fn looks_like_command(text: &str) -> bool {
    text.trim_start().starts_with('{') && text.contains("\"action\"")
}

/// Extract a command from model text.
///
/// Takes the span from the first `{` to the last `}` and decodes it. Returns
/// `None` when there is no such span, when it does not decode, or when the
/// action is `none`.
pub fn try_parse(text: &str) -> Option<Command> {
    match parse(text) {
        Ok(command) => Some(command),
        Err(CommandParseError::NoAction) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparseable command text");
            None
        }
    }
}

pub(crate) fn parse(text: &str) -> Result<Command, CommandParseError> {
    let start = text.find('{').ok_or(CommandParseError::NoPayload)?;
    let end = text.rfind('}').ok_or(CommandParseError::NoPayload)?;
    if end < start {
        return Err(CommandParseError::NoPayload);
    }
    let command: Command = serde_json::from_str(&text[start..=end])?;
    if command.action == Action::None {
        return Err(CommandParseError::NoAction);
    }
    Ok(command)
}
