//! Provider-neutral events exchanged with a live session.
//!
//! A single wire message from the service may carry several of these (for
//! example a model turn with audio followed by its transcription); transports
//! translate each message into an ordered list of [`ServerEvent`]s.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Events received from the live service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The service accepted the session setup.
    SetupComplete,

    /// The model invoked one or more locally declared functions.
    ToolCall {
        /// Calls in the order the model issued them.
        calls: Vec<FunctionCall>,
    },

    /// Previously issued tool calls were cancelled by the service.
    ToolCallCancellation {
        /// Ids of the cancelled calls.
        ids: Vec<String>,
    },

    /// Model text output.
    Text {
        /// Text fragment.
        text: String,
    },

    /// Inlined model audio, still base64-encoded.
    Audio {
        /// Mime type, e.g. `audio/pcm;rate=24000`.
        mime_type: String,
        /// Base64 PCM16 payload.
        data: String,
    },

    /// The user spoke over the model; in-flight audio must be discarded.
    Interrupted,

    /// Transcription fragment of the user's speech.
    InputTranscription {
        /// Transcript text.
        text: String,
    },

    /// Transcription fragment of the model's speech.
    OutputTranscription {
        /// Transcript text.
        text: String,
    },

    /// The model finished its turn.
    TurnComplete,

    /// The service will close the connection soon.
    GoAway {
        /// Remaining time as reported by the service, e.g. `"10s"`.
        #[serde(skip_serializing_if = "Option::is_none")]
        time_left: Option<String>,
    },

    /// Unknown message (for forward compatibility).
    #[serde(other)]
    Unknown,
}

/// A function call issued by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Unique call ID (used for responses).
    #[serde(default)]
    pub id: String,
    /// Function name.
    pub name: String,
    /// Arguments as JSON.
    #[serde(default)]
    pub args: Value,
}

impl FunctionCall {
    /// Create a new function call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self { id: id.into(), name: name.into(), args }
    }

    /// Read a boolean argument.
    pub fn bool_arg(&self, key: &str) -> Option<bool> {
        self.args.get(key).and_then(Value::as_bool)
    }
}

/// A tool response to send back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The call ID being responded to.
    pub call_id: String,
    /// The function name being responded to.
    pub name: String,
    /// The result/output of the tool execution.
    pub output: Value,
}

impl ToolResponse {
    /// Create a new tool response.
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, output: impl Serialize) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            output: serde_json::to_value(output).unwrap_or(Value::Null),
        }
    }

    /// Acknowledge a call as handled.
    pub fn success(call: &FunctionCall, message: impl Into<String>) -> Self {
        Self::new(&call.id, &call.name, json!({ "status": "success", "message": message.into() }))
    }

    /// Report a call as failed.
    pub fn error(call: &FunctionCall, message: impl Into<String>) -> Self {
        Self::new(&call.id, &call.name, json!({ "status": "error", "message": message.into() }))
    }
}
