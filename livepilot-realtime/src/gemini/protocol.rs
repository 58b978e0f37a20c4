//! Gemini Live wire format.

use crate::audio::MediaBlob;
use crate::config::{Modality, RealtimeConfig, ToolDefinition};
use crate::events::{FunctionCall, ServerEvent, ToolResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ── Client messages ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<Setup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_input: Option<RealtimeInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<ToolResponseMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_content: Option<ClientContent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RealtimeInput {
    pub media_chunks: Vec<MediaBlob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolResponseMessage {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

impl ClientMessage {
    pub fn setup(model: &str, config: RealtimeConfig) -> Self {
        let speech_config = config.voice.as_ref().map(|voice| {
            json!({
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice }
                }
            })
        });

        let generation_config = GenerationConfig {
            response_modalities: config.response_modalities(),
            speech_config,
        };

        let system_instruction = config.instruction.map(|text| Content {
            role: None,
            parts: vec![Part { text: Some(text), ..Default::default() }],
        });

        Self {
            setup: Some(Setup {
                model: model.to_string(),
                generation_config,
                system_instruction,
                tools: convert_tools(config.tools),
                input_audio_transcription: config.input_transcription.then(|| json!({})),
                output_audio_transcription: config.output_transcription.then(|| json!({})),
            }),
            ..Default::default()
        }
    }

    pub fn media(media: &MediaBlob) -> Self {
        Self {
            realtime_input: Some(RealtimeInput { media_chunks: vec![media.clone()] }),
            ..Default::default()
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            client_content: Some(ClientContent {
                turns: vec![Content {
                    role: Some("user".to_string()),
                    parts: vec![Part { text: Some(text.to_string()), ..Default::default() }],
                }],
                turn_complete: true,
            }),
            ..Default::default()
        }
    }

    pub fn tool_response(response: ToolResponse) -> Self {
        let output = match response.output {
            Value::String(s) => json!({ "result": s }),
            other => other,
        };
        Self {
            tool_response: Some(ToolResponseMessage {
                function_responses: vec![FunctionResponse {
                    id: response.call_id,
                    name: response.name,
                    response: output,
                }],
            }),
            ..Default::default()
        }
    }
}

pub(crate) fn convert_tools(tools: Option<Vec<ToolDefinition>>) -> Option<Vec<Value>> {
    tools.filter(|t| !t.is_empty()).map(|t_vec| {
        let function_declarations: Vec<Value> = t_vec
            .into_iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description.unwrap_or_default(),
                    "parameters": t.parameters.unwrap_or_else(|| json!({ "type": "object", "properties": {} }))
                })
            })
            .collect();

        vec![json!({ "functionDeclarations": function_declarations })]
    })
}

// ── Server messages ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCallMessage>,
    #[serde(default)]
    pub tool_call_cancellation: Option<ToolCallCancellationMessage>,
    #[serde(default)]
    pub go_away: Option<GoAwayMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolCallMessage {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ToolCallCancellationMessage {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoAwayMessage {
    #[serde(default)]
    pub time_left: Option<String>,
}

impl ServerMessage {
    /// Flatten into unified events, preserving the order a client should act on them.
    pub fn into_events(self) -> Vec<ServerEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(ServerEvent::SetupComplete);
        }

        if let Some(tool_call) = self.tool_call {
            if !tool_call.function_calls.is_empty() {
                events.push(ServerEvent::ToolCall { calls: tool_call.function_calls });
            }
        }

        if let Some(cancellation) = self.tool_call_cancellation {
            events.push(ServerEvent::ToolCallCancellation { ids: cancellation.ids });
        }

        if let Some(content) = self.server_content {
            if let Some(t) = content.input_transcription.filter(|t| !t.text.is_empty()) {
                events.push(ServerEvent::InputTranscription { text: t.text });
            }

            for part in content.model_turn.map(|turn| turn.parts).unwrap_or_default() {
                // Thinking output is never user-facing content.
                if part.thought.unwrap_or(false) {
                    continue;
                }
                if let Some(inline) = part.inline_data {
                    events.push(ServerEvent::Audio { mime_type: inline.mime_type, data: inline.data });
                }
                if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                    events.push(ServerEvent::Text { text });
                }
            }

            if let Some(t) = content.output_transcription.filter(|t| !t.text.is_empty()) {
                events.push(ServerEvent::OutputTranscription { text: t.text });
            }
            if content.interrupted {
                events.push(ServerEvent::Interrupted);
            }
            if content.turn_complete {
                events.push(ServerEvent::TurnComplete);
            }
        }

        if let Some(go_away) = self.go_away {
            events.push(ServerEvent::GoAway { time_left: go_away.time_left });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_of(raw: &str) -> Vec<ServerEvent> {
        serde_json::from_str::<ServerMessage>(raw).unwrap().into_events()
    }

    #[test]
    fn test_convert_tools() {
        let tools = vec![
            ToolDefinition::new("set_mouse_control")
                .with_description("Toggle mouse mode")
                .with_parameters(json!({
                    "type": "OBJECT",
                    "properties": { "enabled": { "type": "BOOLEAN" } }
                })),
            ToolDefinition::new("no_params"),
        ];

        let result = convert_tools(Some(tools)).unwrap();
        let decls = result[0]["functionDeclarations"].as_array().unwrap();

        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0]["name"], "set_mouse_control");
        assert_eq!(decls[0]["description"], "Toggle mouse mode");
        assert_eq!(decls[1]["description"], "");
        assert_eq!(decls[1]["parameters"]["type"], "object");
    }

    #[test]
    fn test_convert_tools_empty() {
        assert!(convert_tools(None).is_none());
        assert!(convert_tools(Some(vec![])).is_none());
    }

    #[test]
    fn test_setup_message_shape() {
        let config = RealtimeConfig::new()
            .with_instruction("Be terse.")
            .with_voice("Puck")
            .with_tool(ToolDefinition::new("set_mouse_control"))
            .with_transcription();

        let value = serde_json::to_value(ClientMessage::setup("models/live", config)).unwrap();
        let setup = &value["setup"];

        assert_eq!(setup["model"], "models/live");
        assert_eq!(setup["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Puck"
        );
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "Be terse.");
        assert_eq!(setup["tools"][0]["functionDeclarations"][0]["name"], "set_mouse_control");
        assert_eq!(setup["inputAudioTranscription"], json!({}));
        assert_eq!(setup["outputAudioTranscription"], json!({}));
        assert!(value.get("realtimeInput").is_none());
    }

    #[test]
    fn test_setup_without_transcription_omits_fields() {
        let value = serde_json::to_value(ClientMessage::setup("m", RealtimeConfig::new())).unwrap();
        assert!(value["setup"].get("inputAudioTranscription").is_none());
        assert!(value["setup"].get("systemInstruction").is_none());
    }

    #[test]
    fn test_media_and_tool_response_shapes() {
        let blob = MediaBlob::jpeg(b"jpg");
        let value = serde_json::to_value(ClientMessage::media(&blob)).unwrap();
        assert_eq!(value["realtimeInput"]["mediaChunks"][0]["mimeType"], "image/jpeg");

        let call = FunctionCall::new("c1", "set_mouse_control", json!({ "enabled": true }));
        let value =
            serde_json::to_value(ClientMessage::tool_response(ToolResponse::success(&call, "ok")))
                .unwrap();
        let response = &value["toolResponse"]["functionResponses"][0];
        assert_eq!(response["id"], "c1");
        assert_eq!(response["name"], "set_mouse_control");
        assert_eq!(response["response"]["status"], "success");
    }

    #[test]
    fn test_string_tool_output_is_wrapped() {
        let response = ToolResponse::new("c", "f", "done");
        let value = serde_json::to_value(ClientMessage::tool_response(response)).unwrap();
        assert_eq!(value["toolResponse"]["functionResponses"][0]["response"]["result"], "done");
    }

    #[test]
    fn test_model_turn_parts_in_order() {
        let events = events_of(
            r#"{"serverContent":{"modelTurn":{"parts":[
                {"inlineData":{"mimeType":"audio/pcm;rate=24000","data":"AAA="}},
                {"text":"{\"action\":\"none\"}"},
                {"text":"pondering","thought":true}
            ]},"outputTranscription":{"text":"hello"},"turnComplete":true}}"#,
        );

        assert_eq!(
            events,
            vec![
                ServerEvent::Audio { mime_type: "audio/pcm;rate=24000".into(), data: "AAA=".into() },
                ServerEvent::Text { text: r#"{"action":"none"}"#.into() },
                ServerEvent::OutputTranscription { text: "hello".into() },
                ServerEvent::TurnComplete,
            ]
        );
    }

    #[test]
    fn test_tool_call_and_interrupt() {
        let events = events_of(
            r#"{"toolCall":{"functionCalls":[{"id":"x","name":"set_mouse_control","args":{"enabled":true}}]}}"#,
        );
        assert_eq!(
            events,
            vec![ServerEvent::ToolCall {
                calls: vec![FunctionCall::new("x", "set_mouse_control", json!({ "enabled": true }))]
            }]
        );

        let events = events_of(r#"{"serverContent":{"interrupted":true}}"#);
        assert_eq!(events, vec![ServerEvent::Interrupted]);
    }

    #[test]
    fn test_setup_complete_and_go_away() {
        assert_eq!(events_of(r#"{"setupComplete":{}}"#), vec![ServerEvent::SetupComplete]);
        assert_eq!(
            events_of(r#"{"goAway":{"timeLeft":"5s"}}"#),
            vec![ServerEvent::GoAway { time_left: Some("5s".into()) }]
        );
    }

    #[test]
    fn test_unrecognised_message_yields_nothing() {
        assert!(events_of(r#"{"usageMetadata":{"totalTokenCount":3}}"#).is_empty());
    }
}
