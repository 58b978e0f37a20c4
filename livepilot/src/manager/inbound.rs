//! Inbound event handling for an open session.

use std::sync::Weak;

use livepilot_realtime::audio::{self, AudioFormat};
use livepilot_realtime::{FunctionCall, ServerEvent, SharedSession, ToolResponse};
use livepilot_telemetry::tool_call_span;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::board::CommandBoard;
use super::{Inner, LiveSessionManager, MOUSE_CONTROL_TOOL};
use crate::command::{Command, looks_like_command, try_parse};
use crate::playback::PlaybackScheduler;
use crate::settings::LiveSettings;
use crate::status::{LiveEvent, TranscriptRole};

/// Reads one session's events in receipt order until it closes or is cancelled.
pub(super) struct SessionReader {
    pub manager: Weak<Inner>,
    pub epoch: u64,
    pub session: SharedSession,
    pub playback: PlaybackScheduler,
    pub settings: watch::Receiver<LiveSettings>,
    pub events: broadcast::Sender<LiveEvent>,
    pub board: CommandBoard,
    pub cancel: CancellationToken,
    /// Decode format for audio whose mime type carries no rate.
    pub output_format: AudioFormat,
    /// Model speech transcript for the current turn, parsed in mouse mode.
    pub transcript: String,
    /// Command already published this turn. Text parts and the output
    /// transcription often carry the same payload.
    pub surfaced: Option<Command>,
}

impl SessionReader {
    pub async fn run(mut self) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                next = self.session.next_event() => next,
            };
            match next {
                Some(Ok(event)) => self.handle(event).await,
                Some(Err(e)) if e.is_fatal() => {
                    tracing::warn!(error = %e, "Session transport failed");
                    break;
                }
                Some(Err(e)) => tracing::debug!(error = %e, "Ignoring malformed server message"),
                None => {
                    tracing::info!("Session closed by service");
                    break;
                }
            }
        }

        if let Some(inner) = self.manager.upgrade() {
            inner.on_transport_closed(self.epoch).await;
        }
    }

    async fn handle(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::SetupComplete => tracing::debug!("Setup acknowledged"),
            ServerEvent::ToolCall { calls } => self.handle_tool_calls(calls).await,
            ServerEvent::ToolCallCancellation { ids } => {
                tracing::info!(?ids, "Service cancelled tool calls");
            }
            ServerEvent::Text { text } => {
                if self.mouse_mode() && looks_like_command(&text) {
                    if let Some(command) = try_parse(&text) {
                        self.surface(command);
                    }
                }
                let _ = self.events.send(LiveEvent::ModelText { text });
            }
            ServerEvent::Audio { mime_type, data } => self.play(&mime_type, &data),
            ServerEvent::Interrupted => {
                tracing::debug!(flushed = self.playback.active_count(), "Model interrupted");
                self.playback.reset();
                self.end_turn();
            }
            ServerEvent::InputTranscription { text } => {
                let _ = self.events.send(LiveEvent::Transcript { role: TranscriptRole::User, text });
            }
            ServerEvent::OutputTranscription { text } => {
                if self.mouse_mode() {
                    self.transcript.push_str(&text);
                    if looks_like_command(&self.transcript) {
                        if let Some(command) = try_parse(&self.transcript) {
                            self.surface(command);
                            self.transcript.clear();
                        }
                    }
                }
                let _ = self.events.send(LiveEvent::Transcript { role: TranscriptRole::Model, text });
            }
            ServerEvent::TurnComplete => self.end_turn(),
            ServerEvent::GoAway { time_left } => {
                tracing::info!(time_left = ?time_left, "Service will close the session soon");
            }
            ServerEvent::Unknown => tracing::trace!("Ignoring unknown server event"),
        }
    }

    /// Acknowledge every call, then apply any mode change.
    ///
    /// Acknowledgements are sent directly rather than through the media queue
    /// and awaited, so they are on the wire before the restart closes the
    /// session. The restart runs in its own task because it cancels this one.
    async fn handle_tool_calls(&mut self, calls: Vec<FunctionCall>) {
        let mut requested_mode = None;

        for call in &calls {
            let span = tool_call_span(&call.name, &call.id);
            let response = if call.name == MOUSE_CONTROL_TOOL {
                match call.bool_arg("enabled") {
                    Some(enabled) => {
                        requested_mode = Some(enabled);
                        let message =
                            if enabled { "Mouse control enabled" } else { "Mouse control disabled" };
                        ToolResponse::success(call, message)
                    }
                    None => ToolResponse::error(call, "Missing boolean argument 'enabled'"),
                }
            } else {
                span.in_scope(|| tracing::warn!("Model called an unknown tool"));
                ToolResponse::error(call, format!("Unknown tool: {}", call.name))
            };

            if let Err(e) = self.session.send_tool_response(response).instrument(span).await {
                tracing::warn!(error = %e, call_id = %call.id, "Failed to acknowledge tool call");
            }
        }

        let Some(enabled) = requested_mode else {
            return;
        };
        let Some(inner) = self.manager.upgrade() else {
            return;
        };
        let manager = LiveSessionManager { inner };
        tokio::spawn(async move {
            if let Err(e) = manager.switch_mode(enabled).await {
                tracing::warn!(error = %e, mouse_mode = enabled, "Mode switch failed");
            }
        });
    }

    fn play(&self, mime_type: &str, data: &str) {
        let format = AudioFormat::from_mime_type(mime_type).unwrap_or(self.output_format);
        let buffer = audio::decode(data)
            .and_then(|bytes| audio::decode_audio_data(&bytes, format.sample_rate, format.channels));
        let buffer = match buffer {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::debug!(error = %e, mime_type, "Dropping undecodable audio chunk");
                return;
            }
        };
        if self.cancel.is_cancelled() {
            return;
        }
        self.playback.enqueue(buffer);
    }

    fn surface(&mut self, command: Command) {
        if self.surfaced.as_ref() == Some(&command) {
            tracing::trace!(action = ?command.action, "Command already published this turn");
            return;
        }
        self.surfaced = Some(command.clone());
        self.board.publish(command);
    }

    fn end_turn(&mut self) {
        self.transcript.clear();
        self.surfaced = None;
    }

    fn mouse_mode(&self) -> bool {
        self.settings.borrow().mouse_mode
    }
}
