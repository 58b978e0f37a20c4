//! The open-session seam.

use crate::audio::{AudioChunk, MediaBlob};
use crate::error::Result;
use crate::events::{ServerEvent, ToolResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// An open, bidirectional live session.
///
/// Sending and receiving are independent: one task may block in
/// [`next_event`](RealtimeSession::next_event) while others send media.
///
/// # Example
///
/// ```rust,ignore
/// use livepilot_realtime::{RealtimeSession, ServerEvent, ToolResponse};
///
/// async fn pump(session: &dyn RealtimeSession) -> livepilot_realtime::Result<()> {
///     while let Some(event) = session.next_event().await {
///         match event? {
///             ServerEvent::Audio { data, .. } => { /* decode and play */ }
///             ServerEvent::ToolCall { calls } => {
///                 for call in &calls {
///                     session.send_tool_response(ToolResponse::success(call, "ok")).await?;
///                 }
///             }
///             _ => {}
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait RealtimeSession: Send + Sync {
    /// Identifier for logs and events.
    fn session_id(&self) -> &str;

    /// False once either side has closed.
    fn is_connected(&self) -> bool;

    /// Send a realtime media chunk (audio frame or still image).
    async fn send_media(&self, media: &MediaBlob) -> Result<()>;

    /// Send a PCM16 chunk as realtime media.
    async fn send_audio(&self, audio: &AudioChunk) -> Result<()> {
        self.send_media(&audio.to_blob()).await
    }

    /// Send a complete user text turn.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Acknowledge a function call.
    async fn send_tool_response(&self, response: ToolResponse) -> Result<()>;

    /// Wait for the next service message.
    ///
    /// Returns `None` once the session is closed.
    async fn next_event(&self) -> Option<Result<ServerEvent>>;

    /// Close the socket. Calling it again is harmless.
    async fn close(&self) -> Result<()>;
}

/// Session as returned by [`RealtimeModel::connect`](crate::RealtimeModel::connect).
pub type BoxedSession = Box<dyn RealtimeSession>;

/// A session shared between the reader, writer and control paths.
pub type SharedSession = Arc<dyn RealtimeSession>;
