use super::protocol::{ClientMessage, ServerMessage};
use crate::audio::MediaBlob;
use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::events::{ServerEvent, ToolResponse};
use crate::session::RealtimeSession;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::connect_async;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;

/// Receive half: the socket plus events already translated but not yet handed out.
struct Inbound {
    source: WsSource,
    pending: VecDeque<ServerEvent>,
}

/// Gemini Live session.
///
/// Manages a WebSocket connection to Google's Gemini Live API. Sending and
/// receiving lock separate halves of the socket so a blocked reader never
/// delays outbound media.
pub struct GeminiLiveSession {
    session_id: String,
    connected: Arc<AtomicBool>,
    sender: Arc<Mutex<WsSink>>,
    receiver: Arc<Mutex<Inbound>>,
}

impl GeminiLiveSession {
    /// Connect to a Gemini Live endpoint and complete the setup handshake.
    pub async fn connect(
        url: &str,
        model: &str,
        config: RealtimeConfig,
        setup_timeout: Duration,
    ) -> Result<Self> {
        super::ensure_crypto_provider();

        let request = url.into_client_request().map_err(|e| {
            RealtimeError::connection(format!("Failed to create client request: {}", e))
        })?;
        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| RealtimeError::connection(format!("WebSocket connect error: {}", e)))?;

        let (sink, source) = stream.split();

        let session = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            connected: Arc::new(AtomicBool::new(true)),
            sender: Arc::new(Mutex::new(sink)),
            receiver: Arc::new(Mutex::new(Inbound { source, pending: VecDeque::new() })),
        };

        session.send_setup(model, config).await?;

        match tokio::time::timeout(setup_timeout, session.await_setup_complete()).await {
            Ok(Ok(())) => {
                tracing::info!(session_id = %session.session_id, model_id = %model, "Live session ready");
                Ok(session)
            }
            Ok(Err(e)) => {
                session.connected.store(false, Ordering::SeqCst);
                Err(RealtimeError::connection(format!("Setup rejected: {}", e)))
            }
            Err(_) => {
                session.connected.store(false, Ordering::SeqCst);
                Err(RealtimeError::Timeout(format!(
                    "No setupComplete within {} ms",
                    setup_timeout.as_millis()
                )))
            }
        }
    }

    /// Send initial setup message.
    async fn send_setup(&self, model: &str, config: RealtimeConfig) -> Result<()> {
        let setup = ClientMessage::setup(model, config);
        tracing::info!(model_id = %model, "Sending setup message");
        self.send_raw(&setup).await
    }

    /// Consume events until the service acknowledges the setup.
    ///
    /// Anything that arrives before the acknowledgement stays queued for the caller.
    async fn await_setup_complete(&self) -> Result<()> {
        let mut inbound = self.receiver.lock().await;
        loop {
            if let Some(pos) =
                inbound.pending.iter().position(|e| matches!(e, ServerEvent::SetupComplete))
            {
                inbound.pending.remove(pos);
                return Ok(());
            }
            match self.read_message(&mut inbound).await {
                Some(Ok(())) => continue,
                Some(Err(e)) => return Err(e),
                None => return Err(RealtimeError::SessionClosed),
            }
        }
    }

    /// Send a raw message.
    async fn send_raw<T: Serialize>(&self, value: &T) -> Result<()> {
        if !self.is_connected() {
            return Err(RealtimeError::SessionClosed);
        }

        let msg = serde_json::to_string(value)
            .map_err(|e| RealtimeError::protocol(format!("JSON serialize error: {}", e)))?;

        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Text(msg.into()))
            .await
            .map_err(|e| RealtimeError::transport(format!("Send error: {}", e)))?;

        Ok(())
    }

    /// Read one socket message into the pending queue.
    ///
    /// `None` means the socket is closed.
    async fn read_message(&self, inbound: &mut Inbound) -> Option<Result<()>> {
        let text = match inbound.source.next().await {
            Some(Ok(Message::Text(text))) => text.to_string(),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    return Some(Err(RealtimeError::protocol(format!(
                        "Invalid UTF-8 in binary message: {}",
                        e
                    ))));
                }
            },
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(session_id = %self.session_id, ?frame, "Server closed live session");
                self.connected.store(false, Ordering::SeqCst);
                return None;
            }
            Some(Ok(_)) => return Some(Ok(())),
            Some(Err(e)) => {
                self.connected.store(false, Ordering::SeqCst);
                return Some(Err(RealtimeError::transport(format!("Receive error: {}", e))));
            }
            None => {
                self.connected.store(false, Ordering::SeqCst);
                return None;
            }
        };

        match serde_json::from_str::<ServerMessage>(&text) {
            Ok(message) => {
                inbound.pending.extend(message.into_events());
                Some(Ok(()))
            }
            Err(e) => Some(Err(RealtimeError::protocol(format!("Parse error: {}", e)))),
        }
    }
}

#[async_trait]
impl RealtimeSession for GeminiLiveSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_media(&self, media: &MediaBlob) -> Result<()> {
        self.send_raw(&ClientMessage::media(media)).await
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.send_raw(&ClientMessage::text(text)).await
    }

    async fn send_tool_response(&self, response: ToolResponse) -> Result<()> {
        self.send_raw(&ClientMessage::tool_response(response)).await
    }

    async fn next_event(&self) -> Option<Result<ServerEvent>> {
        let mut inbound = self.receiver.lock().await;
        loop {
            if let Some(event) = inbound.pending.pop_front() {
                return Some(Ok(event));
            }
            match self.read_message(&mut inbound).await? {
                Ok(()) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Close(None))
            .await
            .map_err(|e| RealtimeError::transport(format!("Close error: {}", e)))?;

        Ok(())
    }
}

impl std::fmt::Debug for GeminiLiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveSession")
            .field("session_id", &self.session_id)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}
