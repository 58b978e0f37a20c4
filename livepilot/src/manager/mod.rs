//! Live session manager.
//!
//! Owns the session lifecycle (`Idle -> Connecting -> Connected -> Idle`),
//! wires microphone capture into the transport, routes inbound audio to the
//! playback scheduler and model text to the command interpreter, and restarts
//! the session when the mode changes.
//!
//! All lifecycle mutations are serialized by one async mutex. Long waits
//! (device prompts, transport setup, settle delay) happen outside it and are
//! validated afterwards against a connection epoch, so a disconnect issued
//! mid-connect always wins.

mod board;
mod inbound;
mod microphone;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use livepilot_realtime::{
    BoxedModel, BoxedSession, FrameBuffer, RealtimeConfig, RealtimeError, SharedSession,
    ToolDefinition,
};
use livepilot_telemetry::{live_session_span, record_mouse_mode, transport_connect_span};
use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::capture::{
    AudioContext, AudioOutput, Claim, MediaCapture, MediaDevices, MicrophoneStream, StreamHandle,
    VideoStream,
};
use crate::error::{LiveError, Result};
use crate::frames::{self, FrameEncoder, OutboundRoute, SamplerExit};
use crate::outbound::{self, OutboundQueue};
use crate::playback::PlaybackScheduler;
use crate::settings::{FacingMode, LiveSettings, SettingsHandle, VisualSource};
use crate::shortcuts::Shortcut;
use crate::status::{LiveEvent, LiveStatus, SessionStatus};

use board::CommandBoard;
use inbound::SessionReader;
use microphone::MicrophonePump;

/// Name of the tool the model calls to enter or leave mouse mode.
pub const MOUSE_CONTROL_TOOL: &str = "set_mouse_control";

const EVENT_CAPACITY: usize = 256;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Declaration of [`MOUSE_CONTROL_TOOL`].
pub fn mouse_control_tool() -> ToolDefinition {
    ToolDefinition::new(MOUSE_CONTROL_TOOL)
        .with_description(
            "Enable or disable mouse control mode. In mouse control mode you answer only with \
             JSON pointer commands.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "enabled": {
                    "type": "boolean",
                    "description": "true to take control of the mouse, false to hand it back"
                }
            },
            "required": ["enabled"]
        }))
}

/// Timing and geometry knobs.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Pause between closing and reopening on a mode switch.
    pub settle_delay: Duration,
    /// How long a parsed command stays on display.
    pub command_display: Duration,
    /// Still-frame sampling period.
    pub frame_interval: Duration,
    pub frame_width: u32,
    pub frame_height: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    /// Samples per microphone frame.
    pub capture_frame_size: usize,
    /// Mean absolute amplitude above which the user counts as talking.
    pub speech_threshold: f32,
    /// Outbound media frames buffered before the oldest is dropped.
    pub outbound_capacity: usize,
    /// Upper bound on transport setup.
    pub connect_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            command_display: Duration::from_secs(3),
            frame_interval: Duration::from_secs(1),
            frame_width: 640,
            frame_height: 480,
            jpeg_quality: 50,
            capture_frame_size: 4096,
            speech_threshold: 0.01,
            outbound_capacity: 64,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-call connect parameters.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Start the requested camera or screen share once connected.
    pub resume_visual: bool,
    /// Replace the configured instruction.
    pub instruction: Option<String>,
    /// Replace the configured mode (installs that mode's instruction).
    pub mouse_mode: Option<bool>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visual(mut self) -> Self {
        self.resume_visual = true;
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_mouse_mode(mut self, enabled: bool) -> Self {
        self.mouse_mode = Some(enabled);
        self
    }
}

/// Builder for [`LiveSessionManager`].
pub struct LiveSessionManagerBuilder {
    model: Option<BoxedModel>,
    devices: Option<Arc<dyn MediaDevices>>,
    settings: LiveSettings,
    options: ManagerOptions,
}

impl Default for LiveSessionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSessionManagerBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            devices: None,
            settings: LiveSettings::default(),
            options: ManagerOptions::default(),
        }
    }

    /// Set the transport model.
    pub fn model(mut self, model: BoxedModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the platform devices.
    pub fn devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Set the initial settings.
    pub fn settings(mut self, settings: LiveSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set timing and geometry options.
    pub fn options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<LiveSessionManager> {
        let model = self.model.ok_or_else(|| LiveError::config("Model is required"))?;
        let devices = self.devices.ok_or_else(|| LiveError::config("Media devices are required"))?;
        let options = self.options;
        if options.capture_frame_size == 0 {
            return Err(LiveError::config("Capture frame size must be non-zero"));
        }
        if options.outbound_capacity == 0 {
            return Err(LiveError::config("Outbound capacity must be non-zero"));
        }
        if !(1..=100).contains(&options.jpeg_quality) {
            return Err(LiveError::config("JPEG quality must be between 1 and 100"));
        }

        let (status, _) = watch::channel(LiveStatus {
            muted: self.settings.muted,
            mouse_mode: self.settings.mouse_mode,
            ..LiveStatus::default()
        });
        let status = Arc::new(status);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let board = CommandBoard::new(status.clone(), events.clone(), options.command_display);

        Ok(LiveSessionManager {
            inner: Arc::new(Inner {
                model,
                capture: MediaCapture::new(devices),
                encoder: FrameEncoder::new(
                    options.frame_width,
                    options.frame_height,
                    options.jpeg_quality,
                ),
                options,
                settings: SettingsHandle::new(self.settings),
                status,
                events,
                board,
                state: Mutex::new(ManagerState::default()),
                epoch: AtomicU64::new(0),
                route: Arc::new(RwLock::new(None)),
            }),
        })
    }
}

/// Drives one live session at a time.
///
/// Cheap to clone; clones share the same session.
///
/// # Example
///
/// ```rust,ignore
/// use livepilot::{ConnectOptions, LiveSessionManager, LiveSettings};
/// use livepilot_realtime::gemini::{GeminiLiveBackend, GeminiLiveModel};
///
/// let model = GeminiLiveModel::with_default_model(GeminiLiveBackend::from_env()?);
/// let manager = LiveSessionManager::builder()
///     .model(std::sync::Arc::new(model))
///     .devices(platform_devices)
///     .settings(LiveSettings::from_env())
///     .build()?;
///
/// manager.connect(ConnectOptions::new()).await?;
/// let mut events = manager.subscribe_events();
/// while let Ok(event) = events.recv().await {
///     println!("{:?}", event);
/// }
/// ```
#[derive(Clone)]
pub struct LiveSessionManager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    model: BoxedModel,
    capture: MediaCapture,
    options: ManagerOptions,
    encoder: FrameEncoder,
    settings: SettingsHandle,
    status: Arc<watch::Sender<LiveStatus>>,
    events: broadcast::Sender<LiveEvent>,
    board: CommandBoard,
    state: Mutex<ManagerState>,
    /// Bumped by every connect attempt and every teardown.
    epoch: AtomicU64,
    route: OutboundRoute,
}

#[derive(Default)]
struct ManagerState {
    /// Created on first connect and reused for the life of the manager.
    audio: Option<AudioGraph>,
    session: Option<ActiveSession>,
    visual: Option<ActiveVisual>,
}

#[derive(Clone)]
struct AudioGraph {
    input: Arc<dyn AudioContext>,
    output: Arc<dyn AudioOutput>,
    playback: PlaybackScheduler,
}

struct ActiveSession {
    epoch: u64,
    session: SharedSession,
    cancel: CancellationToken,
    queue: Arc<OutboundQueue>,
    microphone: StreamHandle,
}

struct ActiveVisual {
    source: VisualSource,
    sequence: u64,
    stream: VideoStream,
    cancel: CancellationToken,
}

impl LiveSessionManager {
    pub fn builder() -> LiveSessionManagerBuilder {
        LiveSessionManagerBuilder::new()
    }

    /// Current status snapshot.
    pub fn status(&self) -> LiveStatus {
        self.inner.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<LiveStatus> {
        self.inner.status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LiveEvent> {
        self.inner.events.subscribe()
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> LiveSettings {
        self.inner.settings.snapshot()
    }

    pub fn watch_settings(&self) -> watch::Receiver<LiveSettings> {
        self.inner.settings.subscribe()
    }

    /// Open a session.
    ///
    /// A no-op if the platform cannot capture audio or a session is already
    /// open or opening. On failure the manager is back in `Idle`.
    pub async fn connect(&self, options: ConnectOptions) -> Result<()> {
        let inner = &self.inner;
        if !inner.capture.devices().supports_audio_capture() {
            tracing::warn!("Audio capture is not supported on this platform");
            return Ok(());
        }

        let (epoch, graph, config) = {
            let mut state = inner.state.lock().await;
            if inner.status.borrow().status != SessionStatus::Idle {
                tracing::debug!("Connect ignored, session already active");
                return Ok(());
            }

            inner.settings.update(|s| {
                if let Some(enabled) = options.mouse_mode {
                    s.set_mouse_mode(enabled);
                }
                if let Some(instruction) = &options.instruction {
                    s.instruction = instruction.clone();
                }
            });
            let graph = inner.audio_graph(&mut state)?;
            let epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            let mouse_mode = inner.settings.read(|s| s.mouse_mode);
            inner.update_status(|s| {
                s.status = SessionStatus::Connecting;
                s.mouse_mode = mouse_mode;
            });
            (epoch, graph, inner.realtime_config())
        };

        let span = transport_connect_span(config.model.as_deref().unwrap_or_default());
        let opened = inner.open(&graph, config).instrument(span).await;

        let mut state = inner.state.lock().await;
        if inner.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(epoch, "Connect superseded, discarding");
            if let Ok((session, microphone)) = opened {
                microphone.handle().release();
                close_quietly(session.as_ref()).await;
            }
            return Ok(());
        }

        match opened {
            Ok((session, microphone)) => {
                inner.install(&mut state, epoch, &graph, session, microphone);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open live session");
                inner.teardown(&mut state, false).await;
                return Err(e);
            }
        }
        drop(state);

        if options.resume_visual {
            if let Some(source) = inner.settings.read(LiveSettings::visual_source) {
                if let Err(e) = self.start_visual(source).await {
                    tracing::warn!(error = %e, ?source, "Could not resume visual capture");
                }
            }
        }
        Ok(())
    }

    /// Tear everything down and return to `Idle`. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner.teardown(&mut state, false).await;
    }

    /// Enter or leave mouse mode.
    ///
    /// The service binds instruction and tools at setup, so an open or
    /// opening session is closed and, after the settle delay, reopened with
    /// the new mode. Visual capture that was requested is resumed.
    pub async fn switch_mode(&self, enabled: bool) -> Result<()> {
        let inner = &self.inner;
        let (resume_visual, epoch) = {
            let mut state = inner.state.lock().await;
            let changed = inner.settings.read(|s| s.mouse_mode != enabled);
            inner.settings.update(|s| s.set_mouse_mode(enabled));
            inner.update_status(|s| s.mouse_mode = enabled);
            if !changed {
                return Ok(());
            }
            let _ = inner.events.send(LiveEvent::ModeChanged { mouse_mode: enabled });

            if inner.status.borrow().status == SessionStatus::Idle {
                return Ok(());
            }
            tracing::info!(mouse_mode = enabled, "Restarting session for mode switch");
            let resume_visual = inner.settings.read(|s| s.visual_source().is_some());
            inner.teardown(&mut state, true).await;
            (resume_visual, inner.epoch.load(Ordering::SeqCst))
        };

        tokio::time::sleep(inner.options.settle_delay).await;
        if inner.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!("Mode switch reconnect superseded");
            return Ok(());
        }
        self.connect(ConnectOptions { resume_visual, ..ConnectOptions::default() }).await
    }

    /// Flip the local mute. Returns the new state.
    pub fn toggle_mute(&self) -> bool {
        let mut muted = false;
        self.inner.settings.update(|s| {
            s.muted = !s.muted;
            muted = s.muted;
        });
        self.inner.update_status(|s| {
            s.muted = muted;
            if muted {
                s.user_talking = false;
            }
        });
        muted
    }

    /// Start or stop the camera. Starting it stops any screen share.
    pub async fn set_camera(&self, enabled: bool) -> Result<()> {
        self.set_visual(VisualSource::Camera, enabled).await
    }

    /// Start or stop screen sharing. Starting it stops the camera.
    pub async fn set_screen(&self, enabled: bool) -> Result<()> {
        self.set_visual(VisualSource::Screen, enabled).await
    }

    /// Switch between front and rear camera, reopening it if it is on.
    ///
    /// If the other camera cannot be opened the current one stays attached
    /// and the facing is restored.
    pub async fn flip_camera(&self) -> Result<FacingMode> {
        let previous = self.inner.settings.read(|s| s.facing);
        let facing = previous.flipped();
        self.inner.settings.update(|s| s.facing = facing);
        if self.inner.settings.read(|s| s.camera_enabled) {
            if let Err(e) = self.start_visual(VisualSource::Camera).await {
                self.inner.settings.update(|s| s.facing = previous);
                return Err(e);
            }
        }
        Ok(facing)
    }

    /// Apply a keyboard shortcut.
    pub async fn handle_shortcut(&self, shortcut: Shortcut) -> Result<()> {
        let status = self.inner.status.borrow().status;
        match (shortcut, status) {
            (Shortcut::ToggleConnection, SessionStatus::Idle) => {
                self.connect(ConnectOptions::new()).await?;
            }
            (Shortcut::ToggleConnection, SessionStatus::Connected)
            | (Shortcut::Disconnect, SessionStatus::Connected) => self.disconnect().await,
            (Shortcut::ToggleMute, _) => {
                self.toggle_mute();
            }
            _ => {}
        }
        Ok(())
    }

    async fn set_visual(&self, source: VisualSource, enabled: bool) -> Result<()> {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock().await;
            if !enabled {
                inner.capture.invalidate();
                inner.settings.update(|s| {
                    if s.visual_source() == Some(source) {
                        s.request_visual(None);
                    }
                });
                if state.visual.as_ref().is_some_and(|v| v.source == source) {
                    inner.stop_visual(&mut state);
                }
                return Ok(());
            }

            if state.visual.as_ref().is_some_and(|v| v.source == source) {
                return Ok(());
            }
            inner.settings.update(|s| s.request_visual(Some(source)));
            if state.visual.is_some() {
                inner.stop_visual(&mut state);
            }
        }
        self.start_visual(source).await
    }

    /// Acquire `source` and, if still wanted when it arrives, start sampling it.
    async fn start_visual(&self, source: VisualSource) -> Result<()> {
        let inner = &self.inner;
        let acquisition = match source {
            VisualSource::Camera => {
                let facing = inner.settings.read(|s| s.facing);
                inner.capture.acquire_camera(facing).await
            }
            VisualSource::Screen => inner.capture.acquire_screen().await,
        };
        let sequence = acquisition.sequence();

        let mut state = inner.state.lock().await;
        match inner.capture.claim(acquisition) {
            Claim::Stale => Ok(()),
            Claim::Failed(e) if state.visual.as_ref().is_some_and(|v| v.source == source) => {
                tracing::warn!(error = %e, ?source, "Could not replace visual source, keeping current");
                Err(e.into())
            }
            Claim::Failed(e) => {
                tracing::warn!(error = %e, ?source, "Visual capture failed");
                inner.settings.update(|s| {
                    if s.visual_source() == Some(source) {
                        s.request_visual(None);
                    }
                });
                let _ = inner.events.send(LiveEvent::VisualStopped { source, reason: e.to_string() });
                Err(e.into())
            }
            Claim::Current(stream) => {
                if state.visual.is_some() {
                    inner.stop_visual(&mut state);
                }
                let cancel = CancellationToken::new();
                let sampler = frames::run_sampler(
                    stream.source(),
                    inner.encoder,
                    inner.options.frame_interval,
                    inner.route.clone(),
                    cancel.clone(),
                );
                let manager = Arc::downgrade(&self.inner);
                tokio::spawn(async move {
                    if sampler.await == SamplerExit::SourceEnded {
                        if let Some(inner) = manager.upgrade() {
                            inner.on_visual_ended(sequence).await;
                        }
                    }
                });

                state.visual = Some(ActiveVisual { source, sequence, stream, cancel });
                inner.update_status(|s| {
                    s.camera_active = source == VisualSource::Camera;
                    s.screen_active = source == VisualSource::Screen;
                });
                tracing::info!(?source, sequence, "Visual capture started");
                Ok(())
            }
        }
    }
}

impl Inner {
    fn realtime_config(&self) -> RealtimeConfig {
        let settings = self.settings.snapshot();
        RealtimeConfig::new()
            .with_model(settings.model)
            .with_voice(settings.voice)
            .with_instruction(settings.instruction)
            .with_audio_only()
            .with_tool(mouse_control_tool())
            .with_transcription()
    }

    /// The process-lifetime audio contexts and scheduler, created on first use.
    fn audio_graph(&self, state: &mut ManagerState) -> Result<AudioGraph> {
        if let Some(graph) = &state.audio {
            return Ok(graph.clone());
        }
        let devices = self.capture.devices();
        let input = devices.create_input_context(self.model.input_format().sample_rate)?;
        let output = devices.create_output_context(self.model.output_format().sample_rate)?;

        let status = self.status.clone();
        let playback = PlaybackScheduler::new(output.clone()).with_listener(move |playing| {
            status.send_if_modified(|s| {
                let changed = s.model_talking != playing;
                s.model_talking = playing;
                changed
            });
        });

        let graph = AudioGraph { input, output, playback };
        state.audio = Some(graph.clone());
        Ok(graph)
    }

    /// Resume contexts, open the microphone, then the transport.
    async fn open(
        &self,
        graph: &AudioGraph,
        config: RealtimeConfig,
    ) -> Result<(BoxedSession, MicrophoneStream)> {
        graph.input.resume().await?;
        graph.output.resume().await?;

        let microphone = self.capture.acquire_microphone(graph.input.clone()).await?;
        record_mouse_mode(self.settings.read(|s| s.mouse_mode));

        let connected =
            tokio::time::timeout(self.options.connect_timeout, self.model.connect(config)).await;
        let session = match connected {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                microphone.handle().release();
                return Err(e.into());
            }
            Err(_) => {
                microphone.handle().release();
                return Err(RealtimeError::Timeout("session setup".to_string()).into());
            }
        };
        Ok((session, microphone))
    }

    /// Start the session's tasks and publish `Connected`.
    fn install(
        self: &Arc<Self>,
        state: &mut ManagerState,
        epoch: u64,
        graph: &AudioGraph,
        session: BoxedSession,
        microphone: MicrophoneStream,
    ) {
        let session: SharedSession = Arc::from(session);
        let session_id = session.session_id().to_string();
        let cancel = CancellationToken::new();
        let queue = Arc::new(OutboundQueue::new(self.options.outbound_capacity));
        let microphone_handle = microphone.handle();

        tokio::spawn(outbound::run_writer(queue.clone(), session.clone(), cancel.clone()));

        tokio::spawn(
            MicrophonePump {
                stream: microphone,
                queue: queue.clone(),
                settings: self.settings.subscribe(),
                status: self.status.clone(),
                framer: FrameBuffer::new(self.options.capture_frame_size),
                threshold: self.options.speech_threshold,
                cancel: cancel.clone(),
                manager: Arc::downgrade(self),
                epoch,
            }
            .run(),
        );

        let model = self.settings.read(|s| s.model.clone());
        tokio::spawn(
            SessionReader {
                manager: Arc::downgrade(self),
                epoch,
                session: session.clone(),
                playback: graph.playback.clone(),
                settings: self.settings.subscribe(),
                events: self.events.clone(),
                board: self.board.clone(),
                cancel: cancel.clone(),
                output_format: self.model.output_format(),
                transcript: String::new(),
                surfaced: None,
            }
            .run()
            .instrument(live_session_span(&session_id, &model)),
        );

        *self.route.write() = Some(queue.clone());
        state.session =
            Some(ActiveSession { epoch, session, cancel, queue, microphone: microphone_handle });

        let mouse_mode = self.settings.read(|s| s.mouse_mode);
        self.update_status(|s| s.status = SessionStatus::Connected);
        tracing::info!(session_id = %session_id, mouse_mode, "Live session open");
        let _ = self.events.send(LiveEvent::SessionOpened { session_id, mouse_mode });
    }

    /// Release everything and return to `Idle`. Every step is idempotent.
    ///
    /// `keep_visual_request` preserves the requested camera/screen so a
    /// mode-switch reconnect can resume it.
    async fn teardown(&self, state: &mut ManagerState, keep_visual_request: bool) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.capture.invalidate();
        *self.route.write() = None;

        if let Some(active) = state.session.take() {
            active.cancel.cancel();
            active.queue.close();
            active.microphone.release();
            close_quietly(active.session.as_ref()).await;
            let session_id = active.session.session_id().to_string();
            tracing::info!(session_id = %session_id, "Live session closed");
            let _ = self.events.send(LiveEvent::SessionClosed { session_id });
        }

        if state.visual.is_some() {
            self.stop_visual(state);
        }
        if let Some(graph) = &state.audio {
            graph.playback.reset();
        }
        if !keep_visual_request {
            self.settings.update(|s| s.request_visual(None));
        }
        self.board.clear();
        self.update_status(|s| {
            s.status = SessionStatus::Idle;
            s.user_talking = false;
            s.model_talking = false;
            s.camera_active = false;
            s.screen_active = false;
        });
    }

    fn stop_visual(&self, state: &mut ManagerState) {
        if let Some(visual) = state.visual.take() {
            visual.cancel.cancel();
            visual.stream.release();
            tracing::debug!(source = ?visual.source, sequence = visual.sequence, "Visual capture stopped");
        }
        self.update_status(|s| {
            s.camera_active = false;
            s.screen_active = false;
        });
    }

    /// The transport closed or failed under the session opened at `epoch`.
    async fn on_transport_closed(&self, epoch: u64) {
        let mut state = self.state.lock().await;
        if state.session.as_ref().is_some_and(|s| s.epoch == epoch) {
            self.teardown(&mut state, false).await;
        }
    }

    /// The microphone of the session opened at `epoch` ended out-of-band.
    ///
    /// A voice session without capture is useless, so it is closed.
    async fn on_microphone_ended(&self, epoch: u64) {
        let mut state = self.state.lock().await;
        if state.session.as_ref().is_some_and(|s| s.epoch == epoch) {
            tracing::warn!(epoch, "Microphone ended, closing session");
            self.teardown(&mut state, false).await;
        }
    }

    /// A video source ended out-of-band.
    async fn on_visual_ended(&self, sequence: u64) {
        let mut state = self.state.lock().await;
        let Some(source) = state.visual.as_ref().filter(|v| v.sequence == sequence).map(|v| v.source)
        else {
            return;
        };
        tracing::info!(?source, "Visual source ended");
        self.stop_visual(&mut state);
        self.settings.update(|s| {
            if s.visual_source() == Some(source) {
                s.request_visual(None);
            }
        });
        let _ = self.events.send(LiveEvent::VisualStopped { source, reason: "ended".to_string() });
    }

    fn update_status(&self, f: impl FnOnce(&mut LiveStatus)) {
        self.status.send_if_modified(|status| {
            let before = status.clone();
            f(status);
            *status != before
        });
    }
}

async fn close_quietly(session: &dyn livepilot_realtime::RealtimeSession) {
    match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "Ignoring error while closing session"),
        Err(_) => tracing::debug!("Timed out closing session"),
    }
}
