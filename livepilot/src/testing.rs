//! In-memory devices and transport.
//!
//! These doubles let tests (and hosts without real devices) drive the manager
//! deterministically: the output clock only moves when told to, microphone
//! samples are pushed by hand, and the mock transport records every outbound
//! message and plays back whatever server events are fed to it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use livepilot_realtime::{
    AudioFormat, BoxedSession, MediaBlob, PcmBuffer, RealtimeConfig, RealtimeError,
    RealtimeModel, RealtimeSession, ServerEvent, ToolResponse,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::capture::{
    AudioContext, AudioOutput, EndedCallback, MediaDevices, MediaTrack, MicrophoneStream,
    ScheduledSource, VideoSource, VideoStream,
};
use crate::error::CaptureError;
use crate::settings::FacingMode;

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// Capture-side context that counts resumes.
#[derive(Debug)]
pub struct MockAudioContext {
    sample_rate: u32,
    resumes: AtomicUsize,
}

impl MockAudioContext {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, resumes: AtomicUsize::new(0) }
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioContext for MockAudioContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A buffer as seen by [`MockAudioOutput`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEntry {
    pub start_at: f64,
    pub duration: f64,
    pub stopped: bool,
    pub finished: bool,
}

struct OutputEntry {
    start_at: f64,
    duration: f64,
    stopped: Arc<AtomicBool>,
    on_ended: Option<EndedCallback>,
}

struct OutputState {
    now: f64,
    entries: Vec<OutputEntry>,
}

/// Output device with a hand-driven clock.
///
/// Buffers "finish" when [`advance`](Self::advance) moves the clock past
/// their end, at which point their completion callback runs.
pub struct MockAudioOutput {
    sample_rate: u32,
    resumes: AtomicUsize,
    state: Mutex<OutputState>,
}

impl Default for MockAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAudioOutput {
    pub fn new() -> Self {
        Self {
            sample_rate: livepilot_realtime::audio::OUTPUT_SAMPLE_RATE,
            resumes: AtomicUsize::new(0),
            state: Mutex::new(OutputState { now: 0.0, entries: Vec::new() }),
        }
    }

    /// Move the clock forward and complete every buffer that ends by then.
    pub fn advance(&self, seconds: f64) {
        let callbacks: Vec<EndedCallback> = {
            let mut state = self.state.lock();
            state.now += seconds;
            let now = state.now;
            state
                .entries
                .iter_mut()
                .filter(|e| !e.stopped.load(Ordering::SeqCst) && e.start_at + e.duration <= now)
                .filter_map(|e| e.on_ended.take())
                .collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    pub fn now(&self) -> f64 {
        self.state.lock().now
    }

    /// Every buffer ever scheduled, in scheduling order.
    pub fn scheduled(&self) -> Vec<ScheduledEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|e| ScheduledEntry {
                start_at: e.start_at,
                duration: e.duration,
                stopped: e.stopped.load(Ordering::SeqCst),
                finished: e.on_ended.is_none() && !e.stopped.load(Ordering::SeqCst),
            })
            .collect()
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioContext for MockAudioOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl AudioOutput for MockAudioOutput {
    fn current_time(&self) -> f64 {
        self.state.lock().now
    }

    fn schedule(
        &self,
        buffer: Arc<PcmBuffer>,
        start_at: f64,
        on_ended: EndedCallback,
    ) -> Box<dyn ScheduledSource> {
        let stopped = Arc::new(AtomicBool::new(false));
        self.state.lock().entries.push(OutputEntry {
            start_at,
            duration: buffer.duration(),
            stopped: stopped.clone(),
            on_ended: Some(on_ended),
        });
        Box::new(MockSource { stopped })
    }
}

struct MockSource {
    stopped: Arc<AtomicBool>,
}

impl ScheduledSource for MockSource {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// A track that counts how often it was stopped.
#[derive(Debug, Default)]
pub struct MockTrack {
    stops: AtomicUsize,
}

impl MockTrack {
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_count() > 0
    }
}

impl MediaTrack for MockTrack {
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// A video source producing blank frames.
#[derive(Debug)]
pub struct MockVideoSource {
    width: u32,
    height: u32,
    facing: Option<FacingMode>,
    stopped: AtomicBool,
    ended: CancellationToken,
}

impl MockVideoSource {
    pub fn new(width: u32, height: u32, facing: Option<FacingMode>) -> Self {
        Self {
            width,
            height,
            facing,
            stopped: AtomicBool::new(false),
            ended: CancellationToken::new(),
        }
    }

    /// Facing requested for a camera; `None` for a screen share.
    pub fn facing(&self) -> Option<FacingMode> {
        self.facing
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Simulate the user revoking the stream outside the app.
    pub fn end(&self) {
        self.ended.cancel();
    }
}

#[async_trait]
impl VideoSource for MockVideoSource {
    fn grab_frame(&self) -> Option<DynamicImage> {
        if self.is_stopped() {
            return None;
        }
        Some(DynamicImage::new_rgb8(self.width, self.height))
    }

    async fn ended(&self) {
        self.ended.cancelled().await;
    }
}

impl MediaTrack for MockVideoSource {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Devices backed by the mocks above.
pub struct MockDevices {
    audio_supported: AtomicBool,
    input: Arc<MockAudioContext>,
    output: Arc<MockAudioOutput>,
    input_contexts: AtomicUsize,
    output_contexts: AtomicUsize,
    microphone: Mutex<Option<mpsc::Sender<Vec<f32>>>>,
    microphone_tracks: Mutex<Vec<Arc<MockTrack>>>,
    microphone_error: Mutex<Option<CaptureError>>,
    video_delays: Mutex<VecDeque<Duration>>,
    video_error: Mutex<Option<CaptureError>>,
    video_sources: Mutex<Vec<Arc<MockVideoSource>>>,
}

impl Default for MockDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevices {
    pub fn new() -> Self {
        Self {
            audio_supported: AtomicBool::new(true),
            input: Arc::new(MockAudioContext::new(livepilot_realtime::audio::INPUT_SAMPLE_RATE)),
            output: Arc::new(MockAudioOutput::new()),
            input_contexts: AtomicUsize::new(0),
            output_contexts: AtomicUsize::new(0),
            microphone: Mutex::new(None),
            microphone_tracks: Mutex::new(Vec::new()),
            microphone_error: Mutex::new(None),
            video_delays: Mutex::new(VecDeque::new()),
            video_error: Mutex::new(None),
            video_sources: Mutex::new(Vec::new()),
        }
    }

    /// Pretend the platform has no audio capture.
    pub fn without_audio(self) -> Self {
        self.audio_supported.store(false, Ordering::SeqCst);
        self
    }

    pub fn input(&self) -> Arc<MockAudioContext> {
        self.input.clone()
    }

    pub fn output(&self) -> Arc<MockAudioOutput> {
        self.output.clone()
    }

    /// How many times each audio context was created.
    pub fn context_creations(&self) -> (usize, usize) {
        (self.input_contexts.load(Ordering::SeqCst), self.output_contexts.load(Ordering::SeqCst))
    }

    /// Feed a block of samples to the open microphone. Returns `false` if none is open.
    pub fn push_microphone(&self, samples: Vec<f32>) -> bool {
        match self.microphone.lock().as_ref() {
            Some(tx) => tx.try_send(samples).is_ok(),
            None => false,
        }
    }

    pub fn microphone_tracks(&self) -> Vec<Arc<MockTrack>> {
        self.microphone_tracks.lock().clone()
    }

    /// End the open microphone as if the device went away.
    pub fn end_microphone(&self) {
        self.microphone.lock().take();
    }

    /// Fail the next microphone request.
    pub fn fail_microphone(&self, error: CaptureError) {
        *self.microphone_error.lock() = Some(error);
    }

    /// Delay the next camera/screen request.
    pub fn queue_video_delay(&self, delay: Duration) {
        self.video_delays.lock().push_back(delay);
    }

    /// Fail the next camera/screen request.
    pub fn fail_video(&self, error: CaptureError) {
        *self.video_error.lock() = Some(error);
    }

    /// Every video source handed out, in request order.
    pub fn video_sources(&self) -> Vec<Arc<MockVideoSource>> {
        self.video_sources.lock().clone()
    }

    async fn open_video(&self, facing: Option<FacingMode>) -> Result<VideoStream, CaptureError> {
        let delay = self.video_delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.video_error.lock().take() {
            return Err(error);
        }
        let source = Arc::new(MockVideoSource::new(1280, 720, facing));
        self.video_sources.lock().push(source.clone());
        let track: Arc<dyn MediaTrack> = source.clone();
        Ok(VideoStream::new(source, vec![track]))
    }
}

#[async_trait]
impl MediaDevices for MockDevices {
    fn supports_audio_capture(&self) -> bool {
        self.audio_supported.load(Ordering::SeqCst)
    }

    fn create_input_context(&self, _sample_rate: u32) -> Result<Arc<dyn AudioContext>, CaptureError> {
        self.input_contexts.fetch_add(1, Ordering::SeqCst);
        Ok(self.input.clone())
    }

    fn create_output_context(&self, _sample_rate: u32) -> Result<Arc<dyn AudioOutput>, CaptureError> {
        self.output_contexts.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }

    async fn microphone(&self, _context: Arc<dyn AudioContext>) -> Result<MicrophoneStream, CaptureError> {
        if let Some(error) = self.microphone_error.lock().take() {
            return Err(error);
        }
        let (tx, rx) = mpsc::channel(64);
        *self.microphone.lock() = Some(tx);
        let track = Arc::new(MockTrack::default());
        self.microphone_tracks.lock().push(track.clone());
        let track: Arc<dyn MediaTrack> = track;
        Ok(MicrophoneStream::new(rx, vec![track]))
    }

    async fn camera(&self, facing: FacingMode) -> Result<VideoStream, CaptureError> {
        self.open_video(Some(facing)).await
    }

    async fn screen(&self) -> Result<VideoStream, CaptureError> {
        self.open_video(None).await
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A message the client sent on a mock session.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Media(MediaBlob),
    Text(String),
    ToolResponse(ToolResponse),
    Close,
}

struct SessionShared {
    id: String,
    config: RealtimeConfig,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<livepilot_realtime::Result<ServerEvent>>>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<livepilot_realtime::Result<ServerEvent>>>,
    sent: Mutex<Vec<Outbound>>,
    closed: CancellationToken,
    close_calls: AtomicUsize,
}

/// Test-side handle to a session opened through [`MockModel`].
#[derive(Clone)]
pub struct MockSessionHandle {
    shared: Arc<SessionShared>,
}

impl MockSessionHandle {
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Configuration the session was opened with.
    pub fn config(&self) -> &RealtimeConfig {
        &self.shared.config
    }

    /// Deliver a server event.
    pub fn push(&self, event: ServerEvent) {
        if let Some(tx) = self.shared.inbound_tx.lock().as_ref() {
            let _ = tx.send(Ok(event));
        }
    }

    /// Deliver a transport error.
    pub fn push_error(&self, error: RealtimeError) {
        if let Some(tx) = self.shared.inbound_tx.lock().as_ref() {
            let _ = tx.send(Err(error));
        }
    }

    /// Close from the service side; events already pushed are still delivered.
    pub fn close_from_service(&self) {
        self.shared.inbound_tx.lock().take();
    }

    /// Everything the client sent, in order.
    pub fn sent(&self) -> Vec<Outbound> {
        self.shared.sent.lock().clone()
    }

    pub fn sent_media(&self) -> Vec<MediaBlob> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Media(blob) => Some(blob),
                _ => None,
            })
            .collect()
    }

    pub fn tool_responses(&self) -> Vec<ToolResponse> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::ToolResponse(response) => Some(response),
                _ => None,
            })
            .collect()
    }

    /// Closed by the client.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    pub fn close_calls(&self) -> usize {
        self.shared.close_calls.load(Ordering::SeqCst)
    }
}

/// Client side of a mock session.
pub struct MockSession {
    shared: Arc<SessionShared>,
}

impl MockSession {
    fn record(&self, outbound: Outbound) -> livepilot_realtime::Result<()> {
        if self.shared.closed.is_cancelled() {
            return Err(RealtimeError::SessionClosed);
        }
        self.shared.sent.lock().push(outbound);
        Ok(())
    }
}

#[async_trait]
impl RealtimeSession for MockSession {
    fn session_id(&self) -> &str {
        &self.shared.id
    }

    fn is_connected(&self) -> bool {
        !self.shared.closed.is_cancelled() && self.shared.inbound_tx.lock().is_some()
    }

    async fn send_media(&self, media: &MediaBlob) -> livepilot_realtime::Result<()> {
        self.record(Outbound::Media(media.clone()))
    }

    async fn send_text(&self, text: &str) -> livepilot_realtime::Result<()> {
        self.record(Outbound::Text(text.to_string()))
    }

    async fn send_tool_response(&self, response: ToolResponse) -> livepilot_realtime::Result<()> {
        self.record(Outbound::ToolResponse(response))
    }

    async fn next_event(&self) -> Option<livepilot_realtime::Result<ServerEvent>> {
        let mut inbound = self.shared.inbound_rx.lock().await;
        tokio::select! {
            biased;
            _ = self.shared.closed.cancelled() => None,
            event = inbound.recv() => event,
        }
    }

    async fn close(&self) -> livepilot_realtime::Result<()> {
        self.shared.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.shared.closed.is_cancelled() {
            self.shared.sent.lock().push(Outbound::Close);
            self.shared.closed.cancel();
        }
        Ok(())
    }
}

/// Model that opens [`MockSession`]s and keeps a handle to each.
#[derive(Default)]
pub struct MockModel {
    sessions: Mutex<Vec<MockSessionHandle>>,
    connect_errors: Mutex<VecDeque<RealtimeError>>,
    connect_delay: Mutex<Option<Duration>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next connect with `error`.
    pub fn fail_next_connect(&self, error: RealtimeError) {
        self.connect_errors.lock().push_back(error);
    }

    /// Make every connect take `delay` before it resolves.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = Some(delay);
    }

    /// Sessions opened so far, oldest first.
    pub fn sessions(&self) -> Vec<MockSessionHandle> {
        self.sessions.lock().clone()
    }

    pub fn last_session(&self) -> Option<MockSessionHandle> {
        self.sessions.lock().last().cloned()
    }

    pub fn connect_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[async_trait]
impl RealtimeModel for MockModel {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "mock-live"
    }

    fn input_format(&self) -> AudioFormat {
        AudioFormat::pcm16_16khz()
    }

    fn output_format(&self) -> AudioFormat {
        AudioFormat::pcm16_24khz()
    }

    async fn connect(&self, config: RealtimeConfig) -> livepilot_realtime::Result<BoxedSession> {
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let error = self.connect_errors.lock().pop_front();
        if let Some(error) = error {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let index = self.sessions.lock().len();
        let shared = Arc::new(SessionShared {
            id: format!("mock-session-{}", index + 1),
            config,
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            closed: CancellationToken::new(),
            close_calls: AtomicUsize::new(0),
        });
        self.sessions.lock().push(MockSessionHandle { shared: shared.clone() });
        Ok(Box::new(MockSession { shared }))
    }
}
