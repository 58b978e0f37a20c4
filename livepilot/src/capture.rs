//! Media capture adapter and the platform seams it sits on.
//!
//! The platform provides audio contexts, a microphone sample stream and video
//! sources through [`MediaDevices`]. [`MediaCapture`] wraps acquisition with a
//! request sequence so that a result arriving after the user already changed
//! their mind is released instead of attached.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use image::DynamicImage;
use livepilot_realtime::PcmBuffer;
use tokio::sync::mpsc;

use crate::error::CaptureError;
use crate::settings::FacingMode;

/// Callback run by the output device when a scheduled buffer finishes.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// An audio clock/context. Platforms may hand these out suspended.
#[async_trait]
pub trait AudioContext: Send + Sync {
    /// Native sample rate.
    fn sample_rate(&self) -> u32;

    /// Resume a suspended context. Resuming a running context is a no-op.
    async fn resume(&self) -> Result<(), CaptureError>;
}

/// Playback-side context with a monotonic clock, in seconds.
pub trait AudioOutput: AudioContext {
    /// Current output clock time.
    fn current_time(&self) -> f64;

    /// Start `buffer` at `start_at` on the output clock.
    ///
    /// `on_ended` runs once the buffer finishes playing. Implementations must
    /// not run it from within `schedule` itself, and must not run it after the
    /// returned source was stopped.
    fn schedule(
        &self,
        buffer: Arc<PcmBuffer>,
        start_at: f64,
        on_ended: EndedCallback,
    ) -> Box<dyn ScheduledSource>;
}

/// A buffer scheduled on the output device.
pub trait ScheduledSource: Send + Sync {
    /// Stop playback immediately.
    fn stop(&self);
}

/// One track of a capture stream.
pub trait MediaTrack: Send + Sync {
    /// Stop the track. Stopping twice is harmless.
    fn stop(&self);
}

/// A video source that can be sampled for still frames.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Grab the latest frame, if one is available.
    fn grab_frame(&self) -> Option<DynamicImage>;

    /// Resolves when the source ends out-of-band, e.g. permission revoked in
    /// the browser chrome or the shared window closed.
    async fn ended(&self);
}

/// Platform media access.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Whether the platform can capture audio at all.
    fn supports_audio_capture(&self) -> bool;

    /// Create the capture-rate audio context.
    fn create_input_context(&self, sample_rate: u32) -> Result<Arc<dyn AudioContext>, CaptureError>;

    /// Create the playback-rate audio context.
    fn create_output_context(&self, sample_rate: u32) -> Result<Arc<dyn AudioOutput>, CaptureError>;

    /// Open the microphone on `context`.
    async fn microphone(&self, context: Arc<dyn AudioContext>) -> Result<MicrophoneStream, CaptureError>;

    /// Open a camera.
    async fn camera(&self, facing: FacingMode) -> Result<VideoStream, CaptureError>;

    /// Start a screen share.
    async fn screen(&self) -> Result<VideoStream, CaptureError>;
}

/// Tracks of one capture stream, released together exactly once.
#[derive(Clone)]
pub struct StreamHandle {
    tracks: Arc<Vec<Arc<dyn MediaTrack>>>,
    released: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks: Arc::new(tracks), released: Arc::new(AtomicBool::new(false)) }
    }

    /// Stop every track. Idempotent.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        for track in self.tracks.iter() {
            track.stop();
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("tracks", &self.tracks.len())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Microphone samples, delivered in whatever block size the device uses.
pub struct MicrophoneStream {
    blocks: mpsc::Receiver<Vec<f32>>,
    handle: StreamHandle,
}

impl MicrophoneStream {
    pub fn new(blocks: mpsc::Receiver<Vec<f32>>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { blocks, handle: StreamHandle::new(tracks) }
    }

    /// Next block of normalized samples. `None` once the device stops.
    pub async fn next_block(&mut self) -> Option<Vec<f32>> {
        if self.handle.is_released() {
            return None;
        }
        self.blocks.recv().await
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }
}

/// A camera or screen stream.
#[derive(Clone)]
pub struct VideoStream {
    source: Arc<dyn VideoSource>,
    handle: StreamHandle,
}

impl VideoStream {
    pub fn new(source: Arc<dyn VideoSource>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { source, handle: StreamHandle::new(tracks) }
    }

    pub fn source(&self) -> Arc<dyn VideoSource> {
        self.source.clone()
    }

    pub fn release(&self) {
        self.handle.release();
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }
}

/// Result of a sequence-stamped acquisition.
pub struct Acquisition<T> {
    sequence: u64,
    result: Result<T, CaptureError>,
}

impl<T> Acquisition<T> {
    /// Sequence value captured when the request started.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Outcome of [`MediaCapture::claim`].
pub enum Claim<T> {
    /// The request is still the latest one.
    Current(T),
    /// The request is still the latest one and failed.
    Failed(CaptureError),
    /// A newer request or an invalidation superseded this one.
    Stale,
}

/// Sequence-guarded access to the platform's devices.
pub struct MediaCapture {
    devices: Arc<dyn MediaDevices>,
    sequence: AtomicU64,
}

impl MediaCapture {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self { devices, sequence: AtomicU64::new(0) }
    }

    pub fn devices(&self) -> &Arc<dyn MediaDevices> {
        &self.devices
    }

    /// Open the microphone. Not sequence-guarded; there is only ever one.
    pub async fn acquire_microphone(
        &self,
        context: Arc<dyn AudioContext>,
    ) -> Result<MicrophoneStream, CaptureError> {
        self.devices.microphone(context).await
    }

    /// Request a camera. The result must go through [`claim`](Self::claim).
    pub async fn acquire_camera(&self, facing: FacingMode) -> Acquisition<VideoStream> {
        let sequence = self.next_sequence();
        let result = self.devices.camera(facing).await;
        Acquisition { sequence, result }
    }

    /// Request a screen share. The result must go through [`claim`](Self::claim).
    pub async fn acquire_screen(&self) -> Acquisition<VideoStream> {
        let sequence = self.next_sequence();
        let result = self.devices.screen().await;
        Acquisition { sequence, result }
    }

    /// Supersede every in-flight video request.
    pub fn invalidate(&self) {
        self.next_sequence();
    }

    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Accept an acquisition if nothing superseded it; otherwise release it.
    pub fn claim(&self, acquisition: Acquisition<VideoStream>) -> Claim<VideoStream> {
        let current = acquisition.sequence == self.current_sequence();
        match (acquisition.result, current) {
            (Ok(stream), true) => Claim::Current(stream),
            (Err(e), true) => Claim::Failed(e),
            (Ok(stream), false) => {
                tracing::debug!(
                    sequence = acquisition.sequence,
                    current = self.current_sequence(),
                    "Releasing stale video stream"
                );
                stream.release();
                Claim::Stale
            }
            (Err(_), false) => Claim::Stale,
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}
