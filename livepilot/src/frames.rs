//! Still-frame sampling for camera and screen streams.

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use livepilot_realtime::MediaBlob;
use parking_lot::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::capture::VideoSource;
use crate::error::Result;
use crate::outbound::OutboundQueue;

/// Where sampled frames go: the open session's queue, or nowhere while idle.
pub(crate) type OutboundRoute = Arc<RwLock<Option<Arc<OutboundQueue>>>>;

/// Downscales frames and encodes them as JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    width: u32,
    height: u32,
    quality: u8,
}

impl FrameEncoder {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self { width: width.max(1), height: height.max(1), quality: quality.clamp(1, 100) }
    }

    /// Resize to the configured geometry and wrap as an `image/jpeg` blob.
    pub fn encode(&self, frame: &DynamicImage) -> Result<MediaBlob> {
        let resized = frame.resize_exact(self.width, self.height, FilterType::Triangle);
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
        rgb.write_with_encoder(encoder)?;
        Ok(MediaBlob::jpeg(&buf))
    }
}

/// Why a sampler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SamplerExit {
    Cancelled,
    SourceEnded,
}

/// Sample `source` every `interval` and forward frames while a session is open.
pub(crate) async fn run_sampler(
    source: Arc<dyn VideoSource>,
    encoder: FrameEncoder,
    interval: Duration,
    route: OutboundRoute,
    cancel: CancellationToken,
) -> SamplerExit {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return SamplerExit::Cancelled,
            _ = source.ended() => return SamplerExit::SourceEnded,
            _ = ticker.tick() => {}
        }

        let Some(queue) = route.read().clone() else {
            continue;
        };
        let Some(frame) = source.grab_frame() else {
            tracing::trace!("No video frame available yet");
            continue;
        };
        match encoder.encode(&frame) {
            Ok(blob) => {
                if queue.push(blob) {
                    tracing::trace!("Outbound queue full, dropped oldest frame");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Skipping frame that failed to encode"),
        }
    }
}
