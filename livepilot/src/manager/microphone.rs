//! Microphone to transport pump.

use std::sync::{Arc, Weak};

use livepilot_realtime::FrameBuffer;
use livepilot_realtime::audio::{self, mean_abs};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::Inner;
use crate::capture::MicrophoneStream;
use crate::outbound::OutboundQueue;
use crate::settings::LiveSettings;
use crate::status::LiveStatus;

/// Frames microphone blocks, flags speech, and queues encoded frames.
pub(super) struct MicrophonePump {
    pub stream: MicrophoneStream,
    pub queue: Arc<OutboundQueue>,
    pub settings: watch::Receiver<LiveSettings>,
    pub status: Arc<watch::Sender<LiveStatus>>,
    pub framer: FrameBuffer,
    pub threshold: f32,
    pub cancel: CancellationToken,
    pub manager: Weak<Inner>,
    pub epoch: u64,
}

impl MicrophonePump {
    pub async fn run(mut self) {
        loop {
            let block = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                block = self.stream.next_block() => block,
            };
            let Some(block) = block else {
                self.set_talking(false);
                if let Some(inner) = self.manager.upgrade() {
                    inner.on_microphone_ended(self.epoch).await;
                }
                return;
            };

            self.framer.push(&block);
            while let Some(frame) = self.framer.next_frame() {
                self.process(&frame);
            }
        }
        self.set_talking(false);
    }

    fn process(&self, frame: &[f32]) {
        // Latest snapshot on every frame; mute can flip mid-session.
        let muted = self.settings.borrow().muted;
        self.set_talking(!muted && mean_abs(frame) > self.threshold);
        if muted {
            return;
        }

        match audio::encode(frame) {
            Ok(blob) => {
                if self.queue.push(blob) {
                    tracing::trace!("Outbound queue full, dropped oldest frame");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Skipping microphone frame"),
        }
    }

    fn set_talking(&self, talking: bool) {
        self.status.send_if_modified(|status| {
            let changed = status.user_talking != talking;
            status.user_talking = talking;
            changed
        });
    }
}
