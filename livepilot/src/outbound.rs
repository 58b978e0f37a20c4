//! Bounded outbound media queue.
//!
//! Capture never waits on the network: producers push and return, a single
//! writer task drains. When the writer falls behind the oldest frames are
//! dropped, since stale audio and stale stills are worth less than fresh ones.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use livepilot_realtime::{MediaBlob, RealtimeSession};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Drop-oldest queue of media frames awaiting send.
#[derive(Debug)]
pub struct OutboundQueue {
    frames: Mutex<VecDeque<MediaBlob>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a frame. Returns `true` if an older frame was dropped to make room.
    /// Frames pushed after [`close`](Self::close) are discarded.
    pub fn push(&self, frame: MediaBlob) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut dropped = false;
        {
            let mut frames = self.frames.lock();
            frames.push_back(frame);
            while frames.len() > self.capacity {
                frames.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                dropped = true;
            }
        }
        self.notify.notify_one();
        dropped
    }

    /// Wait for the next frame. `None` once closed.
    pub async fn pop(&self) -> Option<MediaBlob> {
        loop {
            if self.is_closed() {
                return None;
            }
            if let Some(frame) = self.frames.lock().pop_front() {
                return Some(frame);
            }
            self.notify.notified().await;
        }
    }

    /// Stop accepting frames and wake the writer. Pending frames are discarded.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.frames.lock().clear();
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total frames dropped for lack of room.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drain `queue` into `session` until cancelled or closed.
///
/// Send failures are logged and skipped.
pub(crate) async fn run_writer(
    queue: std::sync::Arc<OutboundQueue>,
    session: std::sync::Arc<dyn RealtimeSession>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = queue.pop() => frame,
        };
        let Some(frame) = frame else { break };
        if let Err(e) = session.send_media(&frame).await {
            tracing::debug!(error = %e, mime_type = %frame.mime_type, "Dropped outbound frame");
        }
    }
    tracing::debug!(dropped = queue.dropped(), "Outbound writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(tag: u8) -> MediaBlob {
        MediaBlob::new("audio/pcm;rate=16000", &[tag, 0])
    }

    #[tokio::test]
    async fn test_drops_oldest_when_full() {
        let queue = OutboundQueue::new(2);
        assert!(!queue.push(frame(1)));
        assert!(!queue.push(frame(2)));
        assert!(queue.push(frame(3)));

        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop().await, Some(frame(2)));
        assert_eq!(queue.pop().await, Some(frame(3)));
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_writer() {
        let queue = Arc::new(OutboundQueue::new(4));
        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.pop().await }
        });
        tokio::task::yield_now().await;
        queue.close();
        assert_eq!(waiter.await.unwrap(), None);
        assert!(!queue.push(frame(1)));
        assert!(queue.is_empty());
    }
}
