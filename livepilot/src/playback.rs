//! Gapless playback of response audio.
//!
//! Chunks are laid end to end on the output clock: each starts where the
//! previous one ends, or now if the queue has drained. Playback order is
//! enqueue order.

use std::collections::HashMap;
use std::sync::Arc;

use livepilot_realtime::PcmBuffer;
use parking_lot::Mutex;

use crate::capture::{AudioOutput, ScheduledSource};

type PlayingListener = Arc<dyn Fn(bool) + Send + Sync>;

struct SchedulerState {
    next_start_time: f64,
    active: HashMap<u64, Box<dyn ScheduledSource>>,
    next_id: u64,
}

/// Schedules decoded chunks back to back and flushes them on interruption.
#[derive(Clone)]
pub struct PlaybackScheduler {
    output: Arc<dyn AudioOutput>,
    state: Arc<Mutex<SchedulerState>>,
    listener: Option<PlayingListener>,
}

impl PlaybackScheduler {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            state: Arc::new(Mutex::new(SchedulerState {
                next_start_time: 0.0,
                active: HashMap::new(),
                next_id: 0,
            })),
            listener: None,
        }
    }

    /// Be told when playback starts (`true`) and when the queue drains or is
    /// reset (`false`).
    pub fn with_listener(mut self, listener: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Schedule `buffer` right after everything already queued.
    ///
    /// Returns the start time on the output clock.
    pub fn enqueue(&self, buffer: PcmBuffer) -> f64 {
        let buffer = Arc::new(buffer);
        let duration = buffer.duration();

        let (start_at, started) = {
            let mut state = self.state.lock();
            // Read the clock under the lock, never from a cached value.
            let start_at = state.next_start_time.max(self.output.current_time());
            state.next_start_time = start_at + duration;

            let id = state.next_id;
            state.next_id += 1;

            let source = self.output.schedule(buffer, start_at, self.on_ended(id));
            let started = state.active.is_empty();
            state.active.insert(id, source);
            (start_at, started)
        };

        if started {
            self.notify(true);
        }
        start_at
    }

    /// Stop everything scheduled and rewind the timeline to zero.
    pub fn reset(&self) {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.next_start_time = 0.0;
            state.active.drain().map(|(_, source)| source).collect()
        };
        for source in &drained {
            source.stop();
        }
        if !drained.is_empty() {
            tracing::debug!(stopped = drained.len(), "Playback flushed");
        }
        self.notify(false);
    }

    /// End of the last scheduled chunk on the output clock.
    pub fn next_start_time(&self) -> f64 {
        self.state.lock().next_start_time
    }

    /// Number of chunks scheduled and not yet finished.
    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn is_playing(&self) -> bool {
        self.active_count() > 0
    }

    fn on_ended(&self, id: u64) -> crate::capture::EndedCallback {
        let state = Arc::downgrade(&self.state);
        let listener = self.listener.clone();
        Box::new(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            let drained = {
                let mut state = state.lock();
                state.active.remove(&id).is_some() && state.active.is_empty()
            };
            if drained {
                if let Some(listener) = listener {
                    listener(false);
                }
            }
        })
    }

    fn notify(&self, playing: bool) {
        if let Some(listener) = &self.listener {
            listener(playing);
        }
    }
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PlaybackScheduler")
            .field("next_start_time", &state.next_start_time)
            .field("active", &state.active.len())
            .finish()
    }
}
