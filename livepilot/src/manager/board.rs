//! Display slot for the most recent pointer command.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::command::Command;
use crate::status::{LiveEvent, LiveStatus};

/// Shows one command at a time and clears it after the display window.
///
/// Every publish starts a new generation. An expiry only clears the slot if
/// its generation is still the newest, so the latest command always gets the
/// full window.
#[derive(Clone)]
pub(crate) struct CommandBoard {
    status: Arc<watch::Sender<LiveStatus>>,
    events: broadcast::Sender<LiveEvent>,
    generation: Arc<AtomicU64>,
    display: Duration,
}

impl CommandBoard {
    pub fn new(
        status: Arc<watch::Sender<LiveStatus>>,
        events: broadcast::Sender<LiveEvent>,
        display: Duration,
    ) -> Self {
        Self { status, events, generation: Arc::new(AtomicU64::new(0)), display }
    }

    pub fn publish(&self, command: Command) {
        let mut generation = 0;
        self.status.send_modify(|status| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            status.command = Some(command.clone());
        });
        tracing::info!(action = ?command.action, generation, "Command issued");
        let _ = self.events.send(LiveEvent::CommandIssued { command });

        let board = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(board.display).await;
            board.expire(generation);
        });
    }

    /// Clear the slot regardless of generation.
    pub fn clear(&self) {
        let mut cleared = None;
        self.status.send_if_modified(|status| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            cleared = status.command.take();
            cleared.is_some()
        });
        if let Some(command) = cleared {
            let _ = self.events.send(LiveEvent::CommandExpired { command });
        }
    }

    fn expire(&self, generation: u64) {
        let mut expired = None;
        self.status.send_if_modified(|status| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            expired = status.command.take();
            expired.is_some()
        });
        if let Some(command) = expired {
            tracing::debug!(generation, "Command expired");
            let _ = self.events.send(LiveEvent::CommandExpired { command });
        }
    }
}
