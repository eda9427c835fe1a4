//! Progress signal shared between an acquisition and its observers.
//!
//! Backed by a [`tokio::sync::watch`] channel: the slot always holds the most
//! recent state, new subscribers see it immediately, and slow subscribers may
//! skip intermediate values but never the last one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

pub const DOWNLOADING: &str = "downloading";
pub const UPLOADING: &str = "uploading";
pub const DONE: &str = "done";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Uploading,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Always within `0..=100`
    pub percent: u8,
    pub phase: Phase,
    pub message: Option<String>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            percent: 0,
            phase: Phase::Complete,
            message: None,
        }
    }
}

impl ProgressState {
    pub fn is_terminal(&self) -> bool {
        self.phase != Phase::Uploading
    }
}

/// `round(100 * loaded / total)`, clamped to 100. `None` when the total is unknown or zero.
pub fn percent_of(loaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (loaded as f64 * 100.0 / total as f64).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

/// Write side of the progress signal. Cheap to clone; all clones feed the same slot.
#[derive(Clone)]
pub struct ProgressTracker {
    tx: Arc<watch::Sender<ProgressState>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ProgressState {
        self.tx.borrow().clone()
    }

    /// Enters `uploading` at 0%, whatever the previous terminal state was.
    pub fn begin(&self, label: &str) {
        self.tx.send_replace(ProgressState {
            percent: 0,
            phase: Phase::Uploading,
            message: Some(format!("{}: 0%", label)),
        });
    }

    /// Reports `loaded` of `total` bytes. Never lowers the percentage of the
    /// request in flight and is ignored once a terminal state was published.
    pub fn advance(&self, label: &str, loaded: u64, total: u64) {
        let Some(percent) = percent_of(loaded, total) else {
            return;
        };

        self.tx.send_if_modified(|state| {
            if state.phase != Phase::Uploading || percent <= state.percent {
                return false;
            }
            state.percent = percent;
            state.message = Some(format!("{}: {}%", label, percent));
            true
        });
    }

    pub fn complete(&self) {
        self.tx.send_replace(ProgressState {
            percent: 100,
            phase: Phase::Complete,
            message: Some(DONE.to_string()),
        });
    }

    /// Publishes the error phase, keeping the percentage reached so far.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|state| {
            state.phase = Phase::Error;
            state.message = Some(message);
        });
    }
}

/// Feeds every observed state to `on_state` until a terminal one has been seen.
///
/// Intermediate states may be skipped; the terminal state never is.
pub async fn follow_until_terminal(
    mut rx: watch::Receiver<ProgressState>,
    mut on_state: impl FnMut(&ProgressState),
) -> Option<ProgressState> {
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        on_state(&state);
        if state.is_terminal() {
            return Some(state);
        }
    }
    None
}
