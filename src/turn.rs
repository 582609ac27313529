//! Turn synchronizer
//!
//! Bridges the push-style transcription callbacks delivered by the call
//! session into a pull-style "give me the caller's next answer" wait.
//!
//! The session may report the same utterance twice (raw transcription and
//! the structured conversation log), in any order, from another thread.
//! Only the first qualifying event after [`TurnSynchronizer::arm`] is kept;
//! anything after it is dropped until the next arm.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex as SyncMutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Who produced an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    System,
}

/// Channel an utterance notification arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Raw speech-to-text result for the caller's audio
    Transcription,
    /// Entry appended to the session's conversation log
    ConversationItem,
}

/// An utterance notification from the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceEvent {
    pub kind: EventKind,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl UtteranceEvent {
    pub fn transcription(role: Role, text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Transcription,
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn conversation_item(role: Role, text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::ConversationItem,
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Which roles may answer a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleFilter {
    /// Only caller speech counts
    #[default]
    UserOnly,
    /// Raw transcriptions count whatever their role (sessions that
    /// mislabel telephony audio). Conversation-log entries still need the
    /// caller's role, since the agent's own lines are logged there too.
    Any,
}

impl RoleFilter {
    pub fn admits(self, kind: EventKind, role: Role) -> bool {
        match (self, kind) {
            (RoleFilter::Any, EventKind::Transcription) => true,
            _ => role == Role::User,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("No caller input within {waited:?}")]
    Timeout { waited: Duration },
    #[error("Caller disconnected")]
    Disconnected,
}

/// Receiver of session notifications
pub trait UtteranceListener: Send + Sync {
    /// Called for every transcription or conversation-log entry
    fn on_event(&self, event: &UtteranceEvent);

    /// Called once when the remote party hangs up
    fn on_disconnect(&self) {}
}

/// Single-slot hand-off between the session callbacks and the call flow.
///
/// One instance per call. `arm` and `await_input` are driven by the call
/// flow, which never has more than one outstanding wait; `on_event` may run
/// concurrently from any thread.
pub struct TurnSynchronizer {
    filter: RoleFilter,
    /// Armed flag: true while a prompt is waiting for its answer. Held
    /// across the capture send so `arm` never drains between the two.
    waiting: SyncMutex<bool>,
    /// Capacity-1 slot holding the captured answer
    captured_tx: mpsc::Sender<String>,
    captured_rx: Mutex<mpsc::Receiver<String>>,
    hangup: CancellationToken,
}

impl TurnSynchronizer {
    pub fn new(filter: RoleFilter) -> Self {
        let (captured_tx, captured_rx) = mpsc::channel(1);
        Self {
            filter,
            waiting: SyncMutex::new(false),
            captured_tx,
            captured_rx: Mutex::new(captured_rx),
            hangup: CancellationToken::new(),
        }
    }

    /// Start listening for the next answer, discarding any stale capture.
    pub async fn arm(&self) {
        let mut rx = self.captured_rx.lock().await;
        let mut waiting = self.armed();
        while let Ok(stale) = rx.try_recv() {
            tracing::debug!(text = %stale, "Discarding stale capture");
        }
        *waiting = true;
    }

    /// Wait for the answer captured since the last `arm`.
    pub async fn await_input(&self, max_wait: Duration) -> Result<String, TurnError> {
        let mut rx = self.captured_rx.lock().await;

        let result = tokio::select! {
            biased;
            received = rx.recv() => received.ok_or(TurnError::Disconnected),
            () = self.hangup.cancelled() => Err(TurnError::Disconnected),
            () = tokio::time::sleep(max_wait) => Err(TurnError::Timeout { waited: max_wait }),
        };

        if result.is_err() {
            *self.armed() = false;
        }
        result
    }

    /// Session callback for transcription and conversation-log entries
    pub fn on_event(&self, event: &UtteranceEvent) {
        if !self.filter.admits(event.kind, event.role) || event.text.trim().is_empty() {
            tracing::trace!(kind = ?event.kind, role = ?event.role, "Utterance does not qualify");
            return;
        }

        let mut waiting = self.armed();
        if !*waiting {
            tracing::debug!(kind = ?event.kind, text = %event.text, "Utterance ignored, not armed");
            return;
        }
        *waiting = false;

        // The slot is drained on every arm and filled at most once per arm
        if let Err(e) = self.captured_tx.try_send(event.text.clone()) {
            tracing::warn!(error = %e, "Captured utterance dropped");
        } else {
            tracing::debug!(kind = ?event.kind, text = %event.text, "Captured caller input");
        }
    }

    /// Mark the caller as gone; current and future waits fail fast.
    pub fn close(&self) {
        *self.armed() = false;
        self.hangup.cancel();
    }

    pub fn is_waiting(&self) -> bool {
        *self.armed()
    }

    fn armed(&self) -> MutexGuard<'_, bool> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        self.hangup.is_cancelled()
    }
}

impl UtteranceListener for TurnSynchronizer {
    fn on_event(&self, event: &UtteranceEvent) {
        TurnSynchronizer::on_event(self, event);
    }

    fn on_disconnect(&self) {
        self.close();
    }
}
