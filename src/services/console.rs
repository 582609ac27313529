//! Terminal-backed session for running a call without telephony
//!
//! Agent speech goes to stdout; each line typed on stdin is delivered as a
//! caller utterance on both notification channels, the way a live voice
//! session reports the same speech twice. End of input is a hang-up.

use crate::runtime::traits::{SessionChannel, UtteranceListener};
use crate::services::ServiceError;
use crate::turn::{EventKind, Role, UtteranceEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct ConsoleSession {
    listeners: Mutex<HashMap<EventKind, Vec<Arc<dyn UtteranceListener>>>>,
    closed: AtomicBool,
}

impl ConsoleSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the stdin reader. The task ends at end of input or hang-up.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if session.is_closed() {
                            break;
                        }
                        session.dispatch(&UtteranceEvent::transcription(Role::User, line.clone()));
                        session.dispatch(&UtteranceEvent::conversation_item(Role::User, line));
                    }
                    Ok(None) => {
                        tracing::info!("Console input closed");
                        session.hang_up();
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Console read failed");
                        session.hang_up();
                        break;
                    }
                }
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn dispatch(&self, event: &UtteranceEvent) {
        let listeners = self.listeners_for(event.kind);
        for listener in listeners {
            listener.on_event(event);
        }
    }

    /// Remote side went away
    fn hang_up(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let all: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flatten()
            .cloned()
            .collect();
        for listener in all {
            listener.on_disconnect();
        }
    }

    fn listeners_for(&self, kind: EventKind) -> Vec<Arc<dyn UtteranceListener>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionChannel for ConsoleSession {
    async fn speak(&self, text: &str, _allow_interruptions: bool) -> Result<(), ServiceError> {
        if self.is_closed() {
            return Err(ServiceError::speech("Session is closed"));
        }
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "agent> {text}")
            .and_then(|()| stdout.flush())
            .map_err(|e| ServiceError::speech(format!("Failed to write to console: {e}")))?;
        drop(stdout);

        self.dispatch(&UtteranceEvent::conversation_item(Role::Agent, text));
        Ok(())
    }

    fn subscribe(&self, kind: EventKind, listener: Arc<dyn UtteranceListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(listener);
    }

    async fn disconnect(&self) -> Result<(), ServiceError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            println!("[call ended]");
        }
        Ok(())
    }
}
