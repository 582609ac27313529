//! Trait abstractions for runtime I/O
//!
//! The executor only talks to the outside world through these traits, so
//! tests can drive whole calls with scripted implementations.

use super::transcript::CallTranscript;
use crate::services::ServiceError;
use crate::state_machine::{AccountRecord, CallMetadata, CustomerInfo, PaymentSelection};
use crate::turn::EventKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub use crate::turn::UtteranceListener;

/// The live voice session with the callee
#[async_trait]
pub trait SessionChannel: Send + Sync {
    /// Speak `text` to the caller, returning once playback has been queued
    async fn speak(&self, text: &str, allow_interruptions: bool) -> Result<(), ServiceError>;

    /// Register a listener for one kind of utterance notification
    fn subscribe(&self, kind: EventKind, listener: Arc<dyn UtteranceListener>);

    /// Hang up. Calling this on a closed session is a no-op.
    async fn disconnect(&self) -> Result<(), ServiceError>;
}

/// Request to dial out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    pub destination: String,
    /// Caller ID override; the placer's configured number otherwise
    pub source: Option<String>,
    pub room: Option<String>,
    pub record: bool,
}

/// Handle returned by the telephony provider for a placed call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallHandle {
    pub call_id: String,
    pub room: Option<String>,
    pub status: String,
}

/// Places outbound calls
#[async_trait]
pub trait CallPlacer: Send + Sync {
    async fn place_call(&self, call: &OutboundCall) -> Result<CallHandle, ServiceError>;
}

/// Decides whether the callee's region permits automated collection calls
#[async_trait]
pub trait ComplianceGate: Send + Sync {
    async fn is_region_allowed(&self, metadata: &CallMetadata) -> Result<bool, ServiceError>;
}

/// Looks up the account matching a caller's last four digits
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// `Ok(None)` means no account matches those digits
    async fn lookup(&self, last_four: &str) -> Result<Option<AccountRecord>, ServiceError>;
}

/// Turns the caller's answer into a concrete payment arrangement
#[async_trait]
pub trait PaymentNegotiator: Send + Sync {
    async fn select_plan(
        &self,
        utterance: &str,
        customer: &CustomerInfo,
        call_start: DateTime<Utc>,
    ) -> Result<PaymentSelection, ServiceError>;
}

/// Stores the finished call record
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Returns where the transcript was written
    async fn save_transcript(&self, transcript: &CallTranscript) -> Result<PathBuf, ServiceError>;
}

/// Bundle of the per-call collaborators other than the session itself
#[derive(Clone)]
pub struct CallServices {
    pub compliance: Arc<dyn ComplianceGate>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub payments: Arc<dyn PaymentNegotiator>,
    pub transcripts: Arc<dyn TranscriptSink>,
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionChannel + ?Sized> SessionChannel for Arc<T> {
    async fn speak(&self, text: &str, allow_interruptions: bool) -> Result<(), ServiceError> {
        (**self).speak(text, allow_interruptions).await
    }

    fn subscribe(&self, kind: EventKind, listener: Arc<dyn UtteranceListener>) {
        (**self).subscribe(kind, listener);
    }

    async fn disconnect(&self) -> Result<(), ServiceError> {
        (**self).disconnect().await
    }
}
