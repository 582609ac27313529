//! Call record handed to the transcript sink

use crate::state_machine::{CallContext, CallOutcome};
use crate::turn::Role;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One spoken line, from either side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallTranscript {
    pub call_id: String,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<TranscriptEntry>,
    pub context: CallContext,
    /// Absent when the call was aborted without reaching a terminal state
    pub outcome: Option<CallOutcome>,
}

impl CallTranscript {
    pub fn new(
        context: &CallContext,
        entries: Vec<TranscriptEntry>,
        outcome: Option<CallOutcome>,
    ) -> Self {
        Self {
            call_id: context.call_id().to_string(),
            started_at: context.call_start_time(),
            saved_at: Utc::now(),
            entries,
            context: context.clone(),
            outcome,
        }
    }
}
