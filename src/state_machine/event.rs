//! Events that can occur during a call

use super::context::{AccountRecord, PaymentSelection};
use crate::services::ServiceError;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Runtime started the call
    Start,
    /// Spoken lines of the current phase finished
    Advanced,

    ComplianceChecked { allowed: bool },

    // Caller input
    UtteranceCaptured { text: String },
    InputTimedOut,
    CallerDisconnected,

    // Collaborator results
    AccountFound { record: AccountRecord },
    AccountMismatch,
    PlanSelected { selection: PaymentSelection },
    ReferenceIssued { reference: String },

    ServiceFailed { error: ServiceError },
}
