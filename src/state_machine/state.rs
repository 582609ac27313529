//! Call state types

use super::context::PaymentSelection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation phase, used for logging and error attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Compliance,
    Greeting,
    Verification,
    Payment,
    Resolution,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Compliance => "compliance",
            Phase::Greeting => "greeting",
            Phase::Verification => "verification",
            Phase::Payment => "payment",
            Phase::Resolution => "resolution",
            Phase::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Why a call ended without an arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    /// Regional rules forbid the call
    Compliance,
    /// Verification attempts used up; handed to a human agent
    VerificationExhausted,
}

/// Final outcome of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    Success { reference: String },
    Declined { reason: DeclineReason },
    Error { phase: Phase, message: String },
}

/// Call state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallState {
    /// Created, nothing said yet
    #[default]
    Init,

    /// Waiting on the compliance predicate
    ComplianceCheck,

    /// Disclosure and greeting being spoken
    Greeting,

    /// Account prompt spoken, waiting for the caller's answer
    VerifyIdentity { attempt: u32 },

    /// Answer parsed, account lookup in flight
    CheckingAccount { attempt: u32, last_four: String },

    /// Options presented, waiting for the caller's choice
    DiscussPayment,

    /// Choice captured, payment service building the arrangement
    SelectingPlan,

    /// Arrangement recorded, reference number being issued
    Resolution { selection: PaymentSelection },

    /// Summary and closing lines being spoken
    Confirming { reference: String },

    /// Call over; no further events accepted
    Terminal { outcome: CallOutcome },
}

impl CallState {
    pub fn phase(&self) -> Phase {
        match self {
            CallState::Init | CallState::ComplianceCheck => Phase::Compliance,
            CallState::Greeting => Phase::Greeting,
            CallState::VerifyIdentity { .. } | CallState::CheckingAccount { .. } => {
                Phase::Verification
            }
            CallState::DiscussPayment | CallState::SelectingPlan => Phase::Payment,
            CallState::Resolution { .. } | CallState::Confirming { .. } => Phase::Resolution,
            CallState::Terminal { .. } => Phase::Ended,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Terminal { .. })
    }

    /// Verification attempt in progress, if any
    pub fn verification_attempt(&self) -> Option<u32> {
        match self {
            CallState::VerifyIdentity { attempt } | CallState::CheckingAccount { attempt, .. } => {
                Some(*attempt)
            }
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&CallOutcome> {
        match self {
            CallState::Terminal { outcome } => Some(outcome),
            _ => None,
        }
    }
}
