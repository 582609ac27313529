//! Collaborator error types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure reported by an external collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} failure: {message}")]
pub struct ServiceError {
    pub kind: ServiceKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn speech(message: impl Into<String>) -> Self {
        Self::new(ServiceKind::Speech, message)
    }

    pub fn telephony(message: impl Into<String>) -> Self {
        Self::new(ServiceKind::Telephony, message)
    }

    pub fn compliance(message: impl Into<String>) -> Self {
        Self::new(ServiceKind::Compliance, message)
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(ServiceKind::Lookup, message)
    }

    pub fn payment(message: impl Into<String>) -> Self {
        Self::new(ServiceKind::Payment, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ServiceKind::Persistence, message)
    }
}

/// Which collaborator failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Speech output or the media session itself
    Speech,
    /// Outbound call placement
    Telephony,
    /// Regional compliance rules
    Compliance,
    /// Customer account lookup
    Lookup,
    /// Payment arrangement service
    Payment,
    /// Transcript storage (never fatal)
    Persistence,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceKind::Speech => "speech",
            ServiceKind::Telephony => "telephony",
            ServiceKind::Compliance => "compliance",
            ServiceKind::Lookup => "account lookup",
            ServiceKind::Payment => "payment",
            ServiceKind::Persistence => "persistence",
        };
        f.write_str(name)
    }
}
