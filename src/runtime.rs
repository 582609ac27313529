//! Runtime for executing calls
//!
//! Drives the pure state machine: each transition's effects run against the
//! collaborator traits and any event they produce is fed back in until the
//! call reaches a terminal state.

mod executor;
mod transcript;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::CallRuntime;
pub use traits::*;
pub use transcript::{CallTranscript, TranscriptEntry};

use crate::state_machine::{ContextError, Phase, TransitionError};
use thiserror::Error;

/// Why `CallRuntime::run` did not finish cleanly
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The call ended in error; the caller has already been told
    #[error("Call failed during {phase}: {message}")]
    CallFailed { phase: Phase, message: String },
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Context update rejected: {0}")]
    Context(#[from] ContextError),
    /// A batch finished without producing the next event
    #[error("Call stalled in {0}")]
    Stalled(String),
}
