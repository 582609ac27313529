//! Effects produced by state transitions

use super::context::ContextUpdate;

/// Effects to be executed after a state transition.
///
/// Effects run in order. An effect that yields an event ends its batch, so
/// event-producing effects are always placed last.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the compliance predicate whether the call may proceed
    CheckCompliance,

    /// Yield `Event::Advanced` once the preceding effects are done
    Advance,

    /// Start listening for the caller's next answer
    ArmInput,

    /// Say something; a failure aborts the batch
    Speak {
        text: String,
        allow_interruptions: bool,
    },

    /// Say something on the way out; failures are logged only
    Announce { text: String },

    /// Wait for the answer armed by `ArmInput`
    AwaitInput,

    LookupAccount { last_four: String },

    SelectPaymentPlan { utterance: String },

    /// Generate the reference number from the wall clock
    IssueReference,

    UpdateContext(ContextUpdate),

    /// Hand the transcript to the persistence sink (non-fatal)
    SaveTranscript,

    /// Hang up the session
    Disconnect,
}

impl Effect {
    pub fn say(text: impl Into<String>) -> Self {
        Effect::Speak {
            text: text.into(),
            allow_interruptions: false,
        }
    }

    /// A prompt the caller may talk over
    pub fn prompt(text: impl Into<String>) -> Self {
        Effect::Speak {
            text: text.into(),
            allow_interruptions: true,
        }
    }

    pub fn announce(text: impl Into<String>) -> Self {
        Effect::Announce { text: text.into() }
    }

    /// Whether this effect speaks `text` (in any form)
    pub fn speaks(&self, text: &str) -> bool {
        match self {
            Effect::Speak { text: t, .. } | Effect::Announce { text: t } => t == text,
            _ => false,
        }
    }
}
