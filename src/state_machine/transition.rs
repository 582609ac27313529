//! Pure state transition function
//!
//! Given the same state, context, policy and event, `transition` always
//! produces the same result. Speaking, waiting, lookups and clock reads all
//! happen in the runtime as effects.

use super::context::{ContextUpdate, Resolution};
use super::state::{CallOutcome, CallState, DeclineReason, Phase};
use super::{extract_last_four_digits, CallContext, Effect, Event};
use crate::config::CallPolicy;
use crate::prompts;
use crate::services::{ServiceError, ServiceKind};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: CallState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: CallState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Call has already ended")]
    CallEnded,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

pub fn transition(
    state: &CallState,
    _context: &CallContext,
    policy: &CallPolicy,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (CallState::Terminal { .. }, _) => Err(TransitionError::CallEnded),

        (_, Event::CallerDisconnected) => Ok(caller_gone(state.phase())),

        // ============================================================
        // Compliance and greeting
        // ============================================================
        (CallState::Init, Event::Start) => {
            Ok(TransitionResult::new(CallState::ComplianceCheck).with_effect(Effect::CheckCompliance))
        }

        (CallState::ComplianceCheck, Event::ComplianceChecked { allowed: false }) => {
            Ok(TransitionResult::new(CallState::Terminal {
                outcome: CallOutcome::Declined {
                    reason: DeclineReason::Compliance,
                },
            })
            .with_effects([
                resolved(Resolution::Declined, None, None),
                Effect::announce(prompts::COMPLIANCE_DECLINED),
                Effect::SaveTranscript,
                Effect::Disconnect,
            ]))
        }

        (CallState::ComplianceCheck, Event::ComplianceChecked { allowed: true }) => {
            Ok(TransitionResult::new(CallState::Greeting).with_effects([
                Effect::say(prompts::COMPLIANCE_WARNING),
                Effect::say(prompts::GREETING),
                Effect::Advance,
            ]))
        }

        (CallState::Greeting, Event::Advanced) => {
            Ok(TransitionResult::new(CallState::VerifyIdentity { attempt: 1 })
                .with_effects(ask_for_account()))
        }

        // ============================================================
        // Identity verification
        // ============================================================
        (CallState::VerifyIdentity { attempt }, Event::UtteranceCaptured { text }) => {
            let last_four = extract_last_four_digits(&text);
            if last_four.len() == 4 {
                Ok(TransitionResult::new(CallState::CheckingAccount {
                    attempt: *attempt,
                    last_four: last_four.clone(),
                })
                .with_effect(Effect::LookupAccount { last_four }))
            } else {
                Ok(failed_attempt(*attempt, policy, prompts::NEED_FOUR_DIGITS))
            }
        }

        (CallState::VerifyIdentity { attempt }, Event::InputTimedOut) => {
            Ok(failed_attempt(*attempt, policy, prompts::NO_ANSWER))
        }

        // A record for other digits never unlocks the payment options
        (CallState::CheckingAccount { attempt, last_four }, Event::AccountFound { record })
            if record.last_four != *last_four =>
        {
            tracing::warn!(attempt, "Directory returned a record for different digits");
            Ok(failed_attempt(*attempt, policy, prompts::VERIFY_FIRST))
        }

        (CallState::CheckingAccount { .. }, Event::AccountFound { record }) => {
            let customer = record.customer_info();
            Ok(TransitionResult::new(CallState::DiscussPayment).with_effects([
                Effect::UpdateContext(ContextUpdate::Verified {
                    customer: customer.clone(),
                }),
                Effect::say(prompts::verified_summary(&customer)),
                Effect::ArmInput,
                Effect::prompt(prompts::payment_options()),
                Effect::AwaitInput,
            ]))
        }

        (CallState::CheckingAccount { attempt, .. }, Event::AccountMismatch) => {
            Ok(failed_attempt(*attempt, policy, prompts::ACCOUNT_MISMATCH))
        }

        (CallState::CheckingAccount { attempt, .. }, Event::ServiceFailed { error })
            if error.kind == ServiceKind::Lookup =>
        {
            tracing::warn!(attempt, error = %error, "Account lookup failed, re-prompting");
            Ok(failed_attempt(*attempt, policy, prompts::LOOKUP_FAILED))
        }

        // ============================================================
        // Payment discussion
        // ============================================================

        (CallState::DiscussPayment, Event::UtteranceCaptured { text }) => {
            Ok(TransitionResult::new(CallState::SelectingPlan)
                .with_effect(Effect::SelectPaymentPlan { utterance: text }))
        }

        (CallState::DiscussPayment, Event::InputTimedOut) => Ok(call_failed(
            Phase::Payment,
            "No payment choice received from caller",
        )),

        (CallState::SelectingPlan, Event::PlanSelected { selection }) => {
            Ok(TransitionResult::new(CallState::Resolution {
                selection: selection.clone(),
            })
            .with_effects([
                Effect::UpdateContext(ContextUpdate::PaymentArranged { selection }),
                Effect::IssueReference,
            ]))
        }

        // ============================================================
        // Resolution
        // ============================================================
        (CallState::Resolution { selection }, Event::ReferenceIssued { reference }) => {
            Ok(TransitionResult::new(CallState::Confirming {
                reference: reference.clone(),
            })
            .with_effects([
                Effect::say(prompts::resolution_summary(selection, &reference)),
                Effect::prompt(prompts::CLOSING_CONFIRMATION),
                Effect::Advance,
            ]))
        }

        (CallState::Confirming { reference }, Event::Advanced) => {
            Ok(TransitionResult::new(CallState::Terminal {
                outcome: CallOutcome::Success {
                    reference: reference.clone(),
                },
            })
            .with_effects([
                resolved(Resolution::Success, Some(reference.clone()), None),
                Effect::SaveTranscript,
                Effect::Disconnect,
            ]))
        }

        // ============================================================
        // Failures
        // ============================================================
        (_, Event::ServiceFailed { error }) => Ok(service_failed(state.phase(), &error)),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in {state:?}"
        ))),
    }
}

/// Arm, prompt for the account digits, then wait
fn ask_for_account() -> [Effect; 3] {
    [
        Effect::ArmInput,
        Effect::prompt(prompts::ACCOUNT_PROMPT),
        Effect::AwaitInput,
    ]
}

fn resolved(resolution: Resolution, reference: Option<String>, error: Option<String>) -> Effect {
    Effect::UpdateContext(ContextUpdate::Resolved {
        resolution,
        reference,
        error,
    })
}

/// A verification attempt failed: re-prompt, or escalate once attempts run out
fn failed_attempt(attempt: u32, policy: &CallPolicy, corrective: &str) -> TransitionResult {
    if attempt >= policy.max_verification_attempts {
        return TransitionResult::new(CallState::Terminal {
            outcome: CallOutcome::Declined {
                reason: DeclineReason::VerificationExhausted,
            },
        })
        .with_effects([
            Effect::UpdateContext(ContextUpdate::TransferRequested),
            resolved(Resolution::Declined, None, None),
            Effect::announce(corrective),
            Effect::announce(prompts::VERIFICATION_EXHAUSTED),
            Effect::SaveTranscript,
            Effect::Disconnect,
        ]);
    }

    TransitionResult::new(CallState::VerifyIdentity {
        attempt: attempt + 1,
    })
    .with_effect(Effect::say(corrective))
    .with_effects(ask_for_account())
}

fn service_failed(phase: Phase, error: &ServiceError) -> TransitionResult {
    call_failed(phase, &error.to_string())
}

/// End the call in error. Payment and resolution failures also request a
/// transfer to a human agent.
fn call_failed(phase: Phase, message: &str) -> TransitionResult {
    let transfer = matches!(phase, Phase::Payment | Phase::Resolution);

    let mut result = TransitionResult::new(CallState::Terminal {
        outcome: CallOutcome::Error {
            phase,
            message: message.to_string(),
        },
    });
    if transfer {
        result = result.with_effect(Effect::UpdateContext(ContextUpdate::TransferRequested));
    }
    result = result
        .with_effect(resolved(Resolution::Error, None, Some(message.to_string())))
        .with_effect(Effect::announce(prompts::TECHNICAL_ISSUE));
    if transfer {
        result = result.with_effect(Effect::announce(prompts::TRANSFER_TO_AGENT));
    }
    result.with_effects([Effect::SaveTranscript, Effect::Disconnect])
}

/// The caller hung up; record it, nobody is left to hear an apology
fn caller_gone(phase: Phase) -> TransitionResult {
    let message = "Caller disconnected".to_string();
    TransitionResult::new(CallState::Terminal {
        outcome: CallOutcome::Error {
            phase,
            message: message.clone(),
        },
    })
    .with_effects([
        resolved(Resolution::Error, None, Some(message)),
        Effect::SaveTranscript,
        Effect::Disconnect,
    ])
}
