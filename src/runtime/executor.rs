//! Call runtime executor

use super::traits::{CallServices, SessionChannel};
use super::transcript::{CallTranscript, TranscriptEntry};
use super::WorkflowError;

use crate::config::CallPolicy;
use crate::prompts;
use crate::services::{ServiceError, ServiceKind};
use crate::state_machine::{
    reference_number, transition, CallContext, CallOutcome, CallState, Effect, Event, Resolution,
};
use crate::turn::{EventKind, Role, TurnError, TurnSynchronizer};
use chrono::Utc;
use std::sync::Arc;

/// Runs one call from greeting to hang-up against any session implementation
pub struct CallRuntime<S: SessionChannel> {
    context: CallContext,
    state: CallState,
    policy: CallPolicy,
    session: S,
    services: CallServices,
    turns: Arc<TurnSynchronizer>,
    history: Vec<TranscriptEntry>,
}

impl<S: SessionChannel> CallRuntime<S> {
    /// Create the runtime and bind its turn synchronizer to both of the
    /// session's utterance channels.
    pub fn new(context: CallContext, policy: CallPolicy, session: S, services: CallServices) -> Self {
        let turns = Arc::new(TurnSynchronizer::new(policy.role_filter));
        session.subscribe(EventKind::Transcription, turns.clone());
        session.subscribe(EventKind::ConversationItem, turns.clone());

        Self {
            context,
            state: CallState::Init,
            policy,
            session,
            services,
            turns,
            history: Vec::new(),
        }
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    #[allow(dead_code)] // Inspected by tests
    pub fn state(&self) -> &CallState {
        &self.state
    }

    /// Lines spoken so far, by both parties
    #[allow(dead_code)] // Inspected by tests
    pub fn history(&self) -> &[TranscriptEntry] {
        &self.history
    }

    /// Drive the call to a terminal state.
    ///
    /// Declined calls are a normal outcome. A call that ended in error
    /// returns `Err` after the caller has been told and the session closed.
    pub async fn run(&mut self) -> Result<CallOutcome, WorkflowError> {
        let call_id = self.context.call_id().to_string();
        tracing::info!(call_id = %call_id, "Starting call workflow");

        let mut next = Some(Event::Start);
        while let Some(event) = next.take() {
            let result = match transition(&self.state, &self.context, &self.policy, event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(call_id = %call_id, error = %e, "Transition rejected");
                    self.abort(&e.to_string()).await;
                    return Err(e.into());
                }
            };

            let old_phase = self.state.phase();
            self.state = result.new_state;
            if old_phase != self.state.phase() {
                tracing::info!(call_id = %call_id, from = %old_phase, to = %self.state.phase(), "Phase changed");
            }
            tracing::debug!(call_id = %call_id, state = ?self.state, "Transitioned");

            next = match self.execute_effects(result.effects).await {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(call_id = %call_id, error = %e, "Effect execution failed");
                    self.abort(&e.to_string()).await;
                    return Err(e);
                }
            };
        }

        let Some(outcome) = self.state.outcome().cloned() else {
            let stalled = format!("{:?}", self.state);
            tracing::error!(call_id = %call_id, state = %stalled, "Call stalled without a next event");
            self.abort("Call stalled").await;
            return Err(WorkflowError::Stalled(stalled));
        };

        tracing::info!(
            call_id = %call_id,
            outcome = ?outcome,
            resolution = ?self.context.resolution(),
            transfer_requested = self.context.transfer_requested(),
            "Call workflow finished"
        );

        match outcome {
            CallOutcome::Error { phase, message } => Err(WorkflowError::CallFailed { phase, message }),
            outcome => Ok(outcome),
        }
    }

    /// Execute effects in order, stopping at the first one that yields an event
    async fn execute_effects(&mut self, effects: Vec<Effect>) -> Result<Option<Event>, WorkflowError> {
        for effect in effects {
            if !self.state.is_terminal() && self.turns.is_closed() {
                tracing::info!(call_id = %self.context.call_id(), "Caller hung up");
                return Ok(Some(Event::CallerDisconnected));
            }
            if let Some(event) = self.execute_effect(effect).await? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, WorkflowError> {
        let call_id = self.context.call_id().to_string();

        match effect {
            Effect::CheckCompliance => {
                let checked = self
                    .services
                    .compliance
                    .is_region_allowed(self.context.metadata())
                    .await;
                Ok(Some(match checked {
                    Ok(allowed) => {
                        tracing::info!(call_id = %call_id, allowed, "Compliance checked");
                        Event::ComplianceChecked { allowed }
                    }
                    Err(e) => {
                        tracing::error!(call_id = %call_id, error = %e, "Compliance check failed");
                        Event::ServiceFailed {
                            error: as_kind(e, ServiceKind::Compliance),
                        }
                    }
                }))
            }

            Effect::Advance => Ok(Some(Event::Advanced)),

            Effect::ArmInput => {
                self.turns.arm().await;
                Ok(None)
            }

            Effect::Speak {
                text,
                allow_interruptions,
            } => match self.session.speak(&text, allow_interruptions).await {
                Ok(()) => {
                    self.history.push(TranscriptEntry::new(Role::Agent, text));
                    Ok(None)
                }
                Err(e) => {
                    tracing::error!(call_id = %call_id, error = %e, "Speech failed");
                    Ok(Some(Event::ServiceFailed {
                        error: as_kind(e, ServiceKind::Speech),
                    }))
                }
            },

            Effect::Announce { text } => {
                if self.turns.is_closed() {
                    tracing::debug!(call_id = %call_id, "Skipping announcement, caller gone");
                    return Ok(None);
                }
                match self.session.speak(&text, false).await {
                    Ok(()) => self.history.push(TranscriptEntry::new(Role::Agent, text)),
                    Err(e) => tracing::warn!(call_id = %call_id, error = %e, "Announcement failed"),
                }
                Ok(None)
            }

            Effect::AwaitInput => {
                match self.turns.await_input(self.policy.input_timeout).await {
                    Ok(text) => {
                        tracing::debug!(call_id = %call_id, text = %text, "Caller answered");
                        self.history.push(TranscriptEntry::new(Role::User, text.clone()));
                        Ok(Some(Event::UtteranceCaptured { text }))
                    }
                    Err(TurnError::Timeout { waited }) => {
                        tracing::info!(call_id = %call_id, ?waited, "No answer from caller");
                        Ok(Some(Event::InputTimedOut))
                    }
                    Err(TurnError::Disconnected) => Ok(Some(Event::CallerDisconnected)),
                }
            }

            Effect::LookupAccount { last_four } => {
                let found = self.services.accounts.lookup(&last_four).await;
                Ok(Some(match found {
                    Ok(Some(record)) => {
                        tracing::info!(call_id = %call_id, "Identity verified");
                        Event::AccountFound { record }
                    }
                    Ok(None) => {
                        tracing::info!(call_id = %call_id, attempt = ?self.state.verification_attempt(), "Account digits did not match");
                        Event::AccountMismatch
                    }
                    Err(e) => {
                        tracing::warn!(call_id = %call_id, error = %e, "Account lookup failed");
                        Event::ServiceFailed {
                            error: as_kind(e, ServiceKind::Lookup),
                        }
                    }
                }))
            }

            Effect::SelectPaymentPlan { utterance } => {
                let Some(customer) = self.context.customer_info().cloned() else {
                    return Ok(Some(Event::ServiceFailed {
                        error: ServiceError::payment("No verified customer for payment discussion"),
                    }));
                };
                let selected = self
                    .services
                    .payments
                    .select_plan(&utterance, &customer, self.context.call_start_time())
                    .await;
                Ok(Some(match selected {
                    Ok(selection) => Event::PlanSelected { selection },
                    Err(e) => {
                        tracing::error!(call_id = %call_id, error = %e, "Payment negotiation failed");
                        Event::ServiceFailed {
                            error: as_kind(e, ServiceKind::Payment),
                        }
                    }
                }))
            }

            Effect::IssueReference => {
                let reference = reference_number(Utc::now());
                tracing::info!(call_id = %call_id, reference = %reference, "Reference issued");
                Ok(Some(Event::ReferenceIssued { reference }))
            }

            Effect::UpdateContext(update) => {
                self.context.apply(update, Utc::now())?;
                Ok(None)
            }

            Effect::SaveTranscript => {
                self.save_transcript().await;
                Ok(None)
            }

            Effect::Disconnect => {
                self.turns.close();
                if let Err(e) = self.session.disconnect().await {
                    tracing::warn!(call_id = %call_id, error = %e, "Disconnect failed");
                }
                Ok(None)
            }
        }
    }

    async fn save_transcript(&self) {
        let transcript = CallTranscript::new(
            &self.context,
            self.history.clone(),
            self.state.outcome().cloned(),
        );
        if let Err(e) = self.services.transcripts.save_transcript(&transcript).await {
            tracing::warn!(call_id = %self.context.call_id(), error = %e, "Failed to save transcript");
        }
    }

    /// Wind the call down after the loop could not continue
    async fn abort(&mut self, message: &str) {
        if !self.context.is_resolved() {
            if let Err(e) = self.context.resolve(
                Resolution::Error,
                None,
                Some(message.to_string()),
                Utc::now(),
            ) {
                tracing::warn!(error = %e, "Could not record aborted call");
            }
        }
        if !self.turns.is_closed() {
            if let Err(e) = self.session.speak(prompts::TECHNICAL_ISSUE, false).await {
                tracing::warn!(error = %e, "Apology failed");
            } else {
                self.history
                    .push(TranscriptEntry::new(Role::Agent, prompts::TECHNICAL_ISSUE));
            }
        }
        self.save_transcript().await;
        self.turns.close();
        if let Err(e) = self.session.disconnect().await {
            tracing::warn!(error = %e, "Disconnect failed");
        }
    }
}

/// Attribute a collaborator failure to the phase that called it
fn as_kind(error: ServiceError, kind: ServiceKind) -> ServiceError {
    ServiceError { kind, ..error }
}
