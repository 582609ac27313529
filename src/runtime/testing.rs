//! Mock implementations for testing
//!
//! These mocks drive whole calls through `CallRuntime` without telephony,
//! speech engines or the filesystem.

use super::traits::*;
use super::transcript::CallTranscript;
use super::CallRuntime;
use crate::config::{AccountFixture, CallPolicy};
use crate::services::{KeywordNegotiator, ServiceError, StaticAccountDirectory};
use crate::state_machine::{
    AccountRecord, CallContext, CallMetadata, CustomerInfo, PaymentSelection,
};
use crate::turn::{EventKind, Role, RoleFilter, UtteranceEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Scripted Session
// ============================================================================

/// What the simulated caller does after an interruptible prompt
#[derive(Debug, Clone)]
pub enum Reply {
    /// Speak; reported on both channels, as live sessions do
    Say(String),
    /// First answer on the transcription channel, a different late one on
    /// the conversation log
    Conflicting { first: String, late: String },
    Silence,
    HangUp,
}

impl Reply {
    pub fn say(text: impl Into<String>) -> Self {
        Reply::Say(text.into())
    }
}

/// Session that answers prompts from a script and records what was said
#[derive(Default)]
pub struct ScriptedSession {
    replies: Mutex<VecDeque<Reply>>,
    listeners: Mutex<HashMap<EventKind, Vec<Arc<dyn UtteranceListener>>>>,
    spoken: Mutex<Vec<String>>,
    /// Speech containing this text fails
    fail_on: Option<String>,
    /// Echo agent speech back on the conversation log
    echo_agent: bool,
    disconnects: AtomicUsize,
}

impl ScriptedSession {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.fail_on = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_agent_echo(mut self) -> Self {
        self.echo_agent = true;
        self
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// How many times `text` was spoken verbatim
    pub fn times_spoken(&self, text: &str) -> usize {
        self.spoken.lock().unwrap().iter().filter(|s| *s == text).count()
    }

    pub fn said(&self, fragment: &str) -> bool {
        self.spoken.lock().unwrap().iter().any(|s| s.contains(fragment))
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn dispatch(&self, event: &UtteranceEvent) {
        let listeners = self
            .listeners
            .lock()
            .unwrap()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener.on_event(event);
        }
    }

    fn hang_up(&self) {
        let all: Vec<_> = self
            .listeners
            .lock()
            .unwrap()
            .values()
            .flatten()
            .cloned()
            .collect();
        for listener in all {
            listener.on_disconnect();
        }
    }
}

#[async_trait]
impl SessionChannel for ScriptedSession {
    async fn speak(&self, text: &str, allow_interruptions: bool) -> Result<(), ServiceError> {
        if let Some(fragment) = &self.fail_on {
            if text.contains(fragment.as_str()) {
                return Err(ServiceError::speech("TTS engine unavailable"));
            }
        }
        self.spoken.lock().unwrap().push(text.to_string());

        if self.echo_agent {
            self.dispatch(&UtteranceEvent::conversation_item(Role::Agent, text));
        }
        if !allow_interruptions {
            return Ok(());
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Say(answer)) => {
                self.dispatch(&UtteranceEvent::transcription(Role::User, answer.clone()));
                self.dispatch(&UtteranceEvent::conversation_item(Role::User, answer));
            }
            Some(Reply::Conflicting { first, late }) => {
                self.dispatch(&UtteranceEvent::transcription(Role::User, first));
                self.dispatch(&UtteranceEvent::conversation_item(Role::User, late));
            }
            Some(Reply::HangUp) => self.hang_up(),
            Some(Reply::Silence) | None => {}
        }
        Ok(())
    }

    fn subscribe(&self, kind: EventKind, listener: Arc<dyn UtteranceListener>) {
        self.listeners
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(listener);
    }

    async fn disconnect(&self) -> Result<(), ServiceError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Mock Collaborators
// ============================================================================

/// Compliance gate with a fixed answer; `None` fails every check
pub struct MockCompliance(pub Option<bool>);

#[async_trait]
impl ComplianceGate for MockCompliance {
    async fn is_region_allowed(&self, _metadata: &CallMetadata) -> Result<bool, ServiceError> {
        self.0
            .ok_or_else(|| ServiceError::compliance("Rules service unreachable"))
    }
}

/// Directory whose first `failures` lookups error out
pub struct FlakyDirectory {
    failures: AtomicU32,
    inner: StaticAccountDirectory,
    pub lookups: AtomicU32,
}

impl FlakyDirectory {
    pub fn new(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            inner: StaticAccountDirectory::from_fixture(&AccountFixture::default()),
            lookups: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AccountDirectory for FlakyDirectory {
    async fn lookup(&self, last_four: &str) -> Result<Option<AccountRecord>, ServiceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ServiceError::lookup("Directory timeout"));
        }
        self.inner.lookup(last_four).await
    }
}

pub struct FailingNegotiator;

#[async_trait]
impl PaymentNegotiator for FailingNegotiator {
    async fn select_plan(
        &self,
        _utterance: &str,
        _customer: &CustomerInfo,
        _call_start: DateTime<Utc>,
    ) -> Result<PaymentSelection, ServiceError> {
        Err(ServiceError::payment("Plan service returned 503"))
    }
}

/// Keeps saved transcripts in memory
#[derive(Default)]
pub struct RecordingSink {
    pub saved: Mutex<Vec<CallTranscript>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl TranscriptSink for RecordingSink {
    async fn save_transcript(&self, transcript: &CallTranscript) -> Result<PathBuf, ServiceError> {
        if self.fail {
            return Err(ServiceError::persistence("Disk full"));
        }
        self.saved.lock().unwrap().push(transcript.clone());
        Ok(PathBuf::from(format!("memory://{}", transcript.call_id)))
    }
}

// ============================================================================
// Test Call Builder
// ============================================================================

/// Builder for a fully mocked call
pub struct TestCall {
    replies: Vec<Reply>,
    policy: CallPolicy,
    compliance: Option<bool>,
    lookup_failures: u32,
    failing_payments: bool,
    failing_sink: bool,
    fail_speech_on: Option<String>,
    echo_agent: bool,
}

/// A built call plus handles on its mocks
pub struct TestHarness {
    pub runtime: CallRuntime<Arc<ScriptedSession>>,
    pub session: Arc<ScriptedSession>,
    pub sink: Arc<RecordingSink>,
    pub directory: Arc<FlakyDirectory>,
}

impl TestCall {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            policy: CallPolicy {
                input_timeout: Duration::from_millis(50),
                ..CallPolicy::default()
            },
            compliance: Some(true),
            lookup_failures: 0,
            failing_payments: false,
            failing_sink: false,
            fail_speech_on: None,
            echo_agent: false,
        }
    }

    pub fn max_attempts(mut self, max: u32) -> Self {
        self.policy.max_verification_attempts = max;
        self
    }

    pub fn compliance(mut self, answer: Option<bool>) -> Self {
        self.compliance = answer;
        self
    }

    pub fn lookup_failures(mut self, count: u32) -> Self {
        self.lookup_failures = count;
        self
    }

    pub fn failing_payments(mut self) -> Self {
        self.failing_payments = true;
        self
    }

    pub fn failing_sink(mut self) -> Self {
        self.failing_sink = true;
        self
    }

    pub fn fail_speech_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_speech_on = Some(fragment.into());
        self
    }

    pub fn agent_echo(mut self) -> Self {
        self.echo_agent = true;
        self
    }

    pub fn role_filter(mut self, filter: RoleFilter) -> Self {
        self.policy.role_filter = filter;
        self
    }

    pub fn build(self) -> TestHarness {
        let mut session = ScriptedSession::new(self.replies);
        if let Some(fragment) = self.fail_speech_on {
            session = session.failing_on(fragment);
        }
        if self.echo_agent {
            session = session.with_agent_echo();
        }
        let session = Arc::new(session);

        let sink = Arc::new(if self.failing_sink {
            RecordingSink::failing()
        } else {
            RecordingSink::default()
        });
        let directory = Arc::new(FlakyDirectory::new(self.lookup_failures));
        let payments: Arc<dyn PaymentNegotiator> = if self.failing_payments {
            Arc::new(FailingNegotiator)
        } else {
            Arc::new(KeywordNegotiator::new(&AccountFixture::default(), &self.policy))
        };

        let services = CallServices {
            compliance: Arc::new(MockCompliance(self.compliance)),
            accounts: directory.clone(),
            payments,
            transcripts: sink.clone(),
        };
        let context = CallContext::new(CallMetadata {
            destination: Some("+15550001111".into()),
            region: Some("US".into()),
        });

        TestHarness {
            runtime: CallRuntime::new(context, self.policy, session.clone(), services),
            session,
            sink,
            directory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts;
    use crate::runtime::WorkflowError;
    use crate::state_machine::{CallOutcome, DeclineReason, PaymentOption, Phase, Resolution};

    fn is_reference(text: &str) -> bool {
        let digits: Vec<char> = text.chars().skip(4).collect();
        text.starts_with("REF-") && digits.len() == 14 && digits.iter().all(char::is_ascii_digit)
    }

    #[tokio::test]
    async fn test_installment_call_succeeds() {
        let mut call = TestCall::new([
            Reply::say("sure, it ends in 1234"),
            Reply::say("a monthly plan would be easier"),
        ])
        .build();

        let outcome = call.runtime.run().await.unwrap();

        let CallOutcome::Success { reference } = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert!(is_reference(&reference));

        let ctx = call.runtime.context();
        assert!(ctx.verified());
        assert_eq!(ctx.resolution(), Resolution::Success);
        assert_eq!(ctx.reference_number(), Some(reference.as_str()));
        assert_eq!(ctx.payment_option(), Some(PaymentOption::Installment));
        assert_eq!(ctx.payment_plan().unwrap().installment_count, 3);
        assert!(ctx.call_end_time().is_some());
        assert!(!ctx.transfer_requested());

        let spoken = call.session.spoken();
        assert_eq!(spoken[0], prompts::COMPLIANCE_WARNING);
        assert_eq!(spoken[1], prompts::GREETING);
        assert!(call.session.said(&reference));
        assert_eq!(spoken.last().unwrap(), prompts::CLOSING_CONFIRMATION);

        assert_eq!(call.sink.count(), 1);
        assert_eq!(call.session.disconnects(), 1);
        assert!(call.runtime.state().is_terminal());
    }

    #[tokio::test]
    async fn test_verification_converges_on_fourth_answer() {
        let mut call = TestCall::new([
            Reply::say("abc"),
            Reply::say("12"),
            Reply::say("9999"),
            Reply::say("1234"),
            Reply::say("I'll pay in full"),
        ])
        .max_attempts(4)
        .build();

        call.runtime.run().await.unwrap();

        let ctx = call.runtime.context();
        assert!(ctx.verified());
        assert_eq!(ctx.customer_info().unwrap().account, "XXXX1234");
        assert_eq!(call.session.times_spoken(prompts::ACCOUNT_PROMPT), 4);
        assert_eq!(call.session.times_spoken(prompts::NEED_FOUR_DIGITS), 2);
        assert_eq!(call.session.times_spoken(prompts::ACCOUNT_MISMATCH), 1);
        assert_eq!(call.directory.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_verification_escalates_to_agent() {
        let mut call = TestCall::new([
            Reply::say("no idea"),
            Reply::say("12"),
            Reply::say("9999"),
            Reply::say("1234"),
        ])
        .build();

        let outcome = call.runtime.run().await.unwrap();

        assert_eq!(
            outcome,
            CallOutcome::Declined {
                reason: DeclineReason::VerificationExhausted
            }
        );
        let ctx = call.runtime.context();
        assert!(!ctx.verified());
        assert!(ctx.transfer_requested());
        assert_eq!(ctx.resolution(), Resolution::Declined);
        assert_eq!(call.session.times_spoken(prompts::ACCOUNT_PROMPT), 3);
        assert!(call.session.said(prompts::VERIFICATION_EXHAUSTED));
        assert!(!call.session.said("options available"));
        assert_eq!(call.sink.count(), 1);
    }

    #[tokio::test]
    async fn test_silence_reprompts() {
        let mut call = TestCall::new([
            Reply::Silence,
            Reply::say("1234"),
            Reply::say("everything today"),
        ])
        .build();

        let outcome = call.runtime.run().await.unwrap();

        assert!(matches!(outcome, CallOutcome::Success { .. }));
        assert_eq!(call.session.times_spoken(prompts::NO_ANSWER), 1);
        assert_eq!(call.session.times_spoken(prompts::ACCOUNT_PROMPT), 2);
        assert_eq!(call.runtime.context().payment_option(), Some(PaymentOption::Full));
    }

    #[tokio::test]
    async fn test_lookup_failure_consumes_attempt_and_retries() {
        let mut call = TestCall::new([
            Reply::say("1234"),
            Reply::say("1234"),
            Reply::say("full please"),
        ])
        .lookup_failures(1)
        .build();

        let outcome = call.runtime.run().await.unwrap();

        assert!(matches!(outcome, CallOutcome::Success { .. }));
        assert_eq!(call.session.times_spoken(prompts::LOOKUP_FAILED), 1);
        assert_eq!(call.directory.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_payment_failure_apologizes_and_transfers() {
        let mut call = TestCall::new([Reply::say("1234"), Reply::say("installments")])
            .failing_payments()
            .build();

        let err = call.runtime.run().await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::CallFailed {
                phase: Phase::Payment,
                ..
            }
        ));
        let ctx = call.runtime.context();
        assert_eq!(ctx.resolution(), Resolution::Error);
        assert!(ctx.transfer_requested());
        assert!(ctx.error().unwrap().contains("503"));
        assert!(call.session.said(prompts::TECHNICAL_ISSUE));
        assert!(call.session.said(prompts::TRANSFER_TO_AGENT));
        assert_eq!(call.sink.count(), 1);
        assert_eq!(call.session.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_no_payment_choice_ends_in_error() {
        let mut call = TestCall::new([Reply::say("1234"), Reply::Silence]).build();

        let err = call.runtime.run().await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::CallFailed {
                phase: Phase::Payment,
                ..
            }
        ));
        assert_eq!(call.runtime.context().resolution(), Resolution::Error);
        assert!(call.runtime.context().transfer_requested());
    }

    #[tokio::test]
    async fn test_hang_up_ends_call_without_more_speech() {
        let mut call = TestCall::new([Reply::HangUp]).build();

        let err = call.runtime.run().await.unwrap_err();

        let WorkflowError::CallFailed { phase, message } = err else {
            panic!("expected call failure");
        };
        assert_eq!(phase, Phase::Verification);
        assert_eq!(message, "Caller disconnected");
        assert_eq!(call.runtime.context().resolution(), Resolution::Error);
        assert_eq!(
            call.session.spoken().last().map(String::as_str),
            Some(prompts::ACCOUNT_PROMPT)
        );
        assert_eq!(call.sink.count(), 1);
        assert_eq!(call.session.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_compliance_decline_short_circuits() {
        let mut call = TestCall::new([Reply::say("1234")])
            .compliance(Some(false))
            .build();

        let outcome = call.runtime.run().await.unwrap();

        assert_eq!(
            outcome,
            CallOutcome::Declined {
                reason: DeclineReason::Compliance
            }
        );
        assert_eq!(call.session.spoken(), vec![prompts::COMPLIANCE_DECLINED]);
        assert_eq!(call.runtime.context().resolution(), Resolution::Declined);
        assert!(!call.runtime.context().verified());
        assert_eq!(call.directory.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(call.sink.count(), 1);
    }

    #[tokio::test]
    async fn test_compliance_service_failure_is_reported() {
        let mut call = TestCall::new(Vec::<Reply>::new()).compliance(None).build();

        let err = call.runtime.run().await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::CallFailed {
                phase: Phase::Compliance,
                ..
            }
        ));
        assert_eq!(call.session.spoken(), vec![prompts::TECHNICAL_ISSUE]);
        assert!(!call.runtime.context().transfer_requested());
    }

    #[tokio::test]
    async fn test_speech_failure_during_greeting() {
        let mut call = TestCall::new(Vec::<Reply>::new()).fail_speech_on("Riverline").build();

        let err = call.runtime.run().await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::CallFailed {
                phase: Phase::Greeting,
                ..
            }
        ));
        assert_eq!(call.runtime.context().resolution(), Resolution::Error);
        assert!(call.session.said(prompts::TECHNICAL_ISSUE));
        assert!(!call.session.said(prompts::ACCOUNT_PROMPT));
    }

    #[tokio::test]
    async fn test_late_duplicate_does_not_overwrite_answer() {
        let mut call = TestCall::new([
            Reply::Conflicting {
                first: "1234".into(),
                late: "5678".into(),
            },
            Reply::say("pay in full"),
        ])
        .build();

        let outcome = call.runtime.run().await.unwrap();

        assert!(matches!(outcome, CallOutcome::Success { .. }));
        assert_eq!(call.session.times_spoken(prompts::ACCOUNT_PROMPT), 1);
        let user_lines: Vec<_> = call
            .runtime
            .history()
            .iter()
            .filter(|e| e.role == Role::User)
            .map(|e| e.text.clone())
            .collect();
        assert_eq!(user_lines, vec!["1234", "pay in full"]);
    }

    #[tokio::test]
    async fn test_agent_echo_is_not_taken_as_answer() {
        let mut call = TestCall::new([Reply::say("1234"), Reply::say("full")])
            .agent_echo()
            .build();

        let outcome = call.runtime.run().await.unwrap();

        assert!(matches!(outcome, CallOutcome::Success { .. }));
        assert_eq!(call.session.times_spoken(prompts::NEED_FOUR_DIGITS), 0);
    }

    #[tokio::test]
    async fn test_lenient_roles_still_skip_agent_echo() {
        let mut call = TestCall::new([Reply::say("1234"), Reply::say("full")])
            .agent_echo()
            .role_filter(RoleFilter::Any)
            .build();

        let outcome = call.runtime.run().await.unwrap();

        assert!(matches!(outcome, CallOutcome::Success { .. }));
        assert!(call.runtime.context().verified());
        assert_eq!(call.session.times_spoken(prompts::NEED_FOUR_DIGITS), 0);
        assert_eq!(call.session.times_spoken(prompts::ACCOUNT_PROMPT), 1);
        let user_lines: Vec<_> = call
            .runtime
            .history()
            .iter()
            .filter(|e| e.role == Role::User)
            .map(|e| e.text.clone())
            .collect();
        assert_eq!(user_lines, vec!["1234", "full"]);
    }

    #[tokio::test]
    async fn test_speech_failure_during_resolution_transfers() {
        let mut call = TestCall::new([Reply::say("1234"), Reply::say("full")])
            .fail_speech_on("reference number")
            .build();

        let err = call.runtime.run().await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::CallFailed {
                phase: Phase::Resolution,
                ..
            }
        ));
        let ctx = call.runtime.context();
        assert_eq!(ctx.resolution(), Resolution::Error);
        assert!(ctx.transfer_requested());
        assert_eq!(ctx.payment_option(), Some(PaymentOption::Full));
        assert!(call.session.said(prompts::TECHNICAL_ISSUE));
        assert!(call.session.said(prompts::TRANSFER_TO_AGENT));
        assert!(!call.session.said(prompts::CLOSING_CONFIRMATION));
        assert_eq!(call.sink.count(), 1);
        assert_eq!(call.session.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_transcript_failure_does_not_fail_call() {
        let mut call = TestCall::new([Reply::say("1234"), Reply::say("full")])
            .failing_sink()
            .build();

        let outcome = call.runtime.run().await.unwrap();

        assert!(matches!(outcome, CallOutcome::Success { .. }));
        assert_eq!(call.session.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_saved_transcript_carries_both_sides() {
        let mut call = TestCall::new([Reply::say("1234"), Reply::say("defer it please")]).build();

        call.runtime.run().await.unwrap();

        let saved = call.sink.saved.lock().unwrap();
        let transcript = &saved[0];
        assert_eq!(transcript.call_id, call.runtime.context().call_id());
        assert!(matches!(
            transcript.outcome,
            Some(CallOutcome::Success { .. })
        ));
        assert!(transcript
            .entries
            .iter()
            .any(|e| e.role == Role::User && e.text == "defer it please"));
        assert_eq!(
            transcript.context.payment_option(),
            Some(PaymentOption::Deferment)
        );
    }
}
