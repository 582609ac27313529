//! Per-call context record
//!
//! Owned by the call runtime for the lifetime of one call. Fields are private
//! so the pairing invariants (verified <-> customer info, plan only after
//! verification, single resolution) hold everywhere.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Pending,
    Success,
    Error,
    /// Ended without an arrangement for a non-error reason (compliance,
    /// unverifiable caller)
    Declined,
}

/// Verified customer details shown back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    /// Masked account number, e.g. `XXXX1234`
    pub account: String,
    pub outstanding_amount: String,
    pub due_date: String,
}

/// Account record as returned by the account directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub last_four: String,
    pub outstanding_amount: String,
    pub due_date: String,
    pub installment_amount: String,
}

impl AccountRecord {
    pub fn customer_info(&self) -> CustomerInfo {
        CustomerInfo {
            account: super::mask_account(&self.last_four),
            outstanding_amount: self.outstanding_amount.clone(),
            due_date: self.due_date.clone(),
        }
    }
}

/// Payment options offered to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOption {
    Full,
    Installment,
    Deferment,
}

impl PaymentOption {
    pub const ALL: [PaymentOption; 3] = [
        PaymentOption::Full,
        PaymentOption::Installment,
        PaymentOption::Deferment,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PaymentOption::Full => "full",
            PaymentOption::Installment => "installment",
            PaymentOption::Deferment => "deferment",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PaymentOption::Full => "Pay in full today",
            PaymentOption::Installment => "Set up an installment plan",
            PaymentOption::Deferment => "Discuss payment deferment options",
        }
    }
}

/// Agreed payment schedule. Amounts are vendor-formatted strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub amount: String,
    pub start_date: NaiveDate,
    pub installment_count: u32,
    pub next_payment_amount: String,
    pub next_payment_date: NaiveDate,
}

/// Outcome of the payment discussion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSelection {
    pub option: PaymentOption,
    /// None when the caller pays in full
    pub plan: Option<PaymentPlan>,
}

/// What is known about the call before it starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub destination: Option<String>,
    /// ISO region code of the callee, when known
    pub region: Option<String>,
}

/// A mutation of the context requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum ContextUpdate {
    Verified { customer: CustomerInfo },
    PaymentArranged { selection: PaymentSelection },
    TransferRequested,
    Resolved {
        resolution: Resolution,
        reference: Option<String>,
        error: Option<String>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Caller identity has not been verified")]
    NotVerified,
    #[error("Call already resolved as {0:?}")]
    AlreadyResolved(Resolution),
    #[error("Cannot resolve a call as pending")]
    PendingResolution,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallContext {
    call_id: String,
    metadata: CallMetadata,
    verified: bool,
    customer_info: Option<CustomerInfo>,
    payment_option: Option<PaymentOption>,
    payment_plan: Option<PaymentPlan>,
    resolution: Resolution,
    transfer_requested: bool,
    call_start_time: DateTime<Utc>,
    call_end_time: Option<DateTime<Utc>>,
    reference_number: Option<String>,
    error: Option<String>,
}

impl CallContext {
    pub fn new(metadata: CallMetadata) -> Self {
        Self::starting_at(metadata, Utc::now())
    }

    pub fn starting_at(metadata: CallMetadata, call_start_time: DateTime<Utc>) -> Self {
        Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            metadata,
            verified: false,
            customer_info: None,
            payment_option: None,
            payment_plan: None,
            resolution: Resolution::Pending,
            transfer_requested: false,
            call_start_time,
            call_end_time: None,
            reference_number: None,
            error: None,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn metadata(&self) -> &CallMetadata {
        &self.metadata
    }

    pub fn verified(&self) -> bool {
        self.verified
    }

    pub fn customer_info(&self) -> Option<&CustomerInfo> {
        self.customer_info.as_ref()
    }

    pub fn payment_option(&self) -> Option<PaymentOption> {
        self.payment_option
    }

    pub fn payment_plan(&self) -> Option<&PaymentPlan> {
        self.payment_plan.as_ref()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn transfer_requested(&self) -> bool {
        self.transfer_requested
    }

    pub fn call_start_time(&self) -> DateTime<Utc> {
        self.call_start_time
    }

    pub fn call_end_time(&self) -> Option<DateTime<Utc>> {
        self.call_end_time
    }

    pub fn reference_number(&self) -> Option<&str> {
        self.reference_number.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn mark_verified(&mut self, customer: CustomerInfo) {
        self.verified = true;
        self.customer_info = Some(customer);
    }

    pub fn record_payment(&mut self, selection: PaymentSelection) -> Result<(), ContextError> {
        if !self.verified {
            return Err(ContextError::NotVerified);
        }
        self.payment_option = Some(selection.option);
        self.payment_plan = selection.plan;
        Ok(())
    }

    pub fn request_transfer(&mut self) {
        self.transfer_requested = true;
    }

    /// Record the final outcome. Allowed exactly once per call.
    pub fn resolve(
        &mut self,
        resolution: Resolution,
        reference: Option<String>,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), ContextError> {
        if resolution == Resolution::Pending {
            return Err(ContextError::PendingResolution);
        }
        if self.resolution != Resolution::Pending {
            return Err(ContextError::AlreadyResolved(self.resolution));
        }
        self.resolution = resolution;
        self.reference_number = reference;
        self.error = error;
        self.call_end_time = Some(at);
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution != Resolution::Pending
    }

    pub fn apply(&mut self, update: ContextUpdate, at: DateTime<Utc>) -> Result<(), ContextError> {
        match update {
            ContextUpdate::Verified { customer } => {
                self.mark_verified(customer);
                Ok(())
            }
            ContextUpdate::PaymentArranged { selection } => self.record_payment(selection),
            ContextUpdate::TransferRequested => {
                self.request_transfer();
                Ok(())
            }
            ContextUpdate::Resolved {
                resolution,
                reference,
                error,
            } => self.resolve(resolution, reference, error, at),
        }
    }
}
