//! Payment negotiation driven by keywords in the caller's answer

use crate::config::{AccountFixture, CallPolicy};
use crate::runtime::traits::PaymentNegotiator;
use crate::services::ServiceError;
use crate::state_machine::{CustomerInfo, PaymentOption, PaymentPlan, PaymentSelection};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Picks an option from what the caller said and builds the plan terms.
///
/// Anything that is neither a deferment nor a full-payment request is
/// treated as a request for installments.
#[derive(Debug, Clone)]
pub struct KeywordNegotiator {
    installment_amount: String,
    installment_count: u32,
    installment_offset_days: i64,
    deferment_days: i64,
}

impl KeywordNegotiator {
    pub fn new(account: &AccountFixture, policy: &CallPolicy) -> Self {
        Self {
            installment_amount: account.installment_amount.clone(),
            installment_count: policy.installment_count,
            installment_offset_days: policy.installment_offset_days,
            deferment_days: policy.deferment_days,
        }
    }

    pub fn classify(utterance: &str) -> PaymentOption {
        let text = utterance.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| text.contains(w));

        if mentions(&["defer", "hardship", "postpone", "later", "can't pay", "cannot pay"]) {
            PaymentOption::Deferment
        } else if mentions(&["install", "plan", "monthly", "split", "over time"]) {
            PaymentOption::Installment
        } else if mentions(&["full", "everything", "all of it", "whole", "today"]) {
            PaymentOption::Full
        } else {
            PaymentOption::Installment
        }
    }
}

#[async_trait]
impl PaymentNegotiator for KeywordNegotiator {
    async fn select_plan(
        &self,
        utterance: &str,
        customer: &CustomerInfo,
        call_start: DateTime<Utc>,
    ) -> Result<PaymentSelection, ServiceError> {
        let option = Self::classify(utterance);
        let today = call_start.date_naive();

        let plan = match option {
            PaymentOption::Full => None,
            PaymentOption::Installment => {
                let start = today + Duration::days(self.installment_offset_days);
                Some(PaymentPlan {
                    amount: customer.outstanding_amount.clone(),
                    start_date: start,
                    installment_count: self.installment_count,
                    next_payment_amount: self.installment_amount.clone(),
                    next_payment_date: start,
                })
            }
            PaymentOption::Deferment => {
                let start = today + Duration::days(self.deferment_days);
                Some(PaymentPlan {
                    amount: customer.outstanding_amount.clone(),
                    start_date: start,
                    installment_count: 1,
                    next_payment_amount: customer.outstanding_amount.clone(),
                    next_payment_date: start,
                })
            }
        };

        tracing::info!(option = option.key(), "Payment option selected");
        Ok(PaymentSelection { option, plan })
    }
}
