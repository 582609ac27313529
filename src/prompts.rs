//! Agent utterances
//!
//! Fixed lines are constants so tests can match on them; lines that carry
//! call data are built by the functions below.

use crate::state_machine::{CustomerInfo, PaymentOption, PaymentSelection};
use std::fmt::Write;

pub const COMPLIANCE_WARNING: &str = "This call is being recorded for quality and compliance purposes. \
     By continuing this conversation, you consent to the recording.";

pub const COMPLIANCE_DECLINED: &str = "This call cannot proceed due to regional regulations.";

pub const GREETING: &str =
    "Hello, this is an automated call from Riverline Bank regarding your outstanding balance.";

pub const ACCOUNT_PROMPT: &str =
    "For security purposes, could you please provide the last 4 digits of your account number?";

pub const NEED_FOUR_DIGITS: &str = "Please provide exactly 4 digits for your account number.";

pub const ACCOUNT_MISMATCH: &str =
    "The account number you provided doesn't match our records. Please try again.";

pub const LOOKUP_FAILED: &str =
    "I encountered an error while verifying your identity. Let's try again.";

pub const NO_ANSWER: &str = "I'm sorry, I didn't catch that.";

pub const VERIFY_FIRST: &str =
    "I'll need to verify your identity before discussing payment options.";

pub const TRANSFER_TO_AGENT: &str = "I understand you'd like to speak with a representative. \
     Please hold while I transfer you to an available agent who can assist you further.";

pub const VERIFICATION_EXHAUSTED: &str =
    "I'm unable to verify your identity over this call, so I'm transferring you to an agent who can help.";

pub const TECHNICAL_ISSUE: &str = "We're experiencing technical difficulties. \
     Please call us back at the number on your statement or try again later.";

pub const CLOSING_CONFIRMATION: &str = "Is everything I've described correct? \
     If you have questions later, you can reach our support team at the number on your statement. \
     Thank you for your time.";

pub fn verified_summary(customer: &CustomerInfo) -> String {
    format!(
        "Thank you for verifying your identity. I see you have an outstanding balance of {} \
         on account {}, due {}.",
        customer.outstanding_amount, customer.account, customer.due_date
    )
}

pub fn payment_options() -> String {
    let mut text = String::from("Here are the options available to you:");
    for option in PaymentOption::ALL {
        let _ = write!(text, " {}: {}.", option.key(), option.description());
    }
    text.push_str(" Which would you prefer?");
    text
}

pub fn resolution_summary(selection: &PaymentSelection, reference: &str) -> String {
    let mut text = match &selection.plan {
        None => String::from(
            "Thank you. Your payment in full is being processed today.",
        ),
        Some(plan) if plan.installment_count > 1 => format!(
            "You've agreed to pay {} in {} installments. Your first payment of {} is due on {}.",
            plan.amount,
            plan.installment_count,
            plan.next_payment_amount,
            plan.next_payment_date.format("%B %-d, %Y"),
        ),
        Some(plan) => format!(
            "Your payment of {} has been deferred. It is now due on {}.",
            plan.next_payment_amount,
            plan.next_payment_date.format("%B %-d, %Y"),
        ),
    };
    let _ = write!(text, " Your reference number is {reference}.");
    text
}
