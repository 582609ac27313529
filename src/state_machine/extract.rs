//! Text helpers used by the verification and resolution phases

use chrono::{DateTime, Utc};

/// Last four ASCII digits of `text`, in order of appearance.
///
/// Fewer than four digits returns all of them, so the caller can tell a
/// malformed answer apart from a mismatched one.
pub fn extract_last_four_digits(text: &str) -> String {
    let digits: Vec<char> = text.chars().filter(char::is_ascii_digit).collect();
    let skip = digits.len().saturating_sub(4);
    digits.into_iter().skip(skip).collect()
}

pub fn mask_account(last_four: &str) -> String {
    format!("XXXX{last_four}")
}

/// `REF-YYYYMMDDHHMMSS` for the given instant
pub fn reference_number(at: DateTime<Utc>) -> String {
    format!("REF-{}", at.format("%Y%m%d%H%M%S"))
}
