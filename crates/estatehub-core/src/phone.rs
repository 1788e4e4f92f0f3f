//! Russian phone number handling for the chat widget input mask.

use std::fmt;

use thiserror::Error;

/// Digits required before a lead can be submitted (`7` + 10 digit number).
pub const MIN_DIGITS: usize = 11;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number needs at least {MIN_DIGITS} digits, got {0}")]
    TooShort(usize),
}

/// A normalized `+7XXXXXXXXXX` number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `+7 (XXX) XXX-XX-XX`
    pub fn formatted(&self) -> String {
        format_progressive(&self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Digits as the input mask keeps them: leading `8` rewritten to `7`,
/// capped at [`MIN_DIGITS`].
fn mask_digits(raw: &str) -> String {
    let mut d = digits(raw);
    if d.starts_with('8') {
        d.replace_range(..1, "7");
    }
    d.truncate(MIN_DIGITS);
    d
}

/// Normalize user input into a submittable number. The digits are read back
/// from the masked rendering, so the stored number is the one displayed.
pub fn normalize(raw: &str) -> Result<PhoneNumber, PhoneError> {
    let d = digits(&format_progressive(raw));
    if d.len() < MIN_DIGITS {
        return Err(PhoneError::TooShort(d.len()));
    }
    Ok(PhoneNumber(format!("+{d}")))
}

/// Format partially typed input the way the mask renders it while typing.
pub fn format_progressive(raw: &str) -> String {
    let mut d = mask_digits(raw);
    if d.is_empty() {
        return String::new();
    }
    if !d.starts_with('7') {
        d.insert(0, '7');
        d.truncate(MIN_DIGITS);
    }

    let part = |from: usize, to: usize| d.get(from..to.min(d.len())).unwrap_or("");
    let mut out = String::from("+7");
    if d.len() > 1 {
        out.push_str(" (");
        out.push_str(part(1, 4));
    }
    if d.len() >= 5 {
        out.push_str(") ");
        out.push_str(part(4, 7));
    }
    if d.len() >= 8 {
        out.push('-');
        out.push_str(part(7, 9));
    }
    if d.len() >= 10 {
        out.push('-');
        out.push_str(part(9, 11));
    }
    out
}
