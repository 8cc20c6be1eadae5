//! Secret strength scoring and acceptance rules.
//!
//! `score` is a 0-6 sum of independent checks and is only advisory outside
//! interactive entry. `validate` is the hard gate every backend applies before
//! handing a secret to the orchestrator.

use crate::error::{CredentialError, Result};
use crate::types::SecretKind;

/// Highest value [`score`] can return
pub const MAX_SCORE: u8 = 6;

/// Scores below this are logged as weak
pub const WEAK_SCORE_THRESHOLD: u8 = 3;

/// Well-known secrets rejected regardless of length (compared case-insensitively)
const DENY_LIST: &[&str] = &[
    "password",
    "password1",
    "password123",
    "123456",
    "12345678",
    "123456789",
    "1234567890",
    "admin",
    "administrator",
    "root",
    "toor",
    "user",
    "test",
    "qwerty",
    "qwertyuiop",
    "letmein",
    "welcome",
    "changeme",
    "default",
    "archlinux",
];

/// Score a candidate secret from 0 to 6.
///
/// One point each for: length >= 8, length >= 12, a lowercase letter, an
/// uppercase letter, a digit, and any other character.
pub fn score(secret: &str) -> u8 {
    let len = secret.chars().count();
    let mut total = 0;
    if len >= 8 {
        total += 1;
    }
    if len >= 12 {
        total += 1;
    }
    total + character_classes(secret)
}

/// Count how many of the four character classes (lower, upper, digit,
/// special) appear in `secret`.
pub fn character_classes(secret: &str) -> u8 {
    let mut lower = false;
    let mut upper = false;
    let mut digit = false;
    let mut special = false;
    for c in secret.chars() {
        if c.is_ascii_lowercase() {
            lower = true;
        } else if c.is_ascii_uppercase() {
            upper = true;
        } else if c.is_ascii_digit() {
            digit = true;
        } else {
            special = true;
        }
    }
    [lower, upper, digit, special].iter().filter(|&&b| b).count() as u8
}

/// True if `secret` matches a deny-listed value, ignoring case
pub fn is_denied(secret: &str) -> bool {
    DENY_LIST.iter().any(|d| d.eq_ignore_ascii_case(secret))
}

/// Accept or reject a candidate for `kind`.
///
/// Rejects when the value contains a control character, is shorter than
/// `min_length` characters, or is on the deny-list. The rejection reason never
/// contains the value itself.
pub fn validate(secret: &str, min_length: usize, kind: SecretKind) -> Result<()> {
    // Container payloads are line-oriented
    if secret.chars().any(char::is_control) {
        return Err(CredentialError::validation(
            kind,
            "must not contain control characters",
        ));
    }
    let len = secret.chars().count();
    if len < min_length {
        return Err(CredentialError::validation(
            kind,
            format!("must be at least {} characters (got {})", min_length, len),
        ));
    }
    if is_denied(secret) {
        return Err(CredentialError::validation(
            kind,
            "matches a commonly used weak secret",
        ));
    }
    Ok(())
}

/// [`validate`] with the kind's own minimum length
pub fn validate_for(secret: &str, kind: SecretKind) -> Result<()> {
    validate(secret, kind.min_length(), kind)
}
