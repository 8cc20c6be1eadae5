//! CSPRNG-backed secret generation.
//!
//! Passwords draw one byte per character from `OsRng` and map it onto the
//! character set by rejection sampling: bytes at or above the largest multiple
//! of the set size are discarded, so every character is equally likely.
//! Disk-encryption passphrases are capitalized dictionary words joined by
//! hyphens with a numeric suffix, because they get typed by hand at boot.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::Backend;
use super::wordlist::WORDLIST;
use crate::error::{CredentialError, Result};
use crate::secret::Secret;
use crate::strength;
use crate::types::{SecretKind, SecretSource};

/// Specials that survive shell quoting, sed replacement and `key=value`
/// config files without escaping
pub const SAFE_SPECIALS: &str = "!%+-.:=?@^_~";

/// Characters easily confused with each other on screen or paper
pub const AMBIGUOUS: &str = "0O1lI";

/// Character classes a generated password must cover at minimum
pub const MIN_CLASSES: u8 = 3;

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";

/// Generator tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    pub user_length: usize,
    pub root_length: usize,
    pub passphrase_words: usize,
    pub include_special: bool,
    pub exclude_ambiguous: bool,
    /// Candidates tried per secret before giving up
    pub max_attempts: u32,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            user_length: 16,
            root_length: 20,
            passphrase_words: 6,
            include_special: true,
            exclude_ambiguous: false,
            max_attempts: 5,
        }
    }
}

/// Build the character set for password generation
pub fn charset(include_special: bool, exclude_ambiguous: bool) -> Vec<u8> {
    let mut set: Vec<u8> = [LOWER, UPPER, DIGITS]
        .concat()
        .into_bytes();
    if include_special {
        set.extend_from_slice(SAFE_SPECIALS.as_bytes());
    }
    if exclude_ambiguous {
        set.retain(|b| !AMBIGUOUS.as_bytes().contains(b));
    }
    set
}

/// Uniform index in `0..len` from single random bytes, by rejection sampling.
///
/// `len` must be in `1..=256`.
pub fn random_index<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> usize {
    debug_assert!((1..=256).contains(&len));
    // Largest multiple of len that fits in a byte's range
    let limit = 256 - (256 % len);
    let mut byte = [0u8; 1];
    loop {
        rng.fill_bytes(&mut byte);
        let value = byte[0] as usize;
        if value < limit {
            return value % len;
        }
    }
}

fn sample_password<R: RngCore + ?Sized>(rng: &mut R, set: &[u8], length: usize) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::with_capacity(length));
    for _ in 0..length {
        out.push(set[random_index(rng, set.len())] as char);
    }
    out
}

fn sample_passphrase<R: Rng>(rng: &mut R, words: usize) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::with_capacity(words.saturating_mul(9).saturating_add(4)));
    for i in 0..words {
        if i > 0 {
            out.push('-');
        }
        let word = WORDLIST[rng.gen_range(0..WORDLIST.len())];
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    let suffix: u16 = rng.gen_range(10..=9999);
    out.push_str(&suffix.to_string());
    out
}

fn acceptable(candidate: &str, kind: SecretKind) -> bool {
    strength::character_classes(candidate) >= MIN_CLASSES
        && strength::validate_for(candidate, kind).is_ok()
}

/// Generate a random password of `length` characters.
///
/// Regenerates until the candidate covers at least three character classes and
/// passes validation for `kind`, up to `options.max_attempts` times.
pub fn generate_password(
    kind: SecretKind,
    length: usize,
    options: &GeneratorOptions,
) -> Result<Zeroizing<String>> {
    let set = charset(options.include_special, options.exclude_ambiguous);
    for attempt in 1..=options.max_attempts {
        let candidate = sample_password(&mut OsRng, &set, length);
        if acceptable(&candidate, kind) {
            return Ok(candidate);
        }
        tracing::debug!(%kind, attempt, "Generated candidate rejected, retrying");
    }
    Err(CredentialError::GenerationExhausted {
        kind,
        attempts: options.max_attempts,
    })
}

/// Generate a `words`-word passphrase such as `Harbor-Quill-Maple-Otter-Dune-Lotus42`
pub fn generate_passphrase(words: usize, options: &GeneratorOptions) -> Result<Zeroizing<String>> {
    let kind = SecretKind::DiskEncryption;
    for attempt in 1..=options.max_attempts {
        let candidate = sample_passphrase(&mut OsRng, words);
        if acceptable(&candidate, kind) {
            return Ok(candidate);
        }
        tracing::debug!(%kind, attempt, "Generated passphrase rejected, retrying");
    }
    Err(CredentialError::GenerationExhausted {
        kind,
        attempts: options.max_attempts,
    })
}

/// Backend that invents secrets with no operator input
#[derive(Debug, Default)]
pub struct GeneratorBackend {
    options: GeneratorOptions,
}

impl GeneratorBackend {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    /// Generate one secret for `kind` using the configured shape
    pub fn generate(&self, kind: SecretKind) -> Result<Secret> {
        let value = match kind {
            SecretKind::User => generate_password(kind, self.options.user_length, &self.options)?,
            SecretKind::Root => generate_password(kind, self.options.root_length, &self.options)?,
            SecretKind::DiskEncryption => {
                generate_passphrase(self.options.passphrase_words, &self.options)?
            }
        };
        Secret::new(kind, value, SecretSource::Generated)
    }
}

impl Backend for GeneratorBackend {
    fn name(&self) -> &'static str {
        "generator"
    }

    fn source(&self) -> SecretSource {
        SecretSource::Generated
    }

    fn try_resolve(&mut self, wanted: &[SecretKind]) -> Result<Vec<Secret>> {
        let secrets = wanted
            .iter()
            .map(|&kind| self.generate(kind))
            .collect::<Result<Vec<_>>>()?;
        if !secrets.is_empty() {
            tracing::warn!(
                count = secrets.len(),
                "Generated secrets exist only in memory; save them to a container to keep them"
            );
        }
        Ok(secrets)
    }
}
