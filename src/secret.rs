//! Secret values and the per-run credential store.
//!
//! Secret values live in [`Zeroizing`] buffers so they are overwritten before
//! their memory is released, on every drop path. `Debug` output is redacted.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use zeroize::{Zeroize, Zeroizing};

use crate::error::Result;
use crate::strength;
use crate::types::{SecretKind, SecretSource};

/// A single validated deployment secret
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    kind: SecretKind,
    value: Zeroizing<String>,
    score: u8,
    source: SecretSource,
}

impl Secret {
    /// Validate `value` for `kind` and wrap it.
    ///
    /// Every backend constructs secrets through here, so a `Secret` always
    /// satisfies the kind's minimum length and deny-list rules.
    pub fn new(kind: SecretKind, value: Zeroizing<String>, source: SecretSource) -> Result<Self> {
        strength::validate_for(&value, kind)?;
        let score = strength::score(&value);
        if score < strength::WEAK_SCORE_THRESHOLD {
            tracing::warn!(%kind, %source, score, "Accepted secret has a weak strength score");
        }
        Ok(Self {
            kind,
            value,
            score,
            source,
        })
    }

    pub fn kind(&self) -> SecretKind {
        self.kind
    }

    pub fn source(&self) -> SecretSource {
        self.source
    }

    /// Strength score from 0 to 6
    pub fn score(&self) -> u8 {
        self.score
    }

    /// Borrow the plaintext value.
    ///
    /// Callers must not log or persist what they get back.
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Overwrite the value in place
    pub fn wipe(&mut self) {
        self.value.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("kind", &self.kind)
            .field("value", &"[REDACTED]")
            .field("score", &self.score)
            .field("source", &self.source)
            .finish()
    }
}

/// Non-sensitive description of a resolved secret, for reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretSummary {
    pub kind: SecretKind,
    pub source: SecretSource,
    pub score: u8,
    pub length: usize,
}

impl From<&Secret> for SecretSummary {
    fn from(secret: &Secret) -> Self {
        Self {
            kind: secret.kind,
            source: secret.source,
            score: secret.score,
            length: secret.value.chars().count(),
        }
    }
}

/// Kinds a complete set must contain
pub fn required_kinds(require_disk_encryption: bool) -> Vec<SecretKind> {
    let mut kinds = vec![SecretKind::User, SecretKind::Root];
    if require_disk_encryption {
        kinds.push(SecretKind::DiskEncryption);
    }
    kinds
}

/// At most one secret per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    secrets: BTreeMap<SecretKind, Secret>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the kind is already filled. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, secret: Secret) -> bool {
        if self.secrets.contains_key(&secret.kind) {
            return false;
        }
        self.secrets.insert(secret.kind, secret);
        true
    }

    /// Merge with "first provider wins": kinds already present are never
    /// replaced. Returns the kinds this call filled.
    pub fn merge(&mut self, secrets: Vec<Secret>) -> Vec<SecretKind> {
        let mut filled = Vec::new();
        for secret in secrets {
            let kind = secret.kind;
            if self.insert_if_absent(secret) {
                filled.push(kind);
            }
        }
        filled
    }

    pub fn get(&self, kind: SecretKind) -> Option<&Secret> {
        self.secrets.get(&kind)
    }

    pub fn contains(&self, kind: SecretKind) -> bool {
        self.secrets.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<SecretKind> {
        self.secrets.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Secret> {
        self.secrets.values()
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Required kinds not yet present
    pub fn missing(&self, require_disk_encryption: bool) -> Vec<SecretKind> {
        required_kinds(require_disk_encryption)
            .into_iter()
            .filter(|k| !self.contains(*k))
            .collect()
    }

    /// User and Root present, plus DiskEncryption when encryption is enabled
    pub fn is_complete(&self, require_disk_encryption: bool) -> bool {
        self.missing(require_disk_encryption).is_empty()
    }

    pub fn summaries(&self) -> Vec<SecretSummary> {
        self.secrets.values().map(SecretSummary::from).collect()
    }

    /// Overwrite every value, then drop them all
    pub fn wipe(&mut self) {
        for secret in self.secrets.values_mut() {
            secret.wipe();
        }
        self.secrets.clear();
    }
}

/// Process-local holder of the resolved secrets for one run.
///
/// Cloning yields another handle to the same set. The orchestrator is the only
/// writer; the lifecycle manager keeps a handle so interrupt cleanup can wipe it.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<Mutex<CredentialSet>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CredentialSet> {
        // A poisoned store must still be wipeable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge secrets with first-provider-wins semantics
    pub fn merge(&self, secrets: Vec<Secret>) -> Vec<SecretKind> {
        self.lock().merge(secrets)
    }

    /// Run `f` against the current set
    pub fn with_set<R>(&self, f: impl FnOnce(&CredentialSet) -> R) -> R {
        f(&self.lock())
    }

    /// Copy of the current set
    pub fn snapshot(&self) -> CredentialSet {
        self.lock().clone()
    }

    pub fn missing(&self, require_disk_encryption: bool) -> Vec<SecretKind> {
        self.lock().missing(require_disk_encryption)
    }

    pub fn is_complete(&self, require_disk_encryption: bool) -> bool {
        self.lock().is_complete(require_disk_encryption)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Zero and drop every stored secret
    pub fn wipe(&self) {
        let mut set = self.lock();
        let count = set.len();
        set.wipe();
        tracing::debug!(count, "Credential store wiped");
    }
}
