//! Error handling module for credential resolution
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Messages name the affected secret kind and backend only. A secret value must
//! never be formatted into any of these variants.

use thiserror::Error;

use crate::types::SecretKind;

/// Main error type for credential resolution
#[derive(Error, Debug)]
pub enum CredentialError {
    /// A candidate secret is too short, on the deny-list, or holds control characters
    #[error("Validation error for {kind} secret: {reason}")]
    Validation { kind: SecretKind, reason: String },

    /// A backend cannot run at all (no file path, no terminal, no passphrase)
    #[error("Backend '{backend}' unavailable: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// Wrong passphrase or corrupt container. The two are deliberately
    /// reported the same way.
    #[error("Unable to decrypt credential container (wrong passphrase or corrupt file)")]
    DecryptionFailure,

    /// The file is not a credential container, or uses an unsupported
    /// version or cipher
    #[error("Invalid credential container: {0}")]
    InvalidContainer(String),

    /// Resolution finished without every required kind
    #[error("Incomplete credential set: missing {}", join_kinds(.missing))]
    IncompleteCredentialSet { missing: Vec<SecretKind> },

    /// The generator could not produce a compliant candidate
    #[error("Could not generate a compliant {kind} secret after {attempts} attempts")]
    GenerationExhausted { kind: SecretKind, attempts: u32 },

    /// The operator aborted an interactive prompt
    #[error("Operator aborted while entering the {kind} secret")]
    Aborted { kind: SecretKind },

    /// IO errors (file operations, terminal, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;

fn join_kinds(kinds: &[SecretKind]) -> String {
    kinds
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// Convenient error constructors
impl CredentialError {
    /// Create a validation error
    pub fn validation(kind: SecretKind, reason: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a backend-unavailable error
    pub fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    /// Create an invalid-container error
    pub fn invalid_container(msg: impl Into<String>) -> Self {
        Self::InvalidContainer(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors that end resolution no matter which mode is active.
    ///
    /// Everything else is treated as "this backend contributed nothing"
    /// while falling back in auto mode.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IncompleteCredentialSet { .. }
                | Self::GenerationExhausted { .. }
                | Self::Aborted { .. }
        )
    }
}
