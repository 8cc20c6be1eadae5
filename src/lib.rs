//! deploy-credentials library
//!
//! Resolves the secrets an unattended deployment needs (user password, root
//! password, disk encryption passphrase) from environment variables, an
//! encrypted container, a CSPRNG generator or the operator, and guarantees
//! they are erased from memory, disk and environment when the process ends.

pub mod backends;
pub mod cli;
pub mod config;
pub mod container;
pub mod error;
pub mod export;
pub mod lifecycle;
pub mod prompt;
pub mod resolver;
pub mod secret;
pub mod shred;
pub mod strength;
pub mod types;

// Re-export main types for convenience
pub use backends::{
    Backend, EnvSource, EnvironmentBackend, FileBackend, GeneratorBackend, GeneratorOptions,
    InteractiveBackend, ProcessEnv,
};
pub use config::ResolverConfig;
pub use container::{EncryptedContainer, FormatVersion, open_credentials, seal_credentials};
pub use error::{CredentialError, Result};
pub use lifecycle::{CleanupRegistry, CleanupSummary, CommandDeathPact, LifecycleGuard};
pub use prompt::{SecretPrompt, TerminalPrompt};
pub use resolver::{ResolutionAttempt, ResolutionReport, Resolver};
pub use secret::{CredentialSet, CredentialStore, Secret, SecretSummary};
pub use shred::ScratchFile;
pub use types::{AttemptOutcome, ResolutionMode, SecretKind, SecretSource, Toggle};
