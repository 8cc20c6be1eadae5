//! Credential backends.
//!
//! Each backend is one strategy for obtaining secrets from a single source.
//! The resolver drives them in priority order:
//! - `environment` for canonical and legacy environment variables
//! - `file` for an encrypted credential container
//! - `generator` for CSPRNG-generated passwords and word passphrases
//! - `interactive` for masked, confirmed operator entry

pub mod environment;
pub mod file;
pub mod generator;
pub mod interactive;
mod wordlist;

use crate::error::Result;
use crate::secret::Secret;
use crate::types::{SecretKind, SecretSource};

pub use environment::{EnvSource, EnvironmentBackend, ProcessEnv};
pub use file::FileBackend;
pub use generator::{GeneratorBackend, GeneratorOptions};
pub use interactive::InteractiveBackend;

/// A strategy for obtaining credential values from one source.
///
/// # Contract
///
/// - `try_resolve` is only asked for kinds the credential set still lacks, but
///   may return others; the resolver keeps whichever provider came first.
/// - Every returned `Secret` has passed strength validation (guaranteed by
///   `Secret::new`).
/// - An `Err` means "contributed nothing". Whether that ends the run is the
///   resolver's decision, except for errors that are always fatal.
pub trait Backend {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// The source recorded on every secret this backend yields
    fn source(&self) -> SecretSource;

    /// Produce whatever subset of `wanted` this backend can supply
    fn try_resolve(&mut self, wanted: &[SecretKind]) -> Result<Vec<Secret>>;
}
