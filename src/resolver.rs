//! Resolution orchestrator.
//!
//! Drives the backend chain in priority order and merges what each backend
//! supplies into the credential store. A kind is filled by the first backend
//! that provides it and is never overwritten afterwards.

use serde::Serialize;

use crate::backends::{
    Backend, EnvironmentBackend, FileBackend, GeneratorBackend, InteractiveBackend,
};
use crate::config::ResolverConfig;
use crate::error::{CredentialError, Result};
use crate::secret::{CredentialStore, SecretSummary};
use crate::types::{AttemptOutcome, ResolutionMode, SecretKind};

/// One backend's turn in a resolution run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionAttempt {
    pub backend: &'static str,
    pub outcome: AttemptOutcome,
    /// Why the backend failed or was skipped
    pub reason: Option<String>,
    /// Kinds this backend added to the store
    pub supplied: Vec<SecretKind>,
}

/// Diagnostic record of a completed run. Holds no secret values.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub mode: ResolutionMode,
    pub require_disk_encryption: bool,
    pub attempts: Vec<ResolutionAttempt>,
    pub secrets: Vec<SecretSummary>,
}

impl ResolutionReport {
    /// The attempt record for `backend`, if it was part of the run
    pub fn attempt(&self, backend: &str) -> Option<&ResolutionAttempt> {
        self.attempts.iter().find(|a| a.backend == backend)
    }
}

/// Ordered fallback chain of backends
pub struct Resolver {
    backends: Vec<Box<dyn Backend>>,
    require_disk_encryption: bool,
}

impl Resolver {
    pub fn new(backends: Vec<Box<dyn Backend>>, require_disk_encryption: bool) -> Self {
        Self {
            backends,
            require_disk_encryption,
        }
    }

    /// The standard chain: environment, file, generator, interactive
    pub fn from_config(config: &ResolverConfig) -> Self {
        let backends: Vec<Box<dyn Backend>> = vec![
            Box::new(EnvironmentBackend::new()),
            Box::new(FileBackend::new(config.container.clone())),
            Box::new(GeneratorBackend::new(config.generator.clone())),
            Box::new(InteractiveBackend::new(config.interactive_min_score)),
        ];
        Self::new(backends, config.require_disk_encryption())
    }

    pub fn require_disk_encryption(&self) -> bool {
        self.require_disk_encryption
    }

    /// Fill `store` according to `mode`.
    ///
    /// Auto mode tolerates backend failures and moves on; an explicit mode runs
    /// only its own backend and returns its failure as is. Either way the run
    /// fails with `IncompleteCredentialSet` if a required kind is still missing.
    pub fn resolve(
        &mut self,
        mode: ResolutionMode,
        store: &CredentialStore,
    ) -> Result<ResolutionReport> {
        let pinned = mode.pinned_source();
        let flag = self.require_disk_encryption;
        let mut attempts = Vec::new();

        let chain: Vec<&mut Box<dyn Backend>> = self
            .backends
            .iter_mut()
            .filter(|b| pinned.is_none_or(|source| b.source() == source))
            .collect();
        if chain.is_empty() {
            return Err(CredentialError::config(format!(
                "no backend configured for mode {}",
                mode
            )));
        }

        tracing::info!(%mode, backends = chain.len(), require_disk_encryption = flag, "Resolving credentials");

        for backend in chain {
            let name = backend.name();
            let missing = store.missing(flag);
            if missing.is_empty() {
                tracing::debug!(backend = name, "Credential set complete, skipping backend");
                attempts.push(ResolutionAttempt {
                    backend: name,
                    outcome: AttemptOutcome::Skipped,
                    reason: Some("credential set already complete".to_string()),
                    supplied: Vec::new(),
                });
                continue;
            }

            match backend.try_resolve(&missing) {
                Ok(secrets) => {
                    let supplied = store.merge(secrets);
                    tracing::info!(
                        backend = name,
                        supplied = %join(&supplied),
                        "Backend attempt finished"
                    );
                    let (outcome, reason) = if supplied.is_empty() {
                        (AttemptOutcome::Failure, Some("supplied none of the missing kinds".to_string()))
                    } else {
                        (AttemptOutcome::Success, None)
                    };
                    attempts.push(ResolutionAttempt {
                        backend: name,
                        outcome,
                        reason,
                        supplied,
                    });
                }
                Err(e) if e.is_fatal() || pinned.is_some() => {
                    tracing::error!(backend = name, "Backend attempt failed: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(backend = name, supplied = "none", "Backend attempt failed: {}", e);
                    attempts.push(ResolutionAttempt {
                        backend: name,
                        outcome: AttemptOutcome::Failure,
                        reason: Some(e.to_string()),
                        supplied: Vec::new(),
                    });
                }
            }
        }

        let missing = store.missing(flag);
        if !missing.is_empty() {
            return Err(CredentialError::IncompleteCredentialSet { missing });
        }

        let secrets = store.with_set(|set| set.summaries());
        tracing::info!(count = secrets.len(), "Credential set complete");
        Ok(ResolutionReport {
            mode,
            require_disk_encryption: flag,
            attempts,
            secrets,
        })
    }
}

fn join(kinds: &[SecretKind]) -> String {
    if kinds.is_empty() {
        return "none".to_string();
    }
    kinds
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::Secret;
    use crate::types::SecretSource;
    use std::cell::RefCell;
    use std::rc::Rc;
    use zeroize::Zeroizing;

    type Calls = Rc<RefCell<Vec<Vec<SecretKind>>>>;

    /// Supplies fixed values, or fails with the given error
    struct Canned {
        name: &'static str,
        source: SecretSource,
        values: Vec<(SecretKind, &'static str)>,
        error: Option<fn() -> CredentialError>,
        calls: Calls,
    }

    impl Canned {
        fn new(name: &'static str, source: SecretSource, values: &[(SecretKind, &'static str)]) -> Self {
            Self {
                name,
                source,
                values: values.to_vec(),
                error: None,
                calls: Calls::default(),
            }
        }

        fn failing(name: &'static str, source: SecretSource, error: fn() -> CredentialError) -> Self {
            Self {
                error: Some(error),
                ..Self::new(name, source, &[])
            }
        }
    }

    impl Backend for Canned {
        fn name(&self) -> &'static str {
            self.name
        }
        fn source(&self) -> SecretSource {
            self.source
        }
        fn try_resolve(&mut self, wanted: &[SecretKind]) -> Result<Vec<Secret>> {
            self.calls.borrow_mut().push(wanted.to_vec());
            if let Some(error) = self.error {
                return Err(error());
            }
            Ok(self
                .values
                .iter()
                .map(|(kind, v)| {
                    Secret::new(*kind, Zeroizing::new(v.to_string()), self.source).unwrap()
                })
                .collect())
        }
    }

    fn unavailable() -> CredentialError {
        CredentialError::unavailable("file", "no container path configured")
    }

    #[test]
    fn test_first_provider_wins_per_kind() {
        let env = Canned::new("environment", SecretSource::Environment, &[(SecretKind::Root, "EnvR00t!pw")]);
        let file = Canned::new(
            "file",
            SecretSource::File,
            &[(SecretKind::User, "F1leUser!pw"), (SecretKind::Root, "F1leR00t!pw")],
        );
        let mut resolver = Resolver::new(vec![Box::new(env), Box::new(file)], false);
        let store = CredentialStore::new();
        let report = resolver.resolve(ResolutionMode::Auto, &store).unwrap();

        store.with_set(|set| {
            assert_eq!(set.get(SecretKind::Root).unwrap().expose(), "EnvR00t!pw");
            assert_eq!(set.get(SecretKind::User).unwrap().source(), SecretSource::File);
        });
        assert_eq!(report.attempt("file").unwrap().supplied, vec![SecretKind::User]);
    }

    #[test]
    fn test_backends_only_asked_for_missing_kinds_and_stop_when_complete() {
        let env = Canned::new("environment", SecretSource::Environment, &[(SecretKind::Root, "EnvR00t!pw")]);
        let generator = Canned::new("generator", SecretSource::Generated, &[(SecretKind::User, "GenUs3r!pw")]);
        let interactive = Canned::new("interactive", SecretSource::Interactive, &[]);
        let gen_calls = Rc::clone(&generator.calls);
        let prompt_calls = Rc::clone(&interactive.calls);

        let mut resolver = Resolver::new(
            vec![Box::new(env), Box::new(generator), Box::new(interactive)],
            false,
        );
        let report = resolver
            .resolve(ResolutionMode::Auto, &CredentialStore::new())
            .unwrap();

        assert_eq!(*gen_calls.borrow(), vec![vec![SecretKind::User]]);
        assert!(prompt_calls.borrow().is_empty());
        assert_eq!(report.attempt("interactive").unwrap().outcome, AttemptOutcome::Skipped);
    }

    #[test]
    fn test_auto_mode_survives_backend_failure() {
        let file = Canned::failing("file", SecretSource::File, unavailable);
        let generator = Canned::new(
            "generator",
            SecretSource::Generated,
            &[(SecretKind::User, "GenUs3r!pw"), (SecretKind::Root, "GenR00t!pw")],
        );
        let mut resolver = Resolver::new(vec![Box::new(file), Box::new(generator)], false);
        let report = resolver
            .resolve(ResolutionMode::Auto, &CredentialStore::new())
            .unwrap();

        let file_attempt = report.attempt("file").unwrap();
        assert_eq!(file_attempt.outcome, AttemptOutcome::Failure);
        assert!(file_attempt.reason.as_deref().unwrap().contains("unavailable"));
    }

    #[test]
    fn test_explicit_mode_propagates_failure_without_fallback() {
        let file = Canned::failing("file", SecretSource::File, unavailable);
        let generator = Canned::new("generator", SecretSource::Generated, &[(SecretKind::User, "GenUs3r!pw")]);
        let gen_calls = Rc::clone(&generator.calls);
        let mut resolver = Resolver::new(vec![Box::new(file), Box::new(generator)], false);

        let err = resolver
            .resolve(ResolutionMode::File, &CredentialStore::new())
            .unwrap_err();
        assert!(matches!(err, CredentialError::BackendUnavailable { .. }));
        assert!(gen_calls.borrow().is_empty());
    }

    #[test]
    fn test_explicit_mode_reports_incomplete_set() {
        let env = Canned::new("environment", SecretSource::Environment, &[(SecretKind::Root, "EnvR00t!pw")]);
        let mut resolver = Resolver::new(vec![Box::new(env)], false);
        let err = resolver
            .resolve(ResolutionMode::Environment, &CredentialStore::new())
            .unwrap_err();
        match err {
            CredentialError::IncompleteCredentialSet { missing } => {
                assert_eq!(missing, vec![SecretKind::User]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fatal_errors_end_auto_mode() {
        let generator = Canned::failing("generator", SecretSource::Generated, || {
            CredentialError::GenerationExhausted {
                kind: SecretKind::User,
                attempts: 5,
            }
        });
        let interactive = Canned::new(
            "interactive",
            SecretSource::Interactive,
            &[(SecretKind::User, "Typ3dUser!"), (SecretKind::Root, "Typ3dR00t!")],
        );
        let prompt_calls = Rc::clone(&interactive.calls);
        let mut resolver = Resolver::new(vec![Box::new(generator), Box::new(interactive)], false);

        let err = resolver
            .resolve(ResolutionMode::Auto, &CredentialStore::new())
            .unwrap_err();
        assert!(matches!(err, CredentialError::GenerationExhausted { .. }));
        assert!(prompt_calls.borrow().is_empty());
    }

    #[test]
    fn test_disk_encryption_required_only_when_flagged() {
        let values = [(SecretKind::User, "GenUs3r!pw"), (SecretKind::Root, "GenR00t!pw")];
        let mut plain = Resolver::new(
            vec![Box::new(Canned::new("generator", SecretSource::Generated, &values))],
            false,
        );
        assert!(plain.resolve(ResolutionMode::Auto, &CredentialStore::new()).is_ok());

        let mut encrypted = Resolver::new(
            vec![Box::new(Canned::new("generator", SecretSource::Generated, &values))],
            true,
        );
        let err = encrypted
            .resolve(ResolutionMode::Auto, &CredentialStore::new())
            .unwrap_err();
        assert!(err.to_string().contains("disk-encryption"));
    }

    #[test]
    fn test_mode_without_backend_is_config_error() {
        let mut resolver = Resolver::new(Vec::new(), false);
        assert!(matches!(
            resolver.resolve(ResolutionMode::Interactive, &CredentialStore::new()),
            Err(CredentialError::Config(_))
        ));
    }
}
