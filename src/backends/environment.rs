//! Environment-variable backend.
//!
//! Each kind is looked up under its canonical `DEPLOY_*` name first, then under
//! its legacy aliases. Values that fail validation are dropped with a warning
//! naming the variable, never the value.

use std::collections::HashMap;

use zeroize::Zeroizing;

use super::Backend;
use crate::error::Result;
use crate::secret::Secret;
use crate::types::{SecretKind, SecretSource};

/// Variables that identify a CI platform, most specific first
const CI_INDICATORS: &[(&str, &str)] = &[
    ("GITHUB_ACTIONS", "GitHub Actions"),
    ("GITLAB_CI", "GitLab CI"),
    ("JENKINS_URL", "Jenkins"),
    ("BUILDKITE", "Buildkite"),
    ("CIRCLECI", "CircleCI"),
    ("TRAVIS", "Travis CI"),
    ("TF_BUILD", "Azure Pipelines"),
    ("CI", "generic CI"),
];

/// Read-only view of environment variables
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<Zeroizing<String>>;
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<Zeroizing<String>> {
        std::env::var(key).ok().map(Zeroizing::new)
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<Zeroizing<String>> {
        HashMap::get(self, key).cloned().map(Zeroizing::new)
    }
}

/// Name of the CI platform the process appears to run under, if any.
///
/// Diagnostic only; resolution never branches on it.
pub fn detect_ci(env: &dyn EnvSource) -> Option<&'static str> {
    CI_INDICATORS
        .iter()
        .find(|(var, _)| env.get(var).is_some_and(|v| !v.is_empty()))
        .map(|(_, name)| *name)
}

/// Find the value for `kind`, returning the variable it came from.
///
/// Empty values count as unset.
pub fn lookup(env: &dyn EnvSource, kind: SecretKind) -> Option<(&'static str, Zeroizing<String>)> {
    std::iter::once(kind.env_var())
        .chain(kind.legacy_env_vars().iter().copied())
        .find_map(|var| env.get(var).filter(|v| !v.is_empty()).map(|v| (var, v)))
}

/// Backend reading secrets from environment variables
#[derive(Debug, Default)]
pub struct EnvironmentBackend<E = ProcessEnv> {
    env: E,
}

impl EnvironmentBackend<ProcessEnv> {
    pub fn new() -> Self {
        Self { env: ProcessEnv }
    }
}

impl<E: EnvSource> EnvironmentBackend<E> {
    pub fn with_source(env: E) -> Self {
        Self { env }
    }
}

impl<E: EnvSource> Backend for EnvironmentBackend<E> {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn source(&self) -> SecretSource {
        SecretSource::Environment
    }

    fn try_resolve(&mut self, wanted: &[SecretKind]) -> Result<Vec<Secret>> {
        if let Some(platform) = detect_ci(&self.env) {
            tracing::info!(platform, "CI environment detected");
        }

        let mut secrets = Vec::new();
        for &kind in wanted {
            let Some((var, value)) = lookup(&self.env, kind) else {
                continue;
            };
            if var != kind.env_var() {
                tracing::debug!(%kind, alias = var, canonical = kind.env_var(), "Using legacy variable");
            }
            match Secret::new(kind, value, SecretSource::Environment) {
                Ok(secret) => secrets.push(secret),
                Err(e) => tracing::warn!(variable = var, "Discarding {}: {}", var, e),
            }
        }
        Ok(secrets)
    }
}
