//! Encrypted credential container backend.

use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use super::Backend;
use super::environment::{EnvSource, ProcessEnv};
use crate::container::{EncryptedContainer, open_credentials};
use crate::error::{CredentialError, Result};
use crate::prompt::{SecretPrompt, TerminalPrompt};
use crate::secret::Secret;
use crate::types::{SecretKind, SecretSource};

/// Variable holding the container passphrase for unattended runs
pub const PASSPHRASE_ENV: &str = "DEPLOY_CONTAINER_PASSPHRASE";

const NAME: &str = "file";

/// Backend reading secrets from an encrypted container file
pub struct FileBackend {
    path: Option<PathBuf>,
    env: Box<dyn EnvSource>,
    prompt: Option<Box<dyn SecretPrompt>>,
}

impl FileBackend {
    /// Container at `path`, passphrase from the process environment or the terminal
    pub fn new(path: Option<PathBuf>) -> Self {
        Self::with_sources(path, Box::new(ProcessEnv), Some(Box::new(TerminalPrompt::new())))
    }

    pub fn with_sources(
        path: Option<PathBuf>,
        env: Box<dyn EnvSource>,
        prompt: Option<Box<dyn SecretPrompt>>,
    ) -> Self {
        Self { path, env, prompt }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn passphrase(&mut self, path: &Path) -> Result<Zeroizing<String>> {
        if let Some(value) = self.env.get(PASSPHRASE_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!(variable = PASSPHRASE_ENV, "Container passphrase taken from environment");
            return Ok(value);
        }

        match self.prompt.as_mut() {
            Some(prompt) if prompt.is_available() => {
                let label = format!("Passphrase for {}", path.display());
                match prompt.read_secret(&label) {
                    Ok(value) if !value.is_empty() => Ok(value),
                    Ok(_) => Err(CredentialError::unavailable(NAME, "empty container passphrase")),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Err(
                        CredentialError::unavailable(NAME, "container passphrase prompt cancelled"),
                    ),
                    Err(e) => Err(CredentialError::Io(e)),
                }
            }
            _ => Err(CredentialError::unavailable(
                NAME,
                format!("no container passphrase ({} unset and no terminal)", PASSPHRASE_ENV),
            )),
        }
    }
}

impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn source(&self) -> SecretSource {
        SecretSource::File
    }

    fn try_resolve(&mut self, wanted: &[SecretKind]) -> Result<Vec<Secret>> {
        let Some(path) = self.path.clone() else {
            return Err(CredentialError::unavailable(NAME, "no container path configured"));
        };
        if !path.exists() {
            return Err(CredentialError::unavailable(
                NAME,
                format!("container {} does not exist", path.display()),
            ));
        }

        let container = EncryptedContainer::read_from(&path)?;
        tracing::debug!(
            path = ?path,
            version = %container.format_version,
            iterations = container.kdf_iterations,
            "Container parsed"
        );
        let passphrase = self.passphrase(&path)?;
        let entries = open_credentials(&container, &passphrase)?;

        let mut secrets = Vec::new();
        for (kind, value) in entries {
            if !wanted.contains(&kind) {
                continue;
            }
            match Secret::new(kind, value, SecretSource::File) {
                Ok(secret) => secrets.push(secret),
                Err(e) => tracing::warn!(%kind, path = ?path, "Discarding container entry: {}", e),
            }
        }
        Ok(secrets)
    }
}
