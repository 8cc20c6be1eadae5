//! Hand-off of resolved secrets to downstream provisioning.
//!
//! Up to this point values are typed [`Secret`](crate::secret::Secret)s. Export
//! writes them under their canonical variable names, either into a spawned
//! collaborator's environment only, or into this process's environment where
//! every variable is tracked and unset at cleanup.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use crate::error::Result;
use crate::lifecycle::LifecycleGuard;
use crate::secret::{CredentialSet, CredentialStore};
use crate::shred::ScratchFile;
use crate::types::SecretKind;

/// Variable pointing collaborators at the disk-encryption keyfile
pub const KEYFILE_ENV: &str = "DEPLOY_LUKS_KEYFILE";

/// Canonical `(variable, value)` pairs for every secret in `set`
pub fn env_pairs(set: &CredentialSet) -> Vec<(&'static str, &str)> {
    set.iter()
        .map(|secret| (secret.kind().env_var(), secret.expose()))
        .collect()
}

/// Export into this process's environment; returns the variable names set.
///
/// Every variable is registered with `guard` before this returns, so cleanup
/// unsets it on any exit path.
///
/// Library API for embedding callers that provision in-process; the binary
/// only hands secrets to collaborators through [`apply_to_command`].
pub fn export_to_process_env(store: &CredentialStore, guard: &LifecycleGuard) -> Vec<&'static str> {
    // Copy out first: the cleanup registry lock must never be taken while the
    // store lock is held
    let set = store.snapshot();
    let mut exported = Vec::with_capacity(set.len());
    for (name, value) in env_pairs(&set) {
        guard.track_env_var(name);
        // SAFETY: resolution is single-threaded and finished; the signal thread
        // only touches the environment during cleanup, which ends the process.
        unsafe { std::env::set_var(name, value) };
        exported.push(name);
    }
    tracing::info!(variables = %exported.join(", "), "Exported credentials to process environment");
    exported
}

/// Add the secrets to `command`'s environment only
pub fn apply_to_command(set: &CredentialSet, command: &mut Command) {
    for (name, value) in env_pairs(set) {
        command.env(name, value);
    }
    tracing::debug!(count = set.len(), "Credentials added to collaborator environment");
}

/// Write the disk-encryption secret to a 0600 keyfile in `dir`.
///
/// The file holds the raw passphrase with no trailing newline, as
/// `cryptsetup --key-file` expects. Returns `None` when the store has no
/// disk-encryption secret. The keyfile is shredded when the returned handle
/// drops, or by cleanup on interrupt.
pub fn write_keyfile(store: &CredentialStore, dir: &Path) -> Result<Option<ScratchFile>> {
    if !store.with_set(|set| set.contains(SecretKind::DiskEncryption)) {
        return Ok(None);
    }
    // Registered for cleanup before the store lock is taken to fill it
    let (keyfile, mut file) = ScratchFile::create_in(dir, ".luks-key-")?;
    store.with_set(|set| -> std::io::Result<()> {
        if let Some(secret) = set.get(SecretKind::DiskEncryption) {
            file.write_all(secret.expose().as_bytes())?;
        }
        file.sync_all()
    })?;
    tracing::info!(path = ?keyfile.path(), "Disk encryption keyfile written");
    Ok(Some(keyfile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::CleanupRegistry;
    use crate::secret::Secret;
    use crate::types::SecretSource;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use zeroize::Zeroizing;

    fn set_with(values: &[(SecretKind, &str)]) -> CredentialSet {
        let mut set = CredentialSet::new();
        set.merge(
            values
                .iter()
                .map(|(k, v)| {
                    Secret::new(*k, Zeroizing::new(v.to_string()), SecretSource::Generated).unwrap()
                })
                .collect(),
        );
        set
    }

    #[test]
    fn test_command_gets_canonical_names() {
        let set = set_with(&[
            (SecretKind::User, "Us3r!password"),
            (SecretKind::Root, "R00tP@ss2024!"),
        ]);
        let mut command = Command::new("true");
        apply_to_command(&set, &mut command);

        let envs: Vec<_> = command
            .get_envs()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.map(|v| v.to_string_lossy().into_owned())))
            .collect();
        assert!(envs.contains(&("DEPLOY_ROOT_PASSWORD".to_string(), Some("R00tP@ss2024!".to_string()))));
        assert!(envs.iter().any(|(k, _)| k == "DEPLOY_USER_PASSWORD"));
        assert!(!envs.iter().any(|(k, _)| k == "DEPLOY_LUKS_PASSPHRASE"));
    }

    #[test]
    fn test_process_export_is_tracked_and_unset() {
        let store = CredentialStore::new();
        store.merge(set_with(&[(SecretKind::Root, "Exp0rt!Root99")]).iter().cloned().collect());

        let registry = Arc::new(Mutex::new(CleanupRegistry::default()));
        let guard = LifecycleGuard::with_registry(Arc::clone(&registry));
        let exported = export_to_process_env(&store, &guard);

        assert_eq!(exported, vec!["DEPLOY_ROOT_PASSWORD"]);
        assert_eq!(std::env::var("DEPLOY_ROOT_PASSWORD").unwrap(), "Exp0rt!Root99");
        assert_eq!(registry.lock().unwrap().env_var_count(), 1);

        drop(guard);
        assert!(std::env::var("DEPLOY_ROOT_PASSWORD").is_err());
    }

    #[test]
    fn test_keyfile_is_owner_only_and_shredded_on_drop() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new();
        store.merge(set_with(&[(SecretKind::DiskEncryption, "Harbor-Quill-Maple-Otter42")]).iter().cloned().collect());

        let keyfile = write_keyfile(&store, dir.path()).unwrap().unwrap();
        let path = keyfile.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Harbor-Quill-Maple-Otter42");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        drop(keyfile);
        assert!(!path.exists());
    }

    #[test]
    fn test_no_keyfile_without_disk_secret() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new();
        store.merge(set_with(&[(SecretKind::Root, "R00tP@ss2024!")]).iter().cloned().collect());
        assert!(write_keyfile(&store, dir.path()).unwrap().is_none());
    }
}
