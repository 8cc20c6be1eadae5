//! Resolver configuration: JSON file, environment overlay, then CLI flags.
//!
//! Values that have a fixed vocabulary use the enums in [`crate::types`], so a
//! typo in the file fails at parse time instead of silently falling back.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::backends::{EnvSource, GeneratorOptions};
use crate::container::{DEFAULT_ITERATIONS, MAX_ITERATIONS, MIN_ITERATIONS};
use crate::strength::{MAX_SCORE, WEAK_SCORE_THRESHOLD};
use crate::types::Toggle;

/// Feature flag: the run needs a disk-encryption passphrase
pub const ENCRYPTION_ENV: &str = "DEPLOY_ENCRYPTION";
/// Default container path
pub const CONTAINER_ENV: &str = "DEPLOY_CONTAINER";
/// Directory for keyfiles and other scratch files
pub const SCRATCH_DIR_ENV: &str = "DEPLOY_SCRATCH_DIR";

/// Settings that shape a resolution run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Whether disk encryption is enabled, making its passphrase required
    pub encryption: Toggle,
    /// Encrypted container consulted by the file backend
    pub container: Option<PathBuf>,
    /// PBKDF2 iterations for newly sealed containers
    pub kdf_iterations: u32,
    pub generator: GeneratorOptions,
    /// Minimum strength score accepted at the interactive prompt
    pub interactive_min_score: u8,
    /// Where scratch files are created; the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            encryption: Toggle::No,
            container: None,
            kdf_iterations: DEFAULT_ITERATIONS,
            generator: GeneratorOptions::default(),
            interactive_min_score: WEAK_SCORE_THRESHOLD,
            scratch_dir: None,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;
        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;
        Ok(config)
    }

    /// Overlay `DEPLOY_ENCRYPTION`, `DEPLOY_CONTAINER` and `DEPLOY_SCRATCH_DIR`
    pub fn apply_env_overrides(&mut self, env: &dyn EnvSource) -> Result<()> {
        if let Some(value) = env.get(ENCRYPTION_ENV).filter(|v| !v.trim().is_empty()) {
            self.encryption = Toggle::from_str(value.trim())
                .with_context(|| format!("{} must be yes or no, got {:?}", ENCRYPTION_ENV, value.trim()))?;
        }
        if let Some(value) = env.get(CONTAINER_ENV).filter(|v| !v.trim().is_empty()) {
            self.container = Some(PathBuf::from(value.trim()));
        }
        if let Some(value) = env.get(SCRATCH_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.scratch_dir = Some(PathBuf::from(value.trim()));
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.kdf_iterations) {
            anyhow::bail!(
                "KDF iterations must be between {} and {}",
                MIN_ITERATIONS,
                MAX_ITERATIONS
            );
        }

        let generator = &self.generator;
        if generator.user_length < 8 || generator.root_length < 8 {
            anyhow::bail!("Generated password lengths must be at least 8");
        }
        if generator.user_length > 256 || generator.root_length > 256 {
            anyhow::bail!("Generated password lengths cannot exceed 256");
        }
        if !(3..=16).contains(&generator.passphrase_words) {
            anyhow::bail!("Passphrase word count must be between 3 and 16");
        }
        if generator.max_attempts == 0 {
            anyhow::bail!("Generator attempts must be at least 1");
        }

        if self.interactive_min_score > MAX_SCORE {
            anyhow::bail!("Interactive minimum score cannot exceed {}", MAX_SCORE);
        }

        if let Some(dir) = &self.scratch_dir {
            if !dir.is_dir() {
                anyhow::bail!("Scratch directory {:?} does not exist", dir);
            }
        }
        Ok(())
    }

    pub fn require_disk_encryption(&self) -> bool {
        self.encryption.as_bool()
    }

    /// Scratch directory, falling back to the system temp dir
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_validate() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.require_disk_encryption());
        assert_eq!(config.kdf_iterations, 100_000);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resolver.json");
        let mut config = ResolverConfig::new();
        config.encryption = Toggle::Yes;
        config.container = Some(PathBuf::from("/srv/credentials.enc"));
        config.generator.passphrase_words = 8;
        config.save_to_file(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"encryption\": \"yes\""));
        assert_eq!(ResolverConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "kdf_iterations": 50000, "generator": { "user_length": 24 } }"#)
            .unwrap();
        let config = ResolverConfig::load_from_file(&path).unwrap();
        assert_eq!(config.kdf_iterations, 50_000);
        assert_eq!(config.generator.user_length, 24);
        assert_eq!(config.generator.root_length, 20);
        assert_eq!(config.encryption, Toggle::No);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ResolverConfig::default();
        config
            .apply_env_overrides(&env(&[
                ("DEPLOY_ENCRYPTION", "YES"),
                ("DEPLOY_CONTAINER", "/tmp/creds.enc"),
            ]))
            .unwrap();
        assert!(config.require_disk_encryption());
        assert_eq!(config.container, Some(PathBuf::from("/tmp/creds.enc")));

        let err = config
            .apply_env_overrides(&env(&[("DEPLOY_ENCRYPTION", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("DEPLOY_ENCRYPTION"));
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let mut config = ResolverConfig::default();
        config.kdf_iterations = 10;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.generator.passphrase_words = 2;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.interactive_min_score = 7;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.generator.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
