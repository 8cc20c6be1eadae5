//! Type-safe vocabulary for credential resolution
//!
//! Secret kinds, sources, resolution modes and toggles as proper Rust enums
//! rather than strings, so the canonical variable names, payload keys and
//! minimum lengths live next to the variant they belong to.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The kinds of deployment secret this crate resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum SecretKind {
    /// Primary (non-root) user account password
    #[strum(to_string = "user")]
    User,
    /// Administrative account password
    #[strum(to_string = "root")]
    Root,
    /// Disk-encryption (LUKS) passphrase
    #[strum(to_string = "disk-encryption", serialize = "luks")]
    DiskEncryption,
}

impl SecretKind {
    /// All kinds in resolution order
    pub const ALL: [SecretKind; 3] = [Self::User, Self::Root, Self::DiskEncryption];

    /// Minimum accepted length in characters
    pub fn min_length(&self) -> usize {
        match self {
            Self::User | Self::Root => 8,
            Self::DiskEncryption => 12,
        }
    }

    /// Canonical environment variable used for lookup and export
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::User => "DEPLOY_USER_PASSWORD",
            Self::Root => "DEPLOY_ROOT_PASSWORD",
            Self::DiskEncryption => "DEPLOY_LUKS_PASSPHRASE",
        }
    }

    /// Legacy variable names consulted when the canonical one is absent
    pub fn legacy_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::User => &["USER_PASSWORD", "MAIN_USER_PASSWORD"],
            Self::Root => &["ROOT_PASSWORD"],
            Self::DiskEncryption => &["LUKS_PASSPHRASE", "ENCRYPTION_PASSWORD"],
        }
    }

    /// Human-facing name used in prompts
    pub fn description(&self) -> &'static str {
        match self {
            Self::User => "user account password",
            Self::Root => "root password",
            Self::DiskEncryption => "disk encryption passphrase",
        }
    }

    /// Key used in the container's plaintext payload
    pub fn payload_key(&self) -> &'static str {
        match self {
            Self::User => "user_password",
            Self::Root => "root_password",
            Self::DiskEncryption => "luks_passphrase",
        }
    }

    /// Reverse lookup of [`payload_key`](Self::payload_key)
    pub fn from_payload_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.payload_key() == key)
    }
}

/// Where a resolved secret came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    Environment,
    File,
    Generated,
    Interactive,
}

/// Which backend(s) a resolution run may consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Try every backend in priority order until the set is complete
    #[default]
    Auto,
    #[strum(to_string = "environment", serialize = "env")]
    Environment,
    File,
    #[strum(to_string = "generate", serialize = "generated")]
    Generate,
    Interactive,
}

impl ResolutionMode {
    /// The single source an explicit mode is pinned to, `None` for auto
    pub fn pinned_source(&self) -> Option<SecretSource> {
        match self {
            Self::Auto => None,
            Self::Environment => Some(SecretSource::Environment),
            Self::File => Some(SecretSource::File),
            Self::Generate => Some(SecretSource::Generated),
            Self::Interactive => Some(SecretSource::Interactive),
        }
    }
}

/// Outcome of a single backend attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failure,
    Skipped,
}

/// Generic yes/no toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    #[strum(to_string = "yes", serialize = "true", serialize = "on", serialize = "1")]
    Yes,
    #[default]
    #[strum(to_string = "no", serialize = "false", serialize = "off", serialize = "0")]
    No,
}

impl Toggle {
    /// Convert to boolean
    pub fn as_bool(&self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl From<bool> for Toggle {
    fn from(value: bool) -> Self {
        if value {
            Self::Yes
        } else {
            Self::No
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_min_lengths() {
        assert_eq!(SecretKind::User.min_length(), 8);
        assert_eq!(SecretKind::Root.min_length(), 8);
        assert_eq!(SecretKind::DiskEncryption.min_length(), 12);
    }

    #[test]
    fn test_payload_key_lookup() {
        for kind in SecretKind::iter() {
            assert_eq!(SecretKind::from_payload_key(kind.payload_key()), Some(kind));
        }
        assert_eq!(SecretKind::from_payload_key("wifi_password"), None);
    }

    #[test]
    fn test_kind_parsing_accepts_alias() {
        assert_eq!(SecretKind::from_str("luks").unwrap(), SecretKind::DiskEncryption);
        assert_eq!(SecretKind::from_str("ROOT").unwrap(), SecretKind::Root);
        assert_eq!(SecretKind::DiskEncryption.to_string(), "disk-encryption");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(ResolutionMode::from_str("env").unwrap(), ResolutionMode::Environment);
        assert_eq!(ResolutionMode::from_str("Auto").unwrap(), ResolutionMode::Auto);
        assert_eq!(ResolutionMode::Generate.to_string(), "generate");
        assert!(ResolutionMode::from_str("keychain").is_err());
    }

    #[test]
    fn test_pinned_source() {
        assert_eq!(ResolutionMode::Auto.pinned_source(), None);
        assert_eq!(
            ResolutionMode::Generate.pinned_source(),
            Some(SecretSource::Generated)
        );
    }

    #[test]
    fn test_toggle_conversion() {
        assert!(Toggle::Yes.as_bool());
        assert!(!Toggle::No.as_bool());
        assert_eq!(Toggle::from(true), Toggle::Yes);
        assert_eq!(Toggle::from_str("TRUE").unwrap(), Toggle::Yes);
        assert_eq!(Toggle::from_str("0").unwrap(), Toggle::No);
        assert_eq!(Toggle::default(), Toggle::No);
    }

    #[test]
    fn test_serde_roundtrip() {
        let original = SecretKind::DiskEncryption;
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, "\"disk-encryption\"");
        let parsed: SecretKind = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);
    }
}
