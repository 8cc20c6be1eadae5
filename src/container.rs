//! Encrypted credential container format.
//!
//! A container is a small text file: a commented header carrying the format
//! version, cipher, PBKDF2 iteration count and creation time, followed by the
//! base64 ciphertext.
//!
//! ```text
//! # ENCRYPTED PASSWORD FILE
//! # VERSION: 2.0
//! # CIPHER: aes-256-cbc
//! # ITERATIONS: 100000
//! # CREATED: 2026-01-01T00:00:00Z
//! # DATA:
//! U2FsdGVkX1...
//! ```
//!
//! The ciphertext uses the OpenSSL `enc` salted layout (`Salted__`, 8 byte salt,
//! AES-256-CBC body) with key and IV derived together by PBKDF2-HMAC-SHA256, so
//! `openssl enc -d -aes-256-cbc -pbkdf2 -md sha256 -iter N -a` can open it too.
//!
//! The plaintext payload is `key=value` lines, one per secret kind.
//!
//! Wrong passphrases and corrupted bodies both surface as
//! [`CredentialError::DecryptionFailure`]; callers cannot tell them apart.

use std::fmt;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use strum::{Display, EnumString};
use zeroize::Zeroizing;

use crate::error::{CredentialError, Result};
use crate::secret::CredentialSet;
use crate::shred::ScratchFile;
use crate::types::SecretKind;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// First line of every container
pub const HEADER_MAGIC: &str = "# ENCRYPTED PASSWORD FILE";

/// Version written by this crate
pub const CURRENT_VERSION: FormatVersion = FormatVersion { major: 2, minor: 0 };

/// Iteration count used when writing, and when a legacy header omits it
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Accepted iteration range
pub const MIN_ITERATIONS: u32 = 1_000;
pub const MAX_ITERATIONS: u32 = 10_000_000;

const SALT_MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const WRAP_COLUMNS: usize = 64;

/// Ciphers a container may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ContainerCipher {
    #[default]
    #[strum(to_string = "aes-256-cbc")]
    Aes256Cbc,
}

/// `MAJOR.MINOR` container format version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVersion {
    pub major: u16,
    pub minor: u16,
}

impl FormatVersion {
    /// Version assumed when the header has no VERSION line
    pub const LEGACY: FormatVersion = FormatVersion { major: 1, minor: 0 };

    /// Majors 1 and 2 are understood; anything newer is rejected
    pub fn is_supported(&self) -> bool {
        matches!(self.major, 1 | 2)
    }
}

impl FromStr for FormatVersion {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || CredentialError::invalid_container(format!("malformed VERSION '{}'", s));
        let (major, minor) = match s.trim().split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s.trim(), "0"),
        };
        Ok(Self {
            major: major.parse().map_err(|_| bad())?,
            minor: minor.parse().map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A parsed or freshly sealed container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedContainer {
    pub format_version: FormatVersion,
    pub cipher: ContainerCipher,
    pub kdf_iterations: u32,
    pub created_at: Option<DateTime<Utc>>,
    ciphertext: Vec<u8>,
}

fn check_iterations(iterations: u32) -> Result<()> {
    if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations) {
        return Err(CredentialError::invalid_container(format!(
            "ITERATIONS {} outside {}..={}",
            iterations, MIN_ITERATIONS, MAX_ITERATIONS
        )));
    }
    Ok(())
}

/// PBKDF2-HMAC-SHA256 stretched to key || iv
fn derive_key_iv(passphrase: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN + IV_LEN]> {
    let mut out = Zeroizing::new([0u8; KEY_LEN + IV_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut out[..]);
    out
}

impl EncryptedContainer {
    /// Encrypt `plaintext` under `passphrase`.
    pub fn seal(plaintext: &[u8], passphrase: &str, iterations: u32) -> Result<Self> {
        check_iterations(iterations)?;
        if plaintext.is_empty() {
            return Err(CredentialError::invalid_container("refusing to seal an empty payload"));
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key_iv = derive_key_iv(passphrase, &salt, iterations);
        let cipher = Aes256CbcEnc::new_from_slices(&key_iv[..KEY_LEN], &key_iv[KEY_LEN..])
            .map_err(|_| CredentialError::invalid_container("key derivation produced a bad key"))?;
        let body = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut ciphertext = Vec::with_capacity(SALT_MAGIC.len() + SALT_LEN + body.len());
        ciphertext.extend_from_slice(SALT_MAGIC);
        ciphertext.extend_from_slice(&salt);
        ciphertext.extend_from_slice(&body);

        Ok(Self {
            format_version: CURRENT_VERSION,
            cipher: ContainerCipher::Aes256Cbc,
            kdf_iterations: iterations,
            created_at: Some(Utc::now()),
            ciphertext,
        })
    }

    /// Decrypt with `passphrase`, using the iteration count from the header.
    pub fn open(&self, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
        let prefix = SALT_MAGIC.len() + SALT_LEN;
        if self.ciphertext.len() < prefix + BLOCK_LEN
            || !self.ciphertext.starts_with(SALT_MAGIC)
            || (self.ciphertext.len() - prefix) % BLOCK_LEN != 0
        {
            return Err(CredentialError::DecryptionFailure);
        }
        let salt = &self.ciphertext[SALT_MAGIC.len()..prefix];
        let body = &self.ciphertext[prefix..];

        let key_iv = derive_key_iv(passphrase, salt, self.kdf_iterations);
        let cipher = Aes256CbcDec::new_from_slices(&key_iv[..KEY_LEN], &key_iv[KEY_LEN..])
            .map_err(|_| CredentialError::DecryptionFailure)?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map(Zeroizing::new)
            .map_err(|_| CredentialError::DecryptionFailure)
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Parse container text.
    ///
    /// Missing CIPHER or ITERATIONS fall back to the compiled-in defaults so
    /// version 1 files keep working. Unknown major versions are rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).skip_while(|l| l.is_empty());
        if lines.next() != Some(HEADER_MAGIC) {
            return Err(CredentialError::invalid_container("missing container header"));
        }

        let mut version = None;
        let mut cipher = None;
        let mut iterations = None;
        let mut created = None;
        let mut saw_data = false;

        for line in lines.by_ref() {
            let Some(comment) = line.strip_prefix('#') else {
                if line.is_empty() {
                    continue;
                }
                return Err(CredentialError::invalid_container("content before DATA marker"));
            };
            let Some((key, value)) = comment.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_uppercase().as_str() {
                "VERSION" => version = Some(value.parse::<FormatVersion>()?),
                "CIPHER" => {
                    cipher = Some(value.parse::<ContainerCipher>().map_err(|_| {
                        CredentialError::invalid_container(format!("unsupported cipher '{}'", value))
                    })?)
                }
                "ITERATIONS" => {
                    let n = value.parse::<u32>().map_err(|_| {
                        CredentialError::invalid_container(format!("malformed ITERATIONS '{}'", value))
                    })?;
                    check_iterations(n)?;
                    iterations = Some(n);
                }
                "CREATED" => {
                    created = DateTime::parse_from_rfc3339(value)
                        .map(|d| d.with_timezone(&Utc))
                        .map_err(|e| tracing::debug!("Ignoring unparseable CREATED: {}", e))
                        .ok();
                }
                "DATA" => {
                    saw_data = true;
                    break;
                }
                other => tracing::debug!("Ignoring unknown container header field {}", other),
            }
        }

        if !saw_data {
            return Err(CredentialError::invalid_container("missing DATA marker"));
        }

        let format_version = version.unwrap_or_else(|| {
            tracing::debug!("No VERSION in container header, assuming legacy format");
            FormatVersion::LEGACY
        });
        if !format_version.is_supported() {
            return Err(CredentialError::invalid_container(format!(
                "unsupported format version {}",
                format_version
            )));
        }
        if format_version.major >= 2 && (cipher.is_none() || iterations.is_none()) {
            tracing::warn!(version = %format_version, "Container header incomplete, using defaults");
        }

        let body: String = lines
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        if body.is_empty() {
            return Err(CredentialError::invalid_container("empty ciphertext"));
        }
        let ciphertext = STANDARD
            .decode(body.as_bytes())
            .map_err(|_| CredentialError::DecryptionFailure)?;

        Ok(Self {
            format_version,
            cipher: cipher.unwrap_or_default(),
            kdf_iterations: iterations.unwrap_or(DEFAULT_ITERATIONS),
            created_at: created,
            ciphertext,
        })
    }

    /// Render the container text
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER_MAGIC);
        out.push('\n');
        out.push_str(&format!("# VERSION: {}\n", self.format_version));
        out.push_str(&format!("# CIPHER: {}\n", self.cipher));
        out.push_str(&format!("# ITERATIONS: {}\n", self.kdf_iterations));
        if let Some(created) = self.created_at {
            out.push_str(&format!(
                "# CREATED: {}\n",
                created.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        out.push_str("# DATA:\n");

        let encoded = STANDARD.encode(&self.ciphertext);
        for chunk in encoded.as_bytes().chunks(WRAP_COLUMNS) {
            // base64 output is ASCII
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push('\n');
        }
        out
    }

    /// Read and parse a container file
    pub fn read_from(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        if metadata.permissions().mode() & 0o077 != 0 {
            tracing::warn!(path = ?path, "Credential container is readable by group or others");
        }
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => {
                CredentialError::invalid_container("container is not valid UTF-8 text")
            }
            _ => CredentialError::Io(e),
        })?;
        Self::parse(&text)
    }

    /// Write the container to `path` with mode 0600.
    ///
    /// Content goes to an owner-only sibling scratch file first, which is then
    /// renamed over `path`, so no partial or over-readable file ever exists.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "container".to_string());

        let (scratch, mut file) = ScratchFile::create_in(dir, &format!(".{}.tmp-", name))?;
        file.write_all(self.render().as_bytes())?;
        file.sync_all()?;
        drop(file);
        scratch.persist(path)?;

        tracing::info!(path = ?path, iterations = self.kdf_iterations, "Credential container written");
        Ok(())
    }
}

/// Serialize a credential set as `key=value` lines
pub fn encode_payload(set: &CredentialSet) -> Zeroizing<String> {
    let mut payload = Zeroizing::new(String::new());
    for kind in SecretKind::ALL {
        if let Some(secret) = set.get(kind) {
            payload.push_str(kind.payload_key());
            payload.push('=');
            payload.push_str(secret.expose());
            payload.push('\n');
        }
    }
    payload
}

/// Parse `key=value` payload lines into raw (not yet validated) values.
///
/// Anything that does not look like a payload is reported as a decryption
/// failure: CBC with the wrong key occasionally yields valid padding, and the
/// result must not be mistaken for a plaintext.
pub fn decode_payload(plaintext: &[u8]) -> Result<Vec<(SecretKind, Zeroizing<String>)>> {
    let text = std::str::from_utf8(plaintext).map_err(|_| CredentialError::DecryptionFailure)?;

    let mut entries: Vec<(SecretKind, Zeroizing<String>)> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(CredentialError::DecryptionFailure);
        };
        let key = key.trim();
        match SecretKind::from_payload_key(key) {
            Some(kind) if entries.iter().any(|(k, _)| *k == kind) => {
                tracing::debug!(%kind, "Duplicate payload key, keeping the first");
            }
            Some(kind) => entries.push((kind, Zeroizing::new(value.to_string()))),
            None => tracing::debug!("Skipping unknown payload key {}", key),
        }
    }

    if entries.is_empty() {
        return Err(CredentialError::DecryptionFailure);
    }
    Ok(entries)
}

/// Seal a credential set into a new container
pub fn seal_credentials(
    set: &CredentialSet,
    passphrase: &str,
    iterations: u32,
) -> Result<EncryptedContainer> {
    let payload = encode_payload(set);
    EncryptedContainer::seal(payload.as_bytes(), passphrase, iterations)
}

/// Decrypt a container and parse its payload
pub fn open_credentials(
    container: &EncryptedContainer,
    passphrase: &str,
) -> Result<Vec<(SecretKind, Zeroizing<String>)>> {
    let plaintext = container.open(passphrase)?;
    decode_payload(&plaintext)
}
