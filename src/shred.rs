//! Owner-only scratch files that are shredded, not just deleted.
//!
//! Anything plaintext-adjacent that has to touch the filesystem (the LUKS
//! keyfile handed to collaborators, the in-progress container write) goes
//! through [`ScratchFile`]. The file is created with mode 0600 before a single
//! byte is written, is registered with the global cleanup registry so an
//! interrupt still shreds it, and is overwritten before unlinking on drop.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rand::RngCore;
use rand::rngs::OsRng;

use crate::lifecycle::CleanupRegistry;

/// Overwrite passes used by [`shred_file`]: random, random, then zeros
pub const SHRED_PASSES: usize = 3;

const CHUNK: usize = 4096;

/// Overwrite `path` in place `passes` times, fsyncing after each pass, then
/// unlink it. The final pass writes zeros. A missing file counts as success.
pub fn shred_file(path: &Path, passes: usize) -> io::Result<()> {
    let mut file = match OpenOptions::new().write(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let len = file.metadata()?.len() as usize;

    let mut buf = vec![0u8; CHUNK];
    for pass in 0..passes.max(1) {
        let last = pass + 1 == passes.max(1);
        file.seek(SeekFrom::Start(0))?;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(CHUNK);
            if last {
                buf[..n].fill(0);
            } else {
                OsRng.fill_bytes(&mut buf[..n]);
            }
            file.write_all(&buf[..n])?;
            remaining -= n;
        }
        file.sync_all()?;
    }
    drop(file);

    fs::remove_file(path)?;
    tracing::debug!(path = ?path, passes, "Scratch file shredded");
    Ok(())
}

/// RAII wrapper for a 0600 scratch file.
///
/// # Security Guarantees
///
/// 1. **Restricted permissions**: created with mode 0600 via `OpenOptionsExt::mode`
/// 2. **No reuse**: `create_new` fails if the name already exists
/// 3. **Secure deletion**: shredded on drop, or by the cleanup registry on interrupt
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    registry: Arc<Mutex<CleanupRegistry>>,
    armed: bool,
}

impl ScratchFile {
    /// Create an empty scratch file in `dir` and return it with a writable handle.
    pub fn create_in(dir: &Path, prefix: &str) -> io::Result<(Self, File)> {
        let path = dir.join(format!("{}{:016x}", prefix, OsRng.next_u64()));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)?;

        let registry = CleanupRegistry::global();
        if let Ok(mut reg) = registry.lock() {
            reg.register_file(&path);
        }
        tracing::debug!(path = ?path, "Scratch file created");

        Ok((
            Self {
                path,
                registry,
                armed: true,
            },
            file,
        ))
    }

    /// Create a scratch file holding `contents`.
    pub fn with_contents(dir: &Path, prefix: &str, contents: &[u8]) -> io::Result<Self> {
        let (scratch, mut file) = Self::create_in(dir, prefix)?;
        file.write_all(contents)?;
        file.sync_all()?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically move the scratch file onto `dest` and stop tracking it.
    ///
    /// Used when the content is ciphertext that is meant to outlive the run.
    pub fn persist(mut self, dest: &Path) -> io::Result<()> {
        fs::rename(&self.path, dest)?;
        self.disarm();
        Ok(())
    }

    fn disarm(&mut self) {
        self.armed = false;
        if let Ok(mut reg) = self.registry.lock() {
            reg.unregister_file(&self.path);
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = shred_file(&self.path, SHRED_PASSES) {
            tracing::warn!(path = ?self.path, "Failed to shred scratch file: {}", e);
        }
        self.disarm();
    }
}
