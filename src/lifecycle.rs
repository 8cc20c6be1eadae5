//! Secure lifecycle management for resolved secrets
//!
//! This module guarantees that nothing secret outlives the process, whichever
//! way the process ends.
//!
//! # Problem Solved
//! Secrets are resolved into memory, exported into the environment for
//! collaborator processes, and sometimes written to owner-only scratch files
//! (LUKS keyfiles). An early return, a panic or a Ctrl+C must not leave any of
//! that behind.
//!
//! # Solution
//! - Track every credential store, scratch file and exported variable in a
//!   global registry
//! - Run a single cleanup pass exactly once: from `LifecycleGuard::drop`, from
//!   the panic hook, or from the signal thread (SIGINT, SIGTERM, SIGHUP)
//! - Cleanup zeroes stores, shreds scratch files and unsets exported variables

use nix::libc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::secret::CredentialStore;
use crate::shred::{SHRED_PASSES, shred_file};

/// Global cleanup registry
/// Using OnceLock for safe lazy initialization
static CLEANUP_REGISTRY: OnceLock<Arc<Mutex<CleanupRegistry>>> = OnceLock::new();

/// What a cleanup pass actually did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupSummary {
    pub stores_wiped: usize,
    pub files_shredded: usize,
    pub files_failed: usize,
    pub env_vars_unset: usize,
}

/// Registry of everything that must be erased at exit
#[derive(Debug, Default)]
pub struct CleanupRegistry {
    /// Credential stores to wipe
    stores: Vec<CredentialStore>,
    /// Scratch files still on disk
    scratch_files: BTreeSet<PathBuf>,
    /// Variables exported into this process's environment
    exported_vars: BTreeSet<String>,
    /// Whether cleanup has already run (prevent double-cleanup)
    cleanup_initiated: bool,
}

impl CleanupRegistry {
    /// Get or create the global cleanup registry
    pub fn global() -> Arc<Mutex<CleanupRegistry>> {
        CLEANUP_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(CleanupRegistry::default())))
            .clone()
    }

    pub fn register_store(&mut self, store: CredentialStore) {
        self.stores.push(store);
    }

    pub fn register_file(&mut self, path: &Path) {
        self.scratch_files.insert(path.to_path_buf());
    }

    /// Forget a scratch file (it was shredded or persisted by its owner)
    pub fn unregister_file(&mut self, path: &Path) {
        self.scratch_files.remove(path);
    }

    pub fn register_env_var(&mut self, name: &str) {
        self.exported_vars.insert(name.to_string());
    }

    pub fn file_count(&self) -> usize {
        self.scratch_files.len()
    }

    pub fn env_var_count(&self) -> usize {
        self.exported_vars.len()
    }

    pub fn cleanup_done(&self) -> bool {
        self.cleanup_initiated
    }

    /// Erase everything tracked. Only the first call does any work.
    pub fn run_cleanup(&mut self) -> CleanupSummary {
        let mut summary = CleanupSummary::default();
        if self.cleanup_initiated {
            tracing::debug!("Cleanup already initiated, skipping");
            return summary;
        }
        self.cleanup_initiated = true;

        for store in self.stores.drain(..) {
            store.wipe();
            summary.stores_wiped += 1;
        }

        for path in std::mem::take(&mut self.scratch_files) {
            match shred_file(&path, SHRED_PASSES) {
                Ok(()) => summary.files_shredded += 1,
                Err(e) => {
                    tracing::error!(path = ?path, "Failed to shred scratch file: {}", e);
                    summary.files_failed += 1;
                }
            }
        }

        for name in std::mem::take(&mut self.exported_vars) {
            // SAFETY: cleanup runs at process end; the resolver is synchronous and
            // no other thread of ours reads the environment at this point.
            unsafe { std::env::remove_var(&name) };
            summary.env_vars_unset += 1;
        }

        tracing::info!(
            stores = summary.stores_wiped,
            files = summary.files_shredded,
            env_vars = summary.env_vars_unset,
            "Secret cleanup complete"
        );
        summary
    }
}

/// Run the global cleanup pass if it has not run yet
pub fn cleanup_now() -> CleanupSummary {
    match CleanupRegistry::global().lock() {
        Ok(mut registry) => registry.run_cleanup(),
        Err(poisoned) => poisoned.into_inner().run_cleanup(),
    }
}

/// RAII guard that erases every tracked secret on drop
/// Hold this in `main` for the whole run to cover every return path
pub struct LifecycleGuard {
    registry: Arc<Mutex<CleanupRegistry>>,
}

impl LifecycleGuard {
    /// Create a guard attached to the global registry
    pub fn new() -> Self {
        Self {
            registry: CleanupRegistry::global(),
        }
    }

    /// Create a guard over a private registry
    pub fn with_registry(registry: Arc<Mutex<CleanupRegistry>>) -> Self {
        Self { registry }
    }

    /// Wipe `store` at cleanup
    pub fn track_store(&self, store: &CredentialStore) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.register_store(store.clone());
        }
    }

    /// Unset `name` at cleanup
    pub fn track_env_var(&self, name: &str) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.register_env_var(name);
        }
    }

    /// Run cleanup now instead of waiting for drop
    pub fn cleanup(&self) -> CleanupSummary {
        match self.registry.lock() {
            Ok(mut registry) => registry.run_cleanup(),
            Err(poisoned) => poisoned.into_inner().run_cleanup(),
        }
    }
}

impl Default for LifecycleGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        tracing::debug!("LifecycleGuard dropped, initiating cleanup");
        self.cleanup();
    }
}

/// Initialize global signal handlers for interrupt cleanup
/// Handles SIGINT (Ctrl+C), SIGTERM, and SIGHUP
/// Call this once at program start
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };

            restore_terminal();
            tracing::info!("Received {} signal, erasing secrets...", signal_name);
            cleanup_now();

            // Exit with appropriate code (128 + signal number)
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Leave raw mode if a masked prompt was interrupted mid-entry.
///
/// A no-op when raw mode was never enabled.
pub fn restore_terminal() {
    if let Err(e) = crossterm::terminal::disable_raw_mode() {
        tracing::debug!("Could not restore terminal mode: {}", e);
    }
}

/// Chain a panic hook that runs cleanup before the default report.
///
/// Release builds abort on panic, so drop guards never run there; the hook does.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore_terminal();
        cleanup_now();
        previous(info);
    }));
}

/// Extension trait for std::process::Command to tie a collaborator's lifetime
/// to ours
pub trait CommandDeathPact {
    /// Deliver SIGTERM to the child if this process dies first, so a
    /// collaborator holding exported secrets never outlives the cleanup
    fn die_with_parent(&mut self) -> &mut Self;
}

impl CommandDeathPact for std::process::Command {
    fn die_with_parent(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        unsafe {
            self.pre_exec(|| {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
