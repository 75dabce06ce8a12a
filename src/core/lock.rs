//! Process-level mutual exclusion for incremental runs
//!
//! Two overlapping incremental runs would read the same watermarks and race
//! on the checkpoint store. Before touching state, a run takes a lock that is
//! visible to every process on the host and gives up immediately if another
//! run already holds it.

use crate::domain::{InvexError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

type ReleaseFn = Box<dyn FnOnce() -> io::Result<()> + Send>;

/// A held lock
///
/// Released explicitly with [`LockHandle::release`] or implicitly on drop,
/// whichever happens first. Releasing twice is a no-op.
pub struct LockHandle {
    resource: String,
    release: Option<ReleaseFn>,
}

impl LockHandle {
    /// Wrap a release action for the given resource
    pub fn new<F>(resource: impl Into<String>, release: F) -> Self
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        Self {
            resource: resource.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Resource this handle guards
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Whether the lock is still held by this handle
    pub fn is_held(&self) -> bool {
        self.release.is_some()
    }

    /// Release the lock
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource could not be removed.
    /// The handle is considered released either way.
    pub fn release(&mut self) -> Result<()> {
        let Some(release) = self.release.take() else {
            return Ok(());
        };

        release().map_err(|e| {
            InvexError::State(format!("Failed to release lock {}: {e}", self.resource))
        })?;
        tracing::debug!(resource = %self.resource, "Lock released");
        Ok(())
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!(error = %e, "Lock release on drop failed");
        }
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("resource", &self.resource)
            .field("held", &self.is_held())
            .finish()
    }
}

/// Lock manager trait
///
/// Acquisition never waits: contention is reported as
/// [`InvexError::LockContention`].
pub trait LockManager: Send + Sync {
    /// Try to take the lock
    fn acquire(&self) -> Result<LockHandle>;

    /// Identity of the lock resource
    fn resource(&self) -> String;
}

/// Directory-based lock
///
/// Directory creation is atomic on every supported filesystem, so exactly
/// one process wins the race. An `owner` file inside records who holds it.
#[derive(Debug, Clone)]
pub struct DirectoryLock {
    path: PathBuf,
}

impl DirectoryLock {
    /// Create a lock at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Lock directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether some process currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.path.is_dir()
    }

    /// Owner record of the current holder, if readable
    pub fn owner(&self) -> Option<String> {
        fs::read_to_string(self.path.join("owner")).ok()
    }

    fn write_owner(&self) -> io::Result<()> {
        let owner = format!(
            "pid={}\nhost={}\nstarted={}\n",
            std::process::id(),
            host_name(),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        fs::write(self.path.join("owner"), owner)
    }
}

impl LockManager for DirectoryLock {
    fn acquire(&self) -> Result<LockHandle> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                InvexError::State(format!(
                    "Failed to create lock parent directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        match fs::create_dir(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(InvexError::LockContention {
                    resource: self.resource(),
                });
            }
            Err(e) => {
                return Err(InvexError::State(format!(
                    "Failed to create lock {}: {e}",
                    self.path.display()
                )));
            }
        }

        // The owner file is informational; the directory is the lock.
        if let Err(e) = self.write_owner() {
            tracing::warn!(error = %e, lock = %self.path.display(), "Could not record lock owner");
        }

        tracing::info!(lock = %self.path.display(), "Lock acquired");

        let path = self.path.clone();
        Ok(LockHandle::new(self.resource(), move || {
            match fs::remove_dir_all(&path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            }
        }))
    }

    fn resource(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(unix)]
fn host_name() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(not(unix))]
fn host_name() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_contention() {
        let dir = TempDir::new().unwrap();
        let lock = DirectoryLock::new(dir.path().join("export.lock"));

        let _held = lock.acquire().unwrap();
        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, InvexError::LockContention { .. }));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_release_allows_reacquire() {
        let dir = TempDir::new().unwrap();
        let lock = DirectoryLock::new(dir.path().join("export.lock"));

        let mut handle = lock.acquire().unwrap();
        assert!(lock.path().join("owner").exists());
        handle.release().unwrap();
        assert!(!handle.is_held());
        assert!(!lock.path().exists());

        // Idempotent
        handle.release().unwrap();

        let _again = lock.acquire().unwrap();
    }

    #[test]
    fn test_drop_releases() {
        let dir = TempDir::new().unwrap();
        let lock = DirectoryLock::new(dir.path().join("nested").join("export.lock"));

        {
            let _handle = lock.acquire().unwrap();
            assert!(lock.path().exists());
        }

        assert!(!lock.path().exists());
    }

    #[test]
    fn test_owner_file_records_pid() {
        let dir = TempDir::new().unwrap();
        let lock = DirectoryLock::new(dir.path().join("export.lock"));
        let _handle = lock.acquire().unwrap();

        let owner = std::fs::read_to_string(lock.path().join("owner")).unwrap();
        assert!(owner.contains(&format!("pid={}", std::process::id())));
    }
}
