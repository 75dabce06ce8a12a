//! Pre-flight checks
//!
//! Run before any record is touched. A failure here aborts the run with
//! [`InvexError::Preflight`] so nothing is half-written.

use crate::adapters::source::RecordSource;
use crate::config::InvexConfig;
use crate::domain::{InvexError, Result};
use std::path::{Path, PathBuf};

/// Run precondition checks
#[derive(Debug, Clone)]
pub struct PreflightChecks {
    output_dir: PathBuf,
    min_free_space_mb: u64,
    check_source: bool,
    dry_run: bool,
}

impl PreflightChecks {
    /// Create checks for an output root
    pub fn new(output_dir: impl Into<PathBuf>, min_free_space_mb: u64) -> Self {
        Self {
            output_dir: output_dir.into(),
            min_free_space_mb,
            check_source: true,
            dry_run: false,
        }
    }

    /// Build from configuration
    pub fn from_config(config: &InvexConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.export.output_dir),
            min_free_space_mb: config.preflight.min_free_space_mb,
            check_source: config.preflight.check_source,
            dry_run: config.export.dry_run,
        }
    }

    /// Skip anything that would write to the output root
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable or disable the source reachability check
    pub fn with_source_check(mut self, check_source: bool) -> Self {
        self.check_source = check_source;
        self
    }

    /// Run every check
    ///
    /// # Errors
    ///
    /// Returns [`InvexError::Preflight`] describing the first failed check.
    pub async fn run(&self, source: &dyn RecordSource) -> Result<()> {
        if self.dry_run {
            tracing::info!(
                dry_run = true,
                output_dir = %self.output_dir.display(),
                "Skipping output directory checks"
            );
        } else {
            self.check_output_dir().await?;
            self.check_free_space()?;
        }

        if self.check_source {
            source.test_connection().await.map_err(|e| {
                InvexError::Preflight(format!("Source '{}' is not reachable: {e}", source.name()))
            })?;
        }

        tracing::info!("Preflight checks passed");
        Ok(())
    }

    async fn check_output_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                InvexError::Preflight(format!(
                    "Cannot create output directory {}: {e}",
                    self.output_dir.display()
                ))
            })?;

        let marker = self
            .output_dir
            .join(format!(".invex-preflight-{}", std::process::id()));
        tokio::fs::write(&marker, b"ok").await.map_err(|e| {
            InvexError::Preflight(format!(
                "Output directory {} is not writable: {e}",
                self.output_dir.display()
            ))
        })?;
        let _ = tokio::fs::remove_file(&marker).await;

        Ok(())
    }

    fn check_free_space(&self) -> Result<()> {
        if self.min_free_space_mb == 0 {
            return Ok(());
        }

        let Some(available) = available_bytes(&self.output_dir)? else {
            tracing::debug!("Free-space check not supported on this platform");
            return Ok(());
        };

        let available_mb = available / (1024 * 1024);
        if available_mb < self.min_free_space_mb {
            return Err(InvexError::Preflight(format!(
                "Only {available_mb} MB free at {}, need at least {} MB",
                self.output_dir.display(),
                self.min_free_space_mb
            )));
        }

        tracing::debug!(available_mb, required_mb = self.min_free_space_mb, "Free space ok");
        Ok(())
    }
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
fn available_bytes(path: &Path) -> Result<Option<u64>> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(|e| {
        InvexError::Preflight(format!("Cannot stat filesystem at {}: {e}", path.display()))
    })?;
    Ok(Some(
        (stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64),
    ))
}

#[cfg(not(unix))]
fn available_bytes(_path: &Path) -> Result<Option<u64>> {
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemorySource;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let checks = PreflightChecks::new(&out, 0);

        checks.run(&MemorySource::default()).await.unwrap();

        assert!(out.is_dir());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_source_fails() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::default();
        source.set_unreachable(true);

        let err = PreflightChecks::new(dir.path(), 0)
            .run(&source)
            .await
            .unwrap_err();
        assert!(matches!(err, InvexError::Preflight(_)));
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn test_source_check_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let source = MemorySource::default();
        source.set_unreachable(true);

        PreflightChecks::new(dir.path(), 0)
            .with_source_check(false)
            .run(&source)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_output_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, "x").unwrap();

        let err = PreflightChecks::new(&file, 0)
            .run(&MemorySource::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InvexError::Preflight(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_impossible_free_space_requirement() {
        let dir = TempDir::new().unwrap();

        let err = PreflightChecks::new(dir.path(), u64::MAX / (1024 * 1024))
            .run(&MemorySource::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("MB free"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_create_output_dir() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");

        PreflightChecks::new(&out, 0)
            .with_dry_run(true)
            .run(&MemorySource::default())
            .await
            .unwrap();

        assert!(!out.exists());
    }
}
