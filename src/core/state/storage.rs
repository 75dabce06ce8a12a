//! Checkpoint storage backends
//!
//! The store is a small key-value mapping from tenant to its latest
//! checkpoint. [`FileCheckpointStore`] keeps it in a line-oriented text file
//! and replaces that file atomically on every write, so a crash leaves either
//! the old store or the new one on disk, never a torn mix.

use crate::core::state::checkpoint::Checkpoint;
use crate::domain::ids::TenantId;
use crate::domain::{InvexError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Result of validating the store before an incremental run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValidation {
    /// No store exists yet (first run)
    Missing,
    /// Store exists but holds no records
    Empty,
    /// Every line is well-formed; carries the record count
    Valid(usize),
    /// Store was corrupt, moved aside and replaced by an empty one
    Reset {
        /// Where the corrupt store now lives
        quarantined: PathBuf,
        /// First offending line and why it was rejected
        reason: String,
    },
}

/// Checkpoint store trait
///
/// Implementations must make `write` atomic with respect to concurrent
/// readers and to process crashes.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest committed checkpoint for a tenant
    async fn read(&self, tenant: TenantId) -> Result<Option<Checkpoint>>;

    /// Replace the tenant's checkpoint, leaving every other tenant untouched
    async fn write(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// All checkpoints, ordered by tenant
    async fn list(&self) -> Result<Vec<Checkpoint>>;

    /// Copy the current store aside; `None` when there was nothing to copy
    async fn backup(&self) -> Result<Option<PathBuf>>;

    /// Check every record against the line grammar, resetting a corrupt store
    async fn validate(&self) -> Result<StoreValidation>;

    /// Human-readable location, for logs
    fn location(&self) -> String;
}

/// File-backed checkpoint store
pub struct FileCheckpointStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    /// Create a store at the given path; the file is created lazily
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_contents(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(InvexError::State(format!(
                "Failed to read checkpoint store {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn load_map(&self) -> Result<BTreeMap<TenantId, Checkpoint>> {
        let mut map = BTreeMap::new();
        let Some(contents) = self.read_contents().await? else {
            return Ok(map);
        };

        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Checkpoint::parse_line(line) {
                Ok(checkpoint) => {
                    map.insert(checkpoint.tenant_id, checkpoint);
                }
                Err(reason) => {
                    tracing::warn!(
                        store = %self.path.display(),
                        line = index + 1,
                        reason = %reason,
                        "Ignoring malformed checkpoint line"
                    );
                }
            }
        }

        Ok(map)
    }

    async fn replace_contents(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                InvexError::State(format!(
                    "Failed to create checkpoint directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp_path = with_suffix(&self.path, &format!(".tmp.{}", std::process::id()));
        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(contents.as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, &self.path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(InvexError::State(format!(
                "Failed to replace checkpoint store {}: {e}",
                self.path.display()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn read(&self, tenant: TenantId) -> Result<Option<Checkpoint>> {
        let mut map = self.load_map().await?;
        Ok(map.remove(&tenant))
    }

    async fn write(&self, checkpoint: &Checkpoint) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.load_map().await?;
        map.insert(checkpoint.tenant_id, checkpoint.clone());

        let mut contents = String::new();
        for record in map.values() {
            contents.push_str(&record.to_line());
            contents.push('\n');
        }

        self.replace_contents(&contents).await?;

        tracing::debug!(
            store = %self.path.display(),
            tenant_id = %checkpoint.tenant_id,
            line = %checkpoint.to_line(),
            "Checkpoint written"
        );

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Checkpoint>> {
        Ok(self.load_map().await?.into_values().collect())
    }

    async fn backup(&self) -> Result<Option<PathBuf>> {
        let _guard = self.write_lock.lock().await;

        match self.read_contents().await? {
            Some(contents) if !contents.trim().is_empty() => {
                let backup_path = with_suffix(&self.path, &format!(".{}.bak", file_timestamp()));
                tokio::fs::copy(&self.path, &backup_path).await.map_err(|e| {
                    InvexError::State(format!(
                        "Failed to back up checkpoint store to {}: {e}",
                        backup_path.display()
                    ))
                })?;
                Ok(Some(backup_path))
            }
            _ => Ok(None),
        }
    }

    async fn validate(&self) -> Result<StoreValidation> {
        let _guard = self.write_lock.lock().await;

        let Some(contents) = self.read_contents().await? else {
            return Ok(StoreValidation::Missing);
        };

        let mut valid = 0usize;
        let mut first_error = None;
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Checkpoint::parse_line(line) {
                Ok(_) => valid += 1,
                Err(reason) => {
                    first_error = Some(format!("line {}: {reason}", index + 1));
                    break;
                }
            }
        }

        let Some(reason) = first_error else {
            return Ok(if valid == 0 {
                StoreValidation::Empty
            } else {
                StoreValidation::Valid(valid)
            });
        };

        let quarantined = with_suffix(&self.path, &format!(".corrupt.{}", file_timestamp()));
        tokio::fs::rename(&self.path, &quarantined).await.map_err(|e| {
            InvexError::State(format!(
                "Failed to move corrupt checkpoint store to {}: {e}",
                quarantined.display()
            ))
        })?;
        self.replace_contents("").await?;

        Ok(StoreValidation::Reset {
            quarantined,
            reason,
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::checkpoint::CheckpointStatus;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn tenant(id: i64) -> TenantId {
        TenantId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_read_missing_store() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoints.dat"));

        assert!(store.read(tenant(7)).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_replaces_only_one_tenant() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("checkpoints.dat");
        let store = FileCheckpointStore::new(&path);

        store
            .write(&Checkpoint::success(tenant(7), at(10, 0, 0), 3))
            .await
            .unwrap();
        store
            .write(&Checkpoint::success(tenant(9), at(10, 0, 0), 1))
            .await
            .unwrap();
        store
            .write(&Checkpoint::failed(tenant(7), at(10, 5, 0)))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "7|2024-03-01 10:05:00|0|FAILED\n9|2024-03-01 10:00:00|1|SUCCESS\n"
        );

        let seven = store.read(tenant(7)).await.unwrap().unwrap();
        assert_eq!(seven.status, CheckpointStatus::Failed);
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoints.dat"));
        store
            .write(&Checkpoint::success(tenant(1), at(9, 0, 0), 0))
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["checkpoints.dat".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_writes_for_different_tenants() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileCheckpointStore::new(dir.path().join("checkpoints.dat")));

        let mut handles = Vec::new();
        for id in 1..=20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .write(&Checkpoint::success(tenant(id), at(10, 0, 0), id as u64))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 20);
        assert_eq!(all[0].tenant_id.get(), 1);
        assert_eq!(all[19].record_count, 20);
    }

    #[tokio::test]
    async fn test_validate_states() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoints.dat");
        let store = FileCheckpointStore::new(&path);

        assert_eq!(store.validate().await.unwrap(), StoreValidation::Missing);

        std::fs::write(&path, "\n\n").unwrap();
        assert_eq!(store.validate().await.unwrap(), StoreValidation::Empty);

        std::fs::write(
            &path,
            "7|2024-03-01 10:00:00|2|SUCCESS\n9|2024-03-01 10:00:00|0|FAILED\n",
        )
        .unwrap();
        assert_eq!(store.validate().await.unwrap(), StoreValidation::Valid(2));
    }

    #[tokio::test]
    async fn test_validate_quarantines_corrupt_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoints.dat");
        std::fs::write(&path, "7|2024-03-01 10:00:00|2|SUCCESS\ngarbage\n").unwrap();
        let store = FileCheckpointStore::new(&path);

        let outcome = store.validate().await.unwrap();
        let StoreValidation::Reset { quarantined, reason } = outcome else {
            panic!("expected reset, got {outcome:?}");
        };

        assert!(reason.starts_with("line 2"));
        assert!(quarantined
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("checkpoints.dat.corrupt."));
        assert!(std::fs::read_to_string(&quarantined)
            .unwrap()
            .contains("garbage"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        assert!(store.read(tenant(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoints.dat");
        let store = FileCheckpointStore::new(&path);

        assert!(store.backup().await.unwrap().is_none());

        store
            .write(&Checkpoint::success(tenant(7), at(10, 0, 0), 2))
            .await
            .unwrap();
        let backup = store.backup().await.unwrap().unwrap();

        let name = backup.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("checkpoints.dat."));
        assert!(name.ends_with(".bak"));
        assert_eq!(
            std::fs::read_to_string(&backup).unwrap(),
            std::fs::read_to_string(&path).unwrap()
        );
    }

    #[tokio::test]
    async fn test_read_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoints.dat");
        std::fs::write(&path, "oops\n7|2024-03-01 10:00:00|2|SUCCESS\n").unwrap();
        let store = FileCheckpointStore::new(&path);

        let checkpoint = store.read(tenant(7)).await.unwrap().unwrap();
        assert_eq!(checkpoint.record_count, 2);
    }
}
