//! State manager for checkpoint persistence
//!
//! This module provides the StateManager, the exporter's only path to the
//! checkpoint store. It owns the dry-run suppression and the watermark rules
//! applied when a tenant run finishes.

use crate::config::FailedWatermarkPolicy;
use crate::core::state::checkpoint::{epoch, Checkpoint};
use crate::core::state::storage::{CheckpointStore, StoreValidation};
use crate::domain::ids::TenantId;
use crate::domain::Result;
use chrono::NaiveDateTime;
use std::sync::Arc;

/// State manager for checkpoint persistence
pub struct StateManager {
    /// Checkpoint storage backend
    store: Arc<dyn CheckpointStore>,

    /// Suppress every mutation of the store
    dry_run: bool,

    /// Watermark handling for failed tenants
    failed_policy: FailedWatermarkPolicy,
}

impl StateManager {
    /// Create a new StateManager with a checkpoint store backend
    ///
    /// # Arguments
    ///
    /// * `store` - Checkpoint store implementation
    /// * `dry_run` - When true, reads go through but writes are only logged
    pub fn new(store: Arc<dyn CheckpointStore>, dry_run: bool) -> Self {
        Self {
            store,
            dry_run,
            failed_policy: FailedWatermarkPolicy::default(),
        }
    }

    /// Override the watermark policy for failed tenants
    pub fn with_failed_policy(mut self, policy: FailedWatermarkPolicy) -> Self {
        self.failed_policy = policy;
        self
    }

    /// Whether mutations are suppressed
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Load the latest checkpoint for a tenant
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn load_checkpoint(&self, tenant: TenantId) -> Result<Option<Checkpoint>> {
        self.store.read(tenant).await
    }

    /// Load the watermark for a tenant; tenants never seen before start at the epoch
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn load_watermark(&self, tenant: TenantId) -> Result<NaiveDateTime> {
        Ok(self
            .load_checkpoint(tenant)
            .await?
            .map(|c| c.last_export_time)
            .unwrap_or_else(epoch))
    }

    /// Validate and back up the store before an incremental run
    ///
    /// Skipped entirely in dry-run mode. Backup failures are logged and
    /// swallowed; validation failures propagate.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be validated or reset.
    pub async fn prepare(&self) -> Result<()> {
        if self.dry_run {
            tracing::info!(
                dry_run = true,
                store = %self.store.location(),
                "Skipping checkpoint validation and backup"
            );
            return Ok(());
        }

        match self.store.validate().await? {
            StoreValidation::Missing => {
                tracing::info!(store = %self.store.location(), "No checkpoint store yet, starting fresh");
            }
            StoreValidation::Empty => {
                tracing::info!(store = %self.store.location(), "Checkpoint store is empty");
            }
            StoreValidation::Valid(count) => {
                tracing::info!(
                    store = %self.store.location(),
                    checkpoints = count,
                    "Checkpoint store validated"
                );
            }
            StoreValidation::Reset { quarantined, reason } => {
                tracing::warn!(
                    store = %self.store.location(),
                    quarantined = %quarantined.display(),
                    reason = %reason,
                    "Checkpoint store was corrupt; moved aside and reset, all tenants restart from the epoch"
                );
            }
        }

        match self.store.backup().await {
            Ok(Some(path)) => {
                tracing::info!(backup = %path.display(), "Checkpoint store backed up");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Checkpoint backup failed, continuing");
            }
        }

        Ok(())
    }

    /// Record a successful tenant run
    ///
    /// The stored watermark never moves backwards: it becomes
    /// `max(previous, boundary)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn record_success(
        &self,
        tenant: TenantId,
        boundary: NaiveDateTime,
        exported: u64,
    ) -> Result<Checkpoint> {
        let previous = self.load_watermark(tenant).await?;
        let checkpoint = Checkpoint::success(tenant, previous.max(boundary), exported);
        self.commit(checkpoint).await
    }

    /// Record a tenant whose query failed
    ///
    /// With the `advance` policy the watermark moves to the boundary as for
    /// a success; with `hold` the previous watermark is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn record_failure(
        &self,
        tenant: TenantId,
        boundary: NaiveDateTime,
    ) -> Result<Checkpoint> {
        let previous = self.load_watermark(tenant).await?;
        let watermark = match self.failed_policy {
            FailedWatermarkPolicy::Advance => previous.max(boundary),
            FailedWatermarkPolicy::Hold => previous,
        };
        self.commit(Checkpoint::failed(tenant, watermark)).await
    }

    /// Every stored checkpoint, ordered by tenant
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn all_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        self.store.list().await
    }

    async fn commit(&self, checkpoint: Checkpoint) -> Result<Checkpoint> {
        if self.dry_run {
            tracing::info!(
                dry_run = true,
                tenant_id = %checkpoint.tenant_id,
                line = %checkpoint.to_line(),
                "Would write checkpoint"
            );
            return Ok(checkpoint);
        }

        self.store.write(&checkpoint).await?;

        tracing::info!(
            tenant_id = %checkpoint.tenant_id,
            last_export_time = %checkpoint.last_export_time,
            record_count = checkpoint.record_count,
            status = %checkpoint.status,
            "Checkpoint committed"
        );

        Ok(checkpoint)
    }
}
