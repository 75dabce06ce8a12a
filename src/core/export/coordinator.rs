//! Export coordinator - main orchestrator for the export process
//!
//! This module drives both export modes:
//!
//! - **incremental**: `Idle → Locking → Initializing → Running → Finalizing → Done`.
//!   One tenant at a time, each bounded by its own watermark and the run's
//!   shared boundary, each ending in exactly one checkpoint write.
//! - **full**: `Idle → PreChecking → Streaming → Done`. One stateless pass
//!   over every eligible record with a bounded number of concurrent writes.

use crate::adapters::source::{RecordSource, RecordStream};
use crate::config::{ExportMode, FailedWatermarkPolicy, InvexConfig};
use crate::core::boundary::{compute_boundary, Clock, SystemClock};
use crate::core::export::materializer::{MaterializeOutcome, RecordMaterializer};
use crate::core::export::preflight::PreflightChecks;
use crate::core::export::summary::{
    ExportError, ExportErrorType, ExportSummary, TenantOutcome, TenantResult,
};
use crate::core::lock::{DirectoryLock, LockManager};
use crate::core::query::QuerySpec;
use crate::core::state::{CheckpointStore, FileCheckpointStore, StateManager};
use crate::domain::ids::TenantId;
use crate::domain::record::InvoiceRecord;
use crate::domain::{InvexError, Result, WriteError};
use chrono::NaiveDateTime;
use futures::StreamExt;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;

/// Where the coordinator is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    /// Not started
    Idle,
    /// Taking the process lock (incremental)
    Locking,
    /// Validating state and computing the boundary (incremental)
    Initializing,
    /// Exporting tenants (incremental)
    Running,
    /// Releasing the lock and reporting (incremental)
    Finalizing,
    /// Running preflight checks (full)
    PreChecking,
    /// Streaming records to disk (full)
    Streaming,
    /// Finished, successfully or not
    Done,
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportPhase::Idle => "idle",
            ExportPhase::Locking => "locking",
            ExportPhase::Initializing => "initializing",
            ExportPhase::Running => "running",
            ExportPhase::Finalizing => "finalizing",
            ExportPhase::PreChecking => "pre-checking",
            ExportPhase::Streaming => "streaming",
            ExportPhase::Done => "done",
        };
        f.write_str(name)
    }
}

// How draining one tenant's result stream ended.
enum Drain {
    Completed,
    Interrupted,
    SourceFailed(InvexError),
}

// Per-record verdict shared by both modes.
enum Verdict {
    Exported,
    Skipped(String),
    Failed(WriteError),
}

impl From<std::result::Result<MaterializeOutcome, WriteError>> for Verdict {
    fn from(outcome: std::result::Result<MaterializeOutcome, WriteError>) -> Self {
        match outcome {
            Ok(MaterializeOutcome::Written(_)) | Ok(MaterializeOutcome::DryRun(_)) => {
                Verdict::Exported
            }
            Ok(MaterializeOutcome::Skipped { reason, .. }) => Verdict::Skipped(reason),
            Err(e) => Verdict::Failed(e),
        }
    }
}

// Admits records from the first `limit` (tenant, country) groups of a
// partitioned stream. Groups are contiguous because the full query orders by
// tenant then country.
struct GroupLimit {
    limit: Option<usize>,
    admitted: usize,
    current: Option<(TenantId, Option<String>)>,
}

impl GroupLimit {
    fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            admitted: 0,
            current: None,
        }
    }

    fn admit(&mut self, item: &Result<InvoiceRecord>) -> bool {
        let (Some(limit), Ok(record)) = (self.limit, item) else {
            return true;
        };

        let key = (record.tenant_id, record.country.clone());
        if self.current.as_ref() != Some(&key) {
            if self.admitted >= limit {
                tracing::info!(groups = limit, "Group limit reached, stopping full export");
                return false;
            }
            self.admitted += 1;
            self.current = Some(key);
        }
        true
    }
}

/// Export coordinator
pub struct ExportCoordinator {
    mode: ExportMode,
    dry_run: bool,
    tenant_filter: Option<TenantId>,
    group_limit: Option<usize>,
    threads: usize,
    safety_window_secs: u64,
    failed_policy: FailedWatermarkPolicy,
    source: Arc<dyn RecordSource>,
    state: Arc<StateManager>,
    lock: Arc<dyn LockManager>,
    materializer: Arc<RecordMaterializer>,
    preflight: PreflightChecks,
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
    phase: Mutex<ExportPhase>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    ///
    /// Uses the file checkpoint store, the directory lock and the system
    /// clock named by the configuration. Each can be replaced afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured tenant filter is invalid.
    pub fn new(
        config: &InvexConfig,
        source: Arc<dyn RecordSource>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let tenant_filter = config
            .export
            .tenant_id
            .map(TenantId::new)
            .transpose()
            .map_err(InvexError::Configuration)?;

        let dry_run = config.export.dry_run;
        let failed_policy = config.state.failed_watermark_policy;
        let store: Arc<dyn CheckpointStore> =
            Arc::new(FileCheckpointStore::new(&config.state.checkpoint_path));

        Ok(Self {
            mode: config.export.mode,
            dry_run,
            tenant_filter,
            group_limit: config.export.limit,
            threads: config.export.threads.max(1),
            safety_window_secs: config.export.safety_window_seconds,
            failed_policy,
            source,
            state: Arc::new(StateManager::new(store, dry_run).with_failed_policy(failed_policy)),
            lock: Arc::new(DirectoryLock::new(&config.state.lock_path)),
            materializer: Arc::new(RecordMaterializer::from_config(&config.export)),
            preflight: PreflightChecks::from_config(config),
            clock: Arc::new(SystemClock),
            shutdown,
            phase: Mutex::new(ExportPhase::Idle),
        })
    }

    /// Replace the clock used for the boundary
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the lock manager
    pub fn with_lock_manager(mut self, lock: Arc<dyn LockManager>) -> Self {
        self.lock = lock;
        self
    }

    /// Replace the checkpoint store
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.state = Arc::new(
            StateManager::new(store, self.dry_run).with_failed_policy(self.failed_policy),
        );
        self
    }

    /// Replace the preflight checks
    pub fn with_preflight(mut self, preflight: PreflightChecks) -> Self {
        self.preflight = preflight;
        self
    }

    /// Current phase
    pub fn phase(&self) -> ExportPhase {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Execute the export in the configured mode
    ///
    /// # Errors
    ///
    /// Returns an error when the run as a whole cannot proceed: lock
    /// contention, a failed preflight, an unreadable tenant list or an
    /// unwritable checkpoint store. Failures scoped to one tenant or one
    /// record are reported in the summary instead.
    pub async fn execute_export(&self) -> Result<ExportSummary> {
        tracing::info!(mode = %self.mode, dry_run = self.dry_run, "Starting export process");

        let result = match self.mode {
            ExportMode::Incremental => self.execute_incremental().await,
            ExportMode::Full => self.execute_full().await,
        };
        self.enter(ExportPhase::Done);

        if let Ok(summary) = &result {
            summary.log_summary();
        }
        result
    }

    async fn execute_incremental(&self) -> Result<ExportSummary> {
        let start_time = Instant::now();
        let mut summary = ExportSummary::new(ExportMode::Incremental, self.dry_run);

        self.enter(ExportPhase::Locking);
        let mut lock = self.lock.acquire()?;

        let outcome = self.run_incremental(&mut summary).await;

        self.enter(ExportPhase::Finalizing);
        if let Err(e) = lock.release() {
            tracing::error!(error = %e, "Failed to release lock");
        }

        outcome?;
        Ok(summary.with_duration(start_time.elapsed()))
    }

    async fn run_incremental(&self, summary: &mut ExportSummary) -> Result<()> {
        self.enter(ExportPhase::Initializing);
        self.state.prepare().await?;
        self.preflight.run(self.source.as_ref()).await?;

        let boundary = compute_boundary(self.clock.now(), self.safety_window_secs);
        summary.boundary = Some(boundary);

        let tenants = match self.tenant_filter {
            Some(tenant) => vec![tenant],
            None => self.source.distinct_tenants().await?,
        };

        tracing::info!(
            boundary = %boundary,
            tenant_count = tenants.len(),
            "Processing tenants"
        );

        self.enter(ExportPhase::Running);
        for tenant in tenants {
            if self.shutdown_requested() {
                tracing::warn!("Shutdown requested, not starting further tenants");
                summary.interrupted = true;
                break;
            }

            let result = self.export_tenant(tenant, boundary, summary).await?;
            summary.add_tenant_result(result);
        }

        Ok(())
    }

    async fn export_tenant(
        &self,
        tenant: TenantId,
        boundary: NaiveDateTime,
        summary: &mut ExportSummary,
    ) -> Result<TenantResult> {
        let watermark = self.state.load_watermark(tenant).await?;
        let mut result = TenantResult::new(tenant, watermark);
        let query = QuerySpec::incremental(tenant, watermark, boundary);

        tracing::info!(
            tenant_id = %tenant,
            after = %watermark,
            up_to = %boundary,
            "Exporting tenant"
        );

        let drain = if query.is_empty() {
            tracing::debug!(tenant_id = %tenant, "Watermark at or past boundary, nothing to query");
            Drain::Completed
        } else {
            match self.source.fetch(&query).await {
                Ok(stream) => self.drain_tenant(stream, &mut result, summary).await,
                Err(e) => Drain::SourceFailed(e),
            }
        };

        match drain {
            Drain::Completed => {
                let checkpoint = self
                    .state
                    .record_success(tenant, boundary, result.records_exported)
                    .await?;
                result.checkpoint = Some(checkpoint);
                tracing::info!(
                    tenant_id = %tenant,
                    exported = result.records_exported,
                    failed = result.records_failed,
                    skipped = result.records_skipped,
                    "Tenant exported"
                );
            }
            Drain::Interrupted => {
                result.outcome = TenantOutcome::Interrupted;
                tracing::warn!(
                    tenant_id = %tenant,
                    exported = result.records_exported,
                    "Tenant interrupted, checkpoint left unchanged"
                );
            }
            Drain::SourceFailed(e) => {
                tracing::error!(tenant_id = %tenant, error = %e, "Tenant query failed");
                summary.add_error(
                    ExportError::new(ExportErrorType::Query, e.to_string())
                        .with_context(format!("tenant_id={tenant}")),
                );
                let checkpoint = self.state.record_failure(tenant, boundary).await?;
                result.outcome = TenantOutcome::Failed;
                result.checkpoint = Some(checkpoint);
            }
        }

        Ok(result)
    }

    async fn drain_tenant(
        &self,
        mut stream: RecordStream,
        result: &mut TenantResult,
        summary: &mut ExportSummary,
    ) -> Drain {
        while let Some(item) = stream.next().await {
            if self.shutdown_requested() {
                return Drain::Interrupted;
            }

            let record = match item {
                Ok(record) => record,
                Err(e) => return Drain::SourceFailed(e),
            };
            result.records_seen += 1;

            match Verdict::from(self.materializer.materialize(&record).await) {
                Verdict::Exported => result.records_exported += 1,
                Verdict::Skipped(reason) => {
                    result.records_skipped += 1;
                    summary.add_error(
                        ExportError::new(ExportErrorType::DataQuality, reason)
                            .with_context(format!("invoice_no={}", record.invoice_no)),
                    );
                }
                Verdict::Failed(e) => {
                    result.records_failed += 1;
                    tracing::error!(
                        tenant_id = %record.tenant_id,
                        invoice_no = %record.invoice_no,
                        error = %e,
                        "Record write failed"
                    );
                    summary.add_error(
                        ExportError::new(ExportErrorType::Write, e.to_string())
                            .with_context(e.path.display().to_string()),
                    );
                }
            }
        }

        Drain::Completed
    }

    async fn execute_full(&self) -> Result<ExportSummary> {
        let start_time = Instant::now();
        let mut summary = ExportSummary::new(ExportMode::Full, self.dry_run);

        self.enter(ExportPhase::PreChecking);
        self.preflight.run(self.source.as_ref()).await?;

        self.enter(ExportPhase::Streaming);
        let query = QuerySpec::full(self.tenant_filter);
        let stream = self.source.fetch(&query).await?;

        let shutdown = self.shutdown.clone();
        let materializer = Arc::clone(&self.materializer);
        let mut groups = GroupLimit::new(self.group_limit);
        let mut results = stream
            .take_while(move |item| futures::future::ready(groups.admit(item)))
            .take_while(move |_| futures::future::ready(!*shutdown.borrow()))
            .map(move |item| {
                let materializer = Arc::clone(&materializer);
                async move {
                    let record = item?;
                    let outcome = materializer.materialize(&record).await;
                    Ok::<_, InvexError>((record, outcome))
                }
            })
            .buffer_unordered(self.threads);

        let mut broken = None;
        while let Some(item) = results.next().await {
            let (record, outcome) = match item {
                Ok(done) => done,
                Err(e) => {
                    broken = Some(e);
                    break;
                }
            };
            summary.records_seen += 1;

            match Verdict::from(outcome) {
                Verdict::Exported => summary.records_exported += 1,
                Verdict::Skipped(reason) => {
                    summary.records_skipped += 1;
                    summary.add_error(
                        ExportError::new(ExportErrorType::DataQuality, reason)
                            .with_context(format!("invoice_no={}", record.invoice_no)),
                    );
                }
                Verdict::Failed(e) => {
                    summary.records_failed += 1;
                    tracing::error!(
                        tenant_id = %record.tenant_id,
                        invoice_no = %record.invoice_no,
                        error = %e,
                        "Record write failed"
                    );
                    summary.add_error(
                        ExportError::new(ExportErrorType::Write, e.to_string())
                            .with_context(e.path.display().to_string()),
                    );
                }
            }

            if summary.records_seen % 1000 == 0 {
                tracing::info!(
                    records_seen = summary.records_seen,
                    records_exported = summary.records_exported,
                    "Export progress"
                );
            }
        }

        if let Some(e) = broken {
            tracing::error!(error = %e, "Source stream broke off");
            return Err(e);
        }

        if self.shutdown_requested() {
            tracing::warn!("Shutdown requested, full export stopped early");
            summary.interrupted = true;
        }

        Ok(summary.with_duration(start_time.elapsed()))
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn enter(&self, phase: ExportPhase) {
        let mut current = self.phase.lock().unwrap_or_else(|p| p.into_inner());
        tracing::debug!(from = %*current, to = %phase, "Export phase");
        *current = phase;
    }
}
