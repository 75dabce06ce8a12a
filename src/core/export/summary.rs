//! Export summary and reporting
//!
//! This module defines structures for tracking and reporting export results.

use crate::config::ExportMode;
use crate::core::state::checkpoint::Checkpoint;
use crate::domain::ids::TenantId;
use chrono::NaiveDateTime;
use std::time::Duration;

/// Errors kept in full on a summary; later ones are only counted
pub const MAX_RECORDED_ERRORS: usize = 100;

/// How a tenant's run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantOutcome {
    /// Every record was attempted
    Completed,
    /// The tenant's query failed
    Failed,
    /// Shutdown was requested before the tenant finished
    Interrupted,
}

/// Per-tenant result of an incremental run
#[derive(Debug, Clone)]
pub struct TenantResult {
    /// Tenant
    pub tenant_id: TenantId,

    /// How the tenant's run ended
    pub outcome: TenantOutcome,

    /// Watermark the query started from
    pub watermark_before: NaiveDateTime,

    /// Checkpoint written (or, in dry run, that would have been written)
    pub checkpoint: Option<Checkpoint>,

    /// Records returned by the query
    pub records_seen: u64,

    /// Records written
    pub records_exported: u64,

    /// Records whose write failed
    pub records_failed: u64,

    /// Records rejected by the payload check
    pub records_skipped: u64,
}

impl TenantResult {
    /// Create an empty result for a tenant
    pub fn new(tenant_id: TenantId, watermark_before: NaiveDateTime) -> Self {
        Self {
            tenant_id,
            outcome: TenantOutcome::Completed,
            watermark_before,
            checkpoint: None,
            records_seen: 0,
            records_exported: 0,
            records_failed: 0,
            records_skipped: 0,
        }
    }
}

/// Summary of an export operation
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Mode the run executed in
    pub mode: ExportMode,

    /// Whether writes were suppressed
    pub dry_run: bool,

    /// Upper bound used by every tenant query (incremental only)
    pub boundary: Option<NaiveDateTime>,

    /// Tenants whose run completed
    pub tenants_processed: usize,

    /// Tenants whose query failed
    pub tenants_failed: usize,

    /// Records returned by the source
    pub records_seen: u64,

    /// Records written (or, in dry run, that would have been written)
    pub records_exported: u64,

    /// Records whose write failed
    pub records_failed: u64,

    /// Records rejected by the payload check
    pub records_skipped: u64,

    /// Duration of the export
    pub duration: Duration,

    /// Whether a shutdown signal cut the run short
    pub interrupted: bool,

    /// Per-tenant detail (incremental only)
    pub tenant_results: Vec<TenantResult>,

    /// Errors encountered during export, at most [`MAX_RECORDED_ERRORS`]
    pub errors: Vec<ExportError>,

    /// Errors beyond the recorded ones
    pub errors_dropped: u64,
}

impl ExportSummary {
    /// Create a new empty export summary
    pub fn new(mode: ExportMode, dry_run: bool) -> Self {
        Self {
            mode,
            dry_run,
            boundary: None,
            tenants_processed: 0,
            tenants_failed: 0,
            records_seen: 0,
            records_exported: 0,
            records_failed: 0,
            records_skipped: 0,
            duration: Duration::from_secs(0),
            interrupted: false,
            tenant_results: Vec::new(),
            errors: Vec::new(),
            errors_dropped: 0,
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add an error, counting it only once the list is full
    pub fn add_error(&mut self, error: ExportError) {
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(error);
        } else {
            self.errors_dropped += 1;
        }
    }

    /// Every error seen, recorded or not
    pub fn error_count(&self) -> u64 {
        self.errors.len() as u64 + self.errors_dropped
    }

    /// Fold a tenant's result into the totals
    pub fn add_tenant_result(&mut self, result: TenantResult) {
        match result.outcome {
            TenantOutcome::Completed => self.tenants_processed += 1,
            TenantOutcome::Failed => self.tenants_failed += 1,
            TenantOutcome::Interrupted => self.interrupted = true,
        }
        self.records_seen += result.records_seen;
        self.records_exported += result.records_exported;
        self.records_failed += result.records_failed;
        self.records_skipped += result.records_skipped;
        self.tenant_results.push(result);
    }

    /// Check if the export was clean: no failed tenants, no failed writes,
    /// not interrupted
    pub fn is_successful(&self) -> bool {
        self.tenants_failed == 0 && self.records_failed == 0 && !self.interrupted
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            mode = %self.mode,
            dry_run = self.dry_run,
            boundary = ?self.boundary,
            tenants_processed = self.tenants_processed,
            tenants_failed = self.tenants_failed,
            records_seen = self.records_seen,
            records_exported = self.records_exported,
            records_failed = self.records_failed,
            records_skipped = self.records_skipped,
            duration_secs = self.duration.as_secs_f64(),
            interrupted = self.interrupted,
            "Export completed"
        );

        for tenant in &self.tenant_results {
            tracing::debug!(
                tenant_id = %tenant.tenant_id,
                outcome = ?tenant.outcome,
                watermark_before = %tenant.watermark_before,
                checkpoint = ?tenant.checkpoint.as_ref().map(Checkpoint::to_line),
                exported = tenant.records_exported,
                failed = tenant.records_failed,
                "Tenant result"
            );
        }

        if self.error_count() > 0 {
            tracing::warn!(
                error_count = self.error_count(),
                errors_dropped = self.errors_dropped,
                "Export completed with errors"
            );
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    context = ?error.context,
                    "Export error"
                );
            }
        }
    }
}

/// Type of export error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportErrorType {
    /// Source query error
    Query,
    /// File write error
    Write,
    /// Checkpoint store error
    State,
    /// Payload rejected by the data-quality check
    DataQuality,
}

/// Export error with context
#[derive(Debug, Clone)]
pub struct ExportError {
    /// Type of error
    pub error_type: ExportErrorType,

    /// Error message
    pub message: String,

    /// Optional context (e.g., tenant, invoice number, path)
    pub context: Option<String>,
}

impl ExportError {
    /// Create a new export error
    pub fn new(error_type: ExportErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            context: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }
}
