//! Export orchestration
//!
//! This module provides the core export logic for Invex, including:
//! - Export coordination for full and incremental runs
//! - Record materialization into the output tree
//! - Pre-flight checks
//! - Summary and reporting

pub mod coordinator;
pub mod materializer;
pub mod preflight;
pub mod summary;

pub use coordinator::{ExportCoordinator, ExportPhase};
pub use materializer::{MaterializeOutcome, RecordMaterializer};
pub use preflight::PreflightChecks;
pub use summary::{ExportError, ExportErrorType, ExportSummary, TenantOutcome, TenantResult};
