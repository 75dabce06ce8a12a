//! Core business logic for Invex.
//!
//! # Modules
//!
//! - [`export`] - Export orchestration, materialization and reporting
//! - [`state`] - Per-tenant checkpoints and their persistence
//! - [`boundary`] - Upper bound of an incremental run
//! - [`lock`] - Mutual exclusion between incremental runs
//! - [`query`] - What a run extracts from the source
//!
//! # Incremental Workflow
//!
//! 1. **Lock**: Take the process lock, or give up if another run holds it
//! 2. **Initialize**: Validate and back up the checkpoint store, compute one boundary
//! 3. **Per tenant**: Read the watermark, query `(watermark, boundary]`, write files
//! 4. **Checkpoint**: Record SUCCESS or FAILED for the tenant at the boundary
//! 5. **Finalize**: Release the lock and report
//!
//! # Example
//!
//! ```rust,no_run
//! use invex::adapters::PostgresSource;
//! use invex::config::load_config;
//! use invex::core::export::ExportCoordinator;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("invex.toml")?;
//! let source = Arc::new(PostgresSource::new(&config.source)?);
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let coordinator = ExportCoordinator::new(&config, source, shutdown_rx)?;
//!
//! let summary = coordinator.execute_export().await?;
//! println!("Exported: {}", summary.records_exported);
//! println!("Failed tenants: {}", summary.tenants_failed);
//! # Ok(())
//! # }
//! ```

pub mod boundary;
pub mod export;
pub mod lock;
pub mod query;
pub mod state;
