// Invex - Incremental Invoice Exporter
// Copyright (c) 2025 Invex Contributors
// Licensed under the MIT License

//! # Invex - Incremental Invoice Exporter
//!
//! Invex copies issued invoices from a multi-tenant PostgreSQL table into a
//! file tree, one JSON document per invoice, laid out as
//! `<output_dir>/<tenant>/<country>/<invoice>.json`.
//!
//! ## Overview
//!
//! - **Full** mode exports every issued invoice, optionally limited to one
//!   tenant or to the first few (tenant, country) groups. It keeps no state.
//! - **Incremental** mode exports, per tenant, only the invoices updated
//!   after that tenant's checkpoint and no later than a single run
//!   boundary (`now - safety_window`). A checkpoint is written for every
//!   tenant, including tenants whose query failed.
//!
//! Incremental runs are mutually exclusive through a directory lock, and
//! the checkpoint store is always rewritten atomically.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and exit codes
//! - [`core`] - Export orchestration, checkpoints, lock, run boundary
//! - [`adapters`] - Record sources (PostgreSQL, in-memory)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invex::adapters::PostgresSource;
//! use invex::config::load_config;
//! use invex::core::export::ExportCoordinator;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("invex.toml")?;
//!     let source = Arc::new(PostgresSource::new(&config.source)?);
//!     let (_tx, shutdown) = tokio::sync::watch::channel(false);
//!
//!     let summary = ExportCoordinator::new(&config, source, shutdown)?
//!         .execute_export()
//!         .await?;
//!
//!     println!("Exported {} invoices", summary.records_exported);
//!     Ok(())
//! }
//! ```
//!
//! ## Checkpoints
//!
//! Each tenant has one line in the checkpoint store:
//!
//! ```text
//! 1001|2025-03-01 09:55:00|42|SUCCESS
//! 1002|2025-03-01 09:55:00|0|FAILED
//! ```
//!
//! ```rust,no_run
//! use invex::core::state::{FileCheckpointStore, StateManager};
//! use invex::domain::TenantId;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileCheckpointStore::new("state/invoice_checkpoints.dat"));
//! let state = StateManager::new(store, false);
//!
//! let watermark = state.load_watermark(TenantId::new(1001)?).await?;
//! println!("Next run picks up invoices updated after {watermark}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::InvexError`]:
//!
//! ```rust,no_run
//! use invex::domain::InvexError;
//!
//! fn example() -> Result<(), InvexError> {
//!     let _config = invex::config::load_config("invex.toml")?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
