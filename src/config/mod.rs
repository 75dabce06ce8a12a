//! Configuration management for Invex.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Invex uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `INVEX_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Per-section validation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use invex::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("invex.toml")?;
//!
//! println!("Export mode: {}", config.export.mode);
//! println!("Output root: {}", config.export.output_dir);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`SourceConfig`] - PostgreSQL connection and invoice table
//! - [`ExportConfig`] - Mode, dry run, output root, concurrency, safety window
//! - [`StateConfig`] - Checkpoint store and lock locations
//! - [`PreflightConfig`] - Run precondition thresholds
//! - [`LoggingConfig`] - Local log files
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [source]
//! connection_string = "${INVEX_DATABASE_URL}"
//! table = "t_invoice"
//!
//! [export]
//! mode = "incremental"
//! output_dir = "context/invoices"
//! safety_window_seconds = 300
//!
//! [state]
//! checkpoint_path = "state/invoice_checkpoints.dat"
//! lock_path = "state/invoice_export.lock"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, ExportConfig, ExportMode, FailedWatermarkPolicy, InvexConfig,
    LoggingConfig, PreflightConfig, SourceConfig, StateConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
