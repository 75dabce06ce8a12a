//! External system integrations for Invex.
//!
//! - [`source`] - The record source contract the exporter reads through
//! - [`postgresql`] - PostgreSQL implementation
//! - [`memory`] - In-process implementation with failure injection
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies
//! and enable testing without a database. The exporter only sees
//! `Arc<dyn RecordSource>`.
//!
//! ```rust,no_run
//! use invex::adapters::{PostgresSource, RecordSource};
//! use invex::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("invex.toml")?;
//! let source = PostgresSource::new(&config.source)?;
//! source.test_connection().await?;
//! let tenants = source.distinct_tenants().await?;
//! println!("{} tenants with issued invoices", tenants.len());
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod postgresql;
pub mod source;

pub use memory::MemorySource;
pub use postgresql::PostgresSource;
pub use source::{RecordSource, RecordStream};
