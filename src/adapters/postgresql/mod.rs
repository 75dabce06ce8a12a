//! PostgreSQL source integration
//!
//! This module provides the invoice source backed by PostgreSQL.

pub mod client;
pub mod source;

pub use client::PostgreSQLClient;
pub use source::PostgresSource;
