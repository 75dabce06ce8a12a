//! Record source abstraction
//!
//! This module defines the trait that source adapters must implement to feed
//! the exporter.

use crate::core::query::QuerySpec;
use crate::domain::ids::TenantId;
use crate::domain::record::InvoiceRecord;
use crate::domain::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazily produced query result
///
/// Rows arrive one at a time so memory stays bounded by a single record. An
/// `Err` item means the query itself broke off mid-way.
pub type RecordStream = BoxStream<'static, Result<InvoiceRecord>>;

/// Source of invoice records
///
/// Implementations apply the issue-status filter themselves and must honour
/// [`QuerySpec::matches`] and [`QuerySpec::compare`] for everything else.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Check that the source is reachable
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be contacted.
    async fn test_connection(&self) -> Result<()>;

    /// Every tenant that owns at least one eligible record, ascending
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant list cannot be queried.
    async fn distinct_tenants(&self) -> Result<Vec<TenantId>>;

    /// Execute a query
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be started.
    async fn fetch(&self, query: &QuerySpec) -> Result<RecordStream>;

    /// Short name for logs
    fn name(&self) -> &str;
}
