//! In-process record source
//!
//! Holds records in memory and answers queries with the reference semantics
//! of [`QuerySpec`]. Failures can be injected per tenant, which makes it the
//! source of choice for exercising the exporter's failure paths.

use crate::adapters::source::{RecordSource, RecordStream};
use crate::core::query::QuerySpec;
use crate::domain::ids::TenantId;
use crate::domain::record::InvoiceRecord;
use crate::domain::{InvexError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

/// In-memory record source
#[derive(Default)]
pub struct MemorySource {
    records: Mutex<Vec<InvoiceRecord>>,
    failing_tenants: Mutex<HashSet<TenantId>>,
    // Tenant -> number of rows delivered before the stream breaks
    broken_streams: Mutex<HashMap<TenantId, usize>>,
    unreachable: Mutex<bool>,
    executed: Mutex<Vec<QuerySpec>>,
}

impl MemorySource {
    /// Create a source holding the given records
    pub fn new(records: Vec<InvoiceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Add or replace a record (matched on tenant and invoice number)
    pub fn upsert(&self, record: InvoiceRecord) {
        let mut records = lock(&self.records);
        match records
            .iter_mut()
            .find(|r| r.tenant_id == record.tenant_id && r.invoice_no == record.invoice_no)
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Make every query for this tenant fail
    pub fn fail_tenant(&self, tenant: TenantId) {
        lock(&self.failing_tenants).insert(tenant);
    }

    /// Undo [`MemorySource::fail_tenant`]
    pub fn heal_tenant(&self, tenant: TenantId) {
        lock(&self.failing_tenants).remove(&tenant);
    }

    /// Break this tenant's result stream after `rows` records
    pub fn break_stream_after(&self, tenant: TenantId, rows: usize) {
        lock(&self.broken_streams).insert(tenant, rows);
    }

    /// Make the connection test and tenant listing fail
    pub fn set_unreachable(&self, unreachable: bool) {
        *lock(&self.unreachable) = unreachable;
    }

    /// Queries executed so far, in order
    pub fn executed_queries(&self) -> Vec<QuerySpec> {
        lock(&self.executed).clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if *lock(&self.unreachable) {
            return Err(InvexError::Source("memory source is unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn test_connection(&self) -> Result<()> {
        self.check_reachable()
    }

    async fn distinct_tenants(&self) -> Result<Vec<TenantId>> {
        self.check_reachable()?;
        let any = QuerySpec::full(None);
        let tenants: BTreeSet<TenantId> = lock(&self.records)
            .iter()
            .filter(|r| any.matches(r))
            .map(|r| r.tenant_id)
            .collect();
        Ok(tenants.into_iter().collect())
    }

    async fn fetch(&self, query: &QuerySpec) -> Result<RecordStream> {
        lock(&self.executed).push(query.clone());
        self.check_reachable()?;

        if let Some(tenant) = query.tenant {
            if lock(&self.failing_tenants).contains(&tenant) {
                return Err(InvexError::Source(format!(
                    "query for tenant {tenant} failed"
                )));
            }
        }

        let mut rows: Vec<InvoiceRecord> = lock(&self.records)
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| query.compare(a, b));

        let mut items: Vec<Result<InvoiceRecord>> = rows.into_iter().map(Ok).collect();
        if let Some(tenant) = query.tenant {
            if let Some(&after) = lock(&self.broken_streams).get(&tenant) {
                items.truncate(after);
                items.push(Err(InvexError::Source(format!(
                    "result stream for tenant {tenant} broke after {after} rows"
                ))));
            }
        }

        Ok(stream::iter(items).boxed())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// A poisoned mutex only means a test panicked elsewhere; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
