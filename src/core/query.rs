//! What a run asks the source for
//!
//! A [`QuerySpec`] states which records a run wants and in what order,
//! independently of the source that will answer it. Source adapters render
//! it into their own query language; [`QuerySpec::matches`] is the reference
//! semantics they must agree with.

use crate::config::ExportMode;
use crate::domain::ids::TenantId;
use crate::domain::record::InvoiceRecord;
use crate::domain::{InvexError, Result};
use chrono::NaiveDateTime;
use std::cmp::Ordering;

/// Issue status of an invoice that has been issued
pub const ISSUED_STATUS: i32 = 3;

/// Mutation-time window of an incremental query
///
/// Open at the lower end, closed at the upper end: a record updated exactly
/// at the previous boundary was already exported by the previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Exclusive lower bound (previous watermark)
    pub after: NaiveDateTime,
    /// Inclusive upper bound (this run's boundary)
    pub up_to: NaiveDateTime,
}

impl TimeWindow {
    /// Whether a mutation time falls inside the window
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.after < t && t <= self.up_to
    }

    /// A window whose lower bound is not below its upper bound selects nothing
    pub fn is_empty(&self) -> bool {
        self.after >= self.up_to
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    /// tenant, country, issue date, invoice number
    Partitioned,
    /// mutation time, invoice number
    Chronological,
}

/// What to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// Mode this query was built for
    pub mode: ExportMode,
    /// Tenant filter; always set for incremental queries
    pub tenant: Option<TenantId>,
    /// Mutation-time window; only for incremental queries
    pub window: Option<TimeWindow>,
    /// Result ordering
    pub order: RecordOrder,
}

impl QuerySpec {
    /// Full-export query over every eligible record
    pub fn full(tenant: Option<TenantId>) -> Self {
        Self {
            mode: ExportMode::Full,
            tenant,
            window: None,
            order: RecordOrder::Partitioned,
        }
    }

    /// Incremental query for one tenant over `(last_watermark, boundary]`
    pub fn incremental(
        tenant: TenantId,
        last_watermark: NaiveDateTime,
        boundary: NaiveDateTime,
    ) -> Self {
        Self {
            mode: ExportMode::Incremental,
            tenant: Some(tenant),
            window: Some(TimeWindow {
                after: last_watermark,
                up_to: boundary,
            }),
            order: RecordOrder::Chronological,
        }
    }

    /// Build a query for the given mode
    ///
    /// # Errors
    ///
    /// Incremental queries are always scoped to one tenant; omitting it is a
    /// configuration error.
    pub fn build(
        mode: ExportMode,
        tenant: Option<TenantId>,
        last_watermark: NaiveDateTime,
        boundary: NaiveDateTime,
    ) -> Result<Self> {
        match mode {
            ExportMode::Full => Ok(Self::full(tenant)),
            ExportMode::Incremental => {
                let tenant = tenant.ok_or_else(|| {
                    InvexError::Configuration(
                        "Incremental queries require a tenant".to_string(),
                    )
                })?;
                Ok(Self::incremental(tenant, last_watermark, boundary))
            }
        }
    }

    /// Whether the query can return rows at all
    pub fn is_empty(&self) -> bool {
        self.window.map(|w| w.is_empty()).unwrap_or(false)
    }

    /// Evaluate the selection predicate against a record
    ///
    /// Covers eligibility (non-empty invoice number and payload), the tenant
    /// filter and the time window. The issue-status filter is applied by
    /// the source since records do not carry it.
    pub fn matches(&self, record: &InvoiceRecord) -> bool {
        if record.invoice_no.is_empty() || record.payload.is_empty() {
            return false;
        }
        if let Some(tenant) = self.tenant {
            if record.tenant_id != tenant {
                return false;
            }
        }
        if let Some(window) = self.window {
            if !window.contains(record.updated_at) {
                return false;
            }
        }
        true
    }

    /// Compare two records by this query's ordering
    pub fn compare(&self, a: &InvoiceRecord, b: &InvoiceRecord) -> Ordering {
        match self.order {
            RecordOrder::Partitioned => a
                .tenant_id
                .cmp(&b.tenant_id)
                .then_with(|| a.country.cmp(&b.country))
                .then_with(|| a.issue_date.cmp(&b.issue_date))
                .then_with(|| a.invoice_no.cmp(&b.invoice_no)),
            RecordOrder::Chronological => a
                .updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.invoice_no.cmp(&b.invoice_no)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn record(tenant: i64, no: &str, updated_at: NaiveDateTime) -> InvoiceRecord {
        InvoiceRecord::new(
            TenantId::new(tenant).unwrap(),
            Some("DE".to_string()),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            no,
            "{}",
            updated_at,
        )
    }

    #[test]
    fn test_window_is_open_closed() {
        let q = QuerySpec::incremental(TenantId::new(7).unwrap(), at(10, 0, 0), at(10, 5, 0));

        assert!(!q.matches(&record(7, "A", at(10, 0, 0))));
        assert!(q.matches(&record(7, "B", at(10, 0, 1))));
        assert!(q.matches(&record(7, "C", at(10, 5, 0))));
        assert!(!q.matches(&record(7, "D", at(10, 5, 1))));
    }

    #[test]
    fn test_incremental_filters_tenant() {
        let q = QuerySpec::incremental(TenantId::new(7).unwrap(), at(9, 0, 0), at(10, 5, 0));
        assert!(!q.matches(&record(9, "A", at(10, 0, 0))));
    }

    #[test]
    fn test_full_ignores_time() {
        let q = QuerySpec::full(None);
        assert!(q.matches(&record(9, "A", at(23, 59, 59))));
        assert!(!q.matches(&record(9, "", at(1, 0, 0))));
    }

    #[test]
    fn test_build_incremental_requires_tenant() {
        let result = QuerySpec::build(ExportMode::Incremental, None, at(9, 0, 0), at(10, 0, 0));
        assert!(result.is_err());

        let q = QuerySpec::build(
            ExportMode::Incremental,
            Some(TenantId::new(7).unwrap()),
            at(9, 0, 0),
            at(10, 0, 0),
        )
        .unwrap();
        assert_eq!(q.order, RecordOrder::Chronological);
    }

    #[test]
    fn test_empty_window() {
        let q = QuerySpec::incremental(TenantId::new(7).unwrap(), at(10, 5, 0), at(10, 5, 0));
        assert!(q.is_empty());
        assert!(!QuerySpec::full(None).is_empty());
    }

    #[test]
    fn test_chronological_order() {
        let q = QuerySpec::incremental(TenantId::new(7).unwrap(), at(9, 0, 0), at(11, 0, 0));
        let mut records = vec![
            record(7, "B", at(10, 0, 0)),
            record(7, "C", at(9, 30, 0)),
            record(7, "A", at(10, 0, 0)),
        ];
        records.sort_by(|a, b| q.compare(a, b));
        let order: Vec<&str> = records.iter().map(|r| r.invoice_no.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }
}
