//! Extracted invoice record
//!
//! A record is produced by the source query, handed to the materializer and
//! discarded once written. It is never persisted by the sync engine itself.

use crate::domain::ids::TenantId;
use chrono::{NaiveDate, NaiveDateTime};

/// One issued invoice as returned by the source store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRecord {
    /// Owning tenant
    pub tenant_id: TenantId,

    /// Country sub-category; `None` or empty when the source has no value
    pub country: Option<String>,

    /// Issue date, used in the output file name
    pub issue_date: NaiveDate,

    /// Human-readable invoice number, unique per record
    pub invoice_no: String,

    /// Opaque payload, written verbatim
    pub payload: String,

    /// Mutation time of the source row
    pub updated_at: NaiveDateTime,
}

impl InvoiceRecord {
    /// Create a new record
    pub fn new(
        tenant_id: TenantId,
        country: Option<String>,
        issue_date: NaiveDate,
        invoice_no: impl Into<String>,
        payload: impl Into<String>,
        updated_at: NaiveDateTime,
    ) -> Self {
        Self {
            tenant_id,
            country,
            issue_date,
            invoice_no: invoice_no.into(),
            payload: payload.into(),
            updated_at,
        }
    }

    /// Country code if present and non-blank
    pub fn country_code(&self) -> Option<&str> {
        self.country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}
