//! PostgreSQL record source
//!
//! Renders a [`QuerySpec`] into parameterised SQL against the invoice table
//! and streams the rows back.

use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::source::{RecordSource, RecordStream};
use crate::config::SourceConfig;
use crate::core::query::{QuerySpec, RecordOrder, ISSUED_STATUS};
use crate::domain::ids::TenantId;
use crate::domain::record::InvoiceRecord;
use crate::domain::{InvexError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures::StreamExt;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

type SqlParam = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL-backed record source
pub struct PostgresSource {
    client: PostgreSQLClient,
    table: String,
}

impl PostgresSource {
    /// Create a source from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: PostgreSQLClient::new(config)?,
            table: config.table.clone(),
        })
    }
}

#[async_trait]
impl RecordSource for PostgresSource {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn distinct_tenants(&self) -> Result<Vec<TenantId>> {
        let client = self.client.get_connection().await?;
        let sql = format!(
            "SELECT DISTINCT ftenant_id FROM {} WHERE {} ORDER BY ftenant_id",
            self.table,
            eligibility_predicate()
        );

        let rows = client
            .query(sql.as_str(), &[])
            .await
            .map_err(|e| InvexError::Source(format!("Tenant listing failed: {e}")))?;

        rows.iter()
            .map(|row| {
                let raw: i64 = row
                    .try_get("ftenant_id")
                    .map_err(|e| InvexError::Source(format!("Invalid tenant id column: {e}")))?;
                TenantId::new(raw).map_err(InvexError::Source)
            })
            .collect()
    }

    async fn fetch(&self, query: &QuerySpec) -> Result<RecordStream> {
        let (sql, params) = render_select(&self.table, query);
        tracing::debug!(sql = %sql, "Executing extraction query");

        let client = self.client.get_connection().await?;
        let rows = client
            .query_raw(sql.as_str(), params)
            .await
            .map_err(|e| InvexError::Source(format!("Extraction query failed: {e}")))?;

        // The pooled connection rides along with the stream so it is not
        // recycled while rows are still arriving.
        let stream = rows.map(move |row| {
            let _connection = &client;
            row.map_err(|e| InvexError::Source(format!("Failed to read row: {e}")))
                .and_then(|row| decode_row(&row))
        });

        Ok(stream.boxed())
    }

    fn name(&self) -> &str {
        "postgresql"
    }
}

fn eligibility_predicate() -> String {
    format!(
        "fissue_status = {ISSUED_STATUS} \
         AND fext_field IS NOT NULL AND LENGTH(fext_field) > 0 \
         AND finvoice_no IS NOT NULL AND LENGTH(finvoice_no) > 0 \
         AND fissue_date IS NOT NULL"
    )
}

/// Render a query into SQL text and its positional parameters
fn render_select(table: &str, query: &QuerySpec) -> (String, Vec<SqlParam>) {
    let mut params: Vec<SqlParam> = Vec::new();
    let mut sql = format!(
        "SELECT ftenant_id, fcountry, fissue_date, finvoice_no, fext_field, \
         COALESCE(fupdate_time, TIMESTAMP '1970-01-01 00:00:00') AS fupdate_time \
         FROM {table} WHERE {}",
        eligibility_predicate()
    );

    if let Some(tenant) = query.tenant {
        params.push(Box::new(tenant.get()));
        sql.push_str(&format!(" AND ftenant_id = ${}", params.len()));
    }

    if let Some(window) = query.window {
        params.push(Box::new(window.after));
        sql.push_str(&format!(" AND fupdate_time > ${}", params.len()));
        params.push(Box::new(window.up_to));
        sql.push_str(&format!(" AND fupdate_time <= ${}", params.len()));
    }

    sql.push_str(match query.order {
        RecordOrder::Partitioned => " ORDER BY ftenant_id, fcountry, fissue_date, finvoice_no",
        RecordOrder::Chronological => " ORDER BY fupdate_time, finvoice_no",
    });

    (sql, params)
}

fn decode_row(row: &Row) -> Result<InvoiceRecord> {
    let column = |name: &str, e: tokio_postgres::Error| {
        InvexError::Source(format!("Invalid value in column {name}: {e}"))
    };

    let tenant: i64 = row.try_get("ftenant_id").map_err(|e| column("ftenant_id", e))?;
    let country: Option<String> = row.try_get("fcountry").map_err(|e| column("fcountry", e))?;
    let issue_date: NaiveDate = row
        .try_get("fissue_date")
        .map_err(|e| column("fissue_date", e))?;
    let invoice_no: String = row
        .try_get("finvoice_no")
        .map_err(|e| column("finvoice_no", e))?;
    let payload: String = row.try_get("fext_field").map_err(|e| column("fext_field", e))?;
    let updated_at: NaiveDateTime = row
        .try_get("fupdate_time")
        .map_err(|e| column("fupdate_time", e))?;

    Ok(InvoiceRecord::new(
        TenantId::new(tenant).map_err(InvexError::Source)?,
        country,
        issue_date,
        invoice_no,
        payload,
        updated_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_render_full() {
        let (sql, params) = render_select("t_invoice", &QuerySpec::full(None));
        assert!(sql.contains("FROM t_invoice WHERE fissue_status = 3"));
        assert!(sql.ends_with("ORDER BY ftenant_id, fcountry, fissue_date, finvoice_no"));
        assert!(!sql.contains("fupdate_time >"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_render_full_with_tenant() {
        let query = QuerySpec::full(Some(TenantId::new(7).unwrap()));
        let (sql, params) = render_select("billing.t_invoice", &query);
        assert!(sql.contains("FROM billing.t_invoice WHERE"));
        assert!(sql.contains("AND ftenant_id = $1"));
        assert!(sql.ends_with("ORDER BY ftenant_id, fcountry, fissue_date, finvoice_no"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_render_incremental() {
        let query = QuerySpec::incremental(TenantId::new(7).unwrap(), at(9), at(10));
        let (sql, params) = render_select("t_invoice", &query);
        assert!(sql.contains("AND ftenant_id = $1"));
        assert!(sql.contains("AND fupdate_time > $2"));
        assert!(sql.contains("AND fupdate_time <= $3"));
        assert!(sql.ends_with("ORDER BY fupdate_time, finvoice_no"));
        assert_eq!(params.len(), 3);
    }
}
