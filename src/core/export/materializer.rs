//! Record materializer
//!
//! Turns one extracted record into one file:
//!
//! ```text
//! <root>/<tenant_id>/<country or UNKNOWN>/<YYYYMMDD>+<sanitized invoice_no>.json[.gz]
//! ```
//!
//! The payload is written byte for byte. Re-exporting a record overwrites
//! the previous file, so repeated runs converge on the same tree.

use crate::config::ExportConfig;
use crate::domain::record::InvoiceRecord;
use crate::domain::WriteError;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory used for records without a country
pub const UNKNOWN_COUNTRY: &str = "UNKNOWN";

const FORBIDDEN_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// What happened to a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// File written
    Written(PathBuf),
    /// Dry run: destination derived, nothing written
    DryRun(PathBuf),
    /// Payload rejected by the data-quality check
    Skipped {
        /// Destination the record would have gone to
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },
}

impl MaterializeOutcome {
    /// Whether the record counts as exported
    pub fn is_exported(&self) -> bool {
        matches!(
            self,
            MaterializeOutcome::Written(_) | MaterializeOutcome::DryRun(_)
        )
    }
}

/// Writes records into the output tree
#[derive(Debug, Clone)]
pub struct RecordMaterializer {
    root: PathBuf,
    dry_run: bool,
    compress: bool,
    required_fields: Vec<String>,
}

impl RecordMaterializer {
    /// Create a materializer writing under `root`
    pub fn new(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            root: root.into(),
            dry_run,
            compress: false,
            required_fields: Vec::new(),
        }
    }

    /// Build from the export configuration
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(&config.output_dir, config.dry_run)
            .with_compression(config.compress)
            .with_required_fields(config.required_payload_fields.clone())
    }

    /// Gzip payloads
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Require these top-level keys in every JSON payload
    pub fn with_required_fields(mut self, fields: Vec<String>) -> Self {
        self.required_fields = fields;
        self
    }

    /// Output root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination of a record
    pub fn target_path(&self, record: &InvoiceRecord) -> PathBuf {
        let country = record
            .country_code()
            .and_then(path_component)
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

        let extension = if self.compress { "json.gz" } else { "json" };
        let file_name = format!(
            "{}+{}.{extension}",
            record.issue_date.format("%Y%m%d"),
            sanitize_file_name(&record.invoice_no)
        );

        self.root
            .join(record.tenant_id.to_string())
            .join(country)
            .join(file_name)
    }

    /// Materialize one record
    ///
    /// # Errors
    ///
    /// Returns a [`WriteError`] naming the destination when the directory
    /// or file cannot be written. The caller decides whether that is fatal.
    pub async fn materialize(
        &self,
        record: &InvoiceRecord,
    ) -> Result<MaterializeOutcome, WriteError> {
        let path = self.target_path(record);

        match record.country_code() {
            None => tracing::warn!(
                tenant_id = %record.tenant_id,
                invoice_no = %record.invoice_no,
                "Record has no country, filing under {UNKNOWN_COUNTRY}"
            ),
            Some(country) if path_component(country).is_none() => tracing::warn!(
                tenant_id = %record.tenant_id,
                invoice_no = %record.invoice_no,
                country = %country,
                "Record country is not a usable directory name, filing under {UNKNOWN_COUNTRY}"
            ),
            Some(_) => {}
        }

        if let Err(reason) = self.check_payload(&record.payload) {
            tracing::warn!(
                tenant_id = %record.tenant_id,
                invoice_no = %record.invoice_no,
                reason = %reason,
                "Skipping record with invalid payload"
            );
            return Ok(MaterializeOutcome::Skipped { path, reason });
        }

        if self.dry_run {
            tracing::debug!(dry_run = true, path = %path.display(), "Would write record");
            return Ok(MaterializeOutcome::DryRun(path));
        }

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| WriteError::new(dir, e))?;
        }

        let bytes = if self.compress {
            gzip(record.payload.as_bytes()).map_err(|e| WriteError::new(&path, e))?
        } else {
            record.payload.as_bytes().to_vec()
        };

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| WriteError::new(&path, e))?;

        tracing::trace!(path = %path.display(), "Record written");
        Ok(MaterializeOutcome::Written(path))
    }

    fn check_payload(&self, payload: &str) -> Result<(), String> {
        if self.required_fields.is_empty() {
            return Ok(());
        }

        let value: serde_json::Value =
            serde_json::from_str(payload).map_err(|e| format!("payload is not JSON: {e}"))?;
        let object = value
            .as_object()
            .ok_or_else(|| "payload is not a JSON object".to_string())?;

        let missing: Vec<&str> = self
            .required_fields
            .iter()
            .filter(|field| !object.contains_key(field.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(format!("payload lacks fields: {}", missing.join(", ")));
        }

        Ok(())
    }
}

/// Replace characters that are not allowed in file names with `_`
///
/// # Examples
///
/// ```
/// use invex::core::export::materializer::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("INV/2024:001"), "INV_2024_001");
/// ```
pub fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Sanitized name usable as a single directory below the tenant
///
/// `.` and `..` would climb out of the tenant directory, so they yield `None`.
fn path_component(raw: &str) -> Option<String> {
    let name = sanitize_file_name(raw);
    match name.as_str() {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TenantId;
    use chrono::NaiveDate;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;
    use test_case::test_case;

    fn record(country: Option<&str>, invoice_no: &str, payload: &str) -> InvoiceRecord {
        InvoiceRecord::new(
            TenantId::new(7).unwrap(),
            country.map(str::to_string),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            invoice_no,
            payload,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        )
    }

    #[test_case("INV-001", "INV-001" ; "plain")]
    #[test_case("A\\B/C:D*E?F\"G<H>I|J", "A_B_C_D_E_F_G_H_I_J" ; "every forbidden char")]
    #[test_case("發票 001", "發票 001" ; "unicode kept")]
    fn test_sanitize(raw: &str, expected: &str) {
        assert_eq!(sanitize_file_name(raw), expected);
    }

    #[test]
    fn test_target_path() {
        let m = RecordMaterializer::new("/out", false);
        let path = m.target_path(&record(Some("DE"), "INV/1", "{}"));
        assert_eq!(path, PathBuf::from("/out/7/DE/20240301+INV_1.json"));
    }

    #[test]
    fn test_target_path_unknown_country() {
        let m = RecordMaterializer::new("/out", false).with_compression(true);
        let path = m.target_path(&record(Some(" "), "INV-1", "{}"));
        assert_eq!(path, PathBuf::from("/out/7/UNKNOWN/20240301+INV-1.json.gz"));
    }

    #[test_case(".." ; "parent")]
    #[test_case("." ; "current")]
    fn test_target_path_dot_country(country: &str) {
        let m = RecordMaterializer::new("/out", false);
        let path = m.target_path(&record(Some(country), "INV-1", "{}"));
        assert_eq!(path, PathBuf::from("/out/7/UNKNOWN/20240301+INV-1.json"));
    }

    #[test]
    fn test_target_path_keeps_dotted_country_names() {
        let m = RecordMaterializer::new("/out", false);
        let path = m.target_path(&record(Some("..."), "..", "{}"));
        assert_eq!(path, PathBuf::from("/out/7/.../20240301+...json"));
    }

    #[tokio::test]
    async fn test_dot_country_stays_inside_tenant_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("out");
        let m = RecordMaterializer::new(&root, false);

        let outcome = m.materialize(&record(Some(".."), "INV-1", "{}")).await.unwrap();

        assert_eq!(
            outcome,
            MaterializeOutcome::Written(root.join("7/UNKNOWN/20240301+INV-1.json"))
        );
        assert!(!root.join("20240301+INV-1.json").exists());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_materialize_writes_verbatim() {
        let dir = TempDir::new().unwrap();
        let m = RecordMaterializer::new(dir.path(), false);
        let payload = "{\"amount\": 12.50,   \"currency\":\"EUR\"}";

        let outcome = m.materialize(&record(Some("FR"), "INV-1", payload)).await.unwrap();
        let MaterializeOutcome::Written(path) = outcome else {
            panic!("expected a write");
        };

        assert_eq!(std::fs::read_to_string(path).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_materialize_overwrites() {
        let dir = TempDir::new().unwrap();
        let m = RecordMaterializer::new(dir.path(), false);

        m.materialize(&record(None, "INV-1", "{\"v\":1}")).await.unwrap();
        m.materialize(&record(None, "INV-1", "{\"v\":2}")).await.unwrap();

        let path = dir.path().join("7/UNKNOWN/20240301+INV-1.json");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{\"v\":2}");
    }

    #[tokio::test]
    async fn test_materialize_compressed() {
        let dir = TempDir::new().unwrap();
        let m = RecordMaterializer::new(dir.path(), false).with_compression(true);

        let outcome = m.materialize(&record(Some("DE"), "INV-1", "{\"a\":1}")).await.unwrap();
        let MaterializeOutcome::Written(path) = outcome else {
            panic!("expected a write");
        };

        let mut decoded = String::new();
        GzDecoder::new(std::fs::File::open(path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let m = RecordMaterializer::new(dir.path().join("out"), true);

        let outcome = m.materialize(&record(Some("DE"), "INV-1", "{}")).await.unwrap();

        assert!(outcome.is_exported());
        assert!(matches!(outcome, MaterializeOutcome::DryRun(_)));
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_required_fields() {
        let dir = TempDir::new().unwrap();
        let m = RecordMaterializer::new(dir.path(), false)
            .with_required_fields(vec!["amount".to_string()]);

        let ok = m.materialize(&record(Some("DE"), "A", "{\"amount\":1}")).await.unwrap();
        assert!(ok.is_exported());

        let missing = m.materialize(&record(Some("DE"), "B", "{\"total\":1}")).await.unwrap();
        assert!(matches!(missing, MaterializeOutcome::Skipped { .. }));

        let not_json = m.materialize(&record(Some("DE"), "C", "<xml/>")).await.unwrap();
        assert!(!not_json.is_exported());
        assert!(!dir.path().join("7/DE/20240301+C.json").exists());
    }

    #[tokio::test]
    async fn test_write_failure_names_path() {
        let dir = TempDir::new().unwrap();
        // A file where the tenant directory should be
        std::fs::write(dir.path().join("7"), "not a directory").unwrap();
        let m = RecordMaterializer::new(dir.path(), false);

        let err = m.materialize(&record(Some("DE"), "INV-1", "{}")).await.unwrap_err();
        assert!(err.path.starts_with(dir.path()));
    }
}
