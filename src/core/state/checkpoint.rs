//! Checkpoint model for tracking per-tenant export state
//!
//! A checkpoint is the single durable record the exporter keeps for a tenant.
//! On disk each checkpoint is one pipe-delimited line:
//!
//! ```text
//! <tenant_id>|<YYYY-MM-DD HH:MM:SS>|<record_count>|<SUCCESS|FAILED>
//! ```

use crate::domain::ids::TenantId;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp format used in the checkpoint file
pub const CHECKPOINT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of a tenant's most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckpointStatus {
    /// Every record was attempted; per-record write failures do not change this
    Success,
    /// The tenant's query could not be executed
    Failed,
}

impl CheckpointStatus {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::Success => "SUCCESS",
            CheckpointStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(CheckpointStatus::Success),
            "FAILED" => Ok(CheckpointStatus::Failed),
            other => Err(format!("Unknown checkpoint status '{other}'")),
        }
    }
}

/// Per-tenant checkpoint
///
/// # Examples
///
/// ```
/// use invex::core::state::checkpoint::{Checkpoint, CheckpointStatus};
///
/// let line = "7|2024-03-01 10:05:00|2|SUCCESS";
/// let checkpoint = Checkpoint::parse_line(line).unwrap();
///
/// assert_eq!(checkpoint.tenant_id.get(), 7);
/// assert_eq!(checkpoint.record_count, 2);
/// assert_eq!(checkpoint.status, CheckpointStatus::Success);
/// assert_eq!(checkpoint.to_line(), line);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Tenant this checkpoint belongs to
    pub tenant_id: TenantId,

    /// Upper bound of the most recent run, second resolution
    pub last_export_time: NaiveDateTime,

    /// Records exported in the most recent run (not cumulative)
    pub record_count: u64,

    /// Outcome of the most recent run
    pub status: CheckpointStatus,
}

impl Checkpoint {
    /// Create a successful checkpoint
    pub fn success(tenant_id: TenantId, last_export_time: NaiveDateTime, record_count: u64) -> Self {
        Self {
            tenant_id,
            last_export_time,
            record_count,
            status: CheckpointStatus::Success,
        }
    }

    /// Create a failed checkpoint; failed runs always record zero exports
    pub fn failed(tenant_id: TenantId, last_export_time: NaiveDateTime) -> Self {
        Self {
            tenant_id,
            last_export_time,
            record_count: 0,
            status: CheckpointStatus::Failed,
        }
    }

    /// Whether the last run for this tenant failed
    pub fn is_failed(&self) -> bool {
        self.status == CheckpointStatus::Failed
    }

    /// Serialize to a store line (without trailing newline)
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.tenant_id,
            self.last_export_time.format(CHECKPOINT_TIME_FORMAT),
            self.record_count,
            self.status
        )
    }

    /// Parse a store line
    ///
    /// # Errors
    ///
    /// Returns a description of the first field that does not match the
    /// line grammar.
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('|').collect();
        if fields.len() != 4 {
            return Err(format!("expected 4 fields, found {}", fields.len()));
        }

        if fields[0].is_empty() || !fields[0].bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid tenant id '{}'", fields[0]));
        }
        let tenant_id = TenantId::from_str(fields[0])?;

        if !is_canonical_timestamp(fields[1]) {
            return Err(format!("invalid timestamp '{}'", fields[1]));
        }
        let last_export_time = NaiveDateTime::parse_from_str(fields[1], CHECKPOINT_TIME_FORMAT)
            .map_err(|e| format!("invalid timestamp '{}': {e}", fields[1]))?;

        if fields[2].is_empty() || !fields[2].bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid record count '{}'", fields[2]));
        }
        let record_count = fields[2]
            .parse::<u64>()
            .map_err(|e| format!("invalid record count '{}': {e}", fields[2]))?;

        let status = CheckpointStatus::from_str(fields[3])?;

        Ok(Self {
            tenant_id,
            last_export_time,
            record_count,
            status,
        })
    }
}

/// Watermark assumed for a tenant with no checkpoint
pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

// `YYYY-MM-DD HH:MM:SS`, digits exactly where the grammar wants them.
fn is_canonical_timestamp(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 19 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b' ',
        13 | 16 => *b == b':',
        _ => b.is_ascii_digit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_to_line_format() {
        let checkpoint = Checkpoint::success(TenantId::new(7).unwrap(), at(10, 5, 0), 2);
        assert_eq!(checkpoint.to_line(), "7|2024-03-01 10:05:00|2|SUCCESS");
    }

    #[test]
    fn test_failed_has_zero_count() {
        let checkpoint = Checkpoint::failed(TenantId::new(9).unwrap(), at(10, 5, 0));
        assert_eq!(checkpoint.record_count, 0);
        assert!(checkpoint.is_failed());
        assert_eq!(checkpoint.to_line(), "9|2024-03-01 10:05:00|0|FAILED");
    }

    #[test]
    fn test_parse_line_with_crlf() {
        let checkpoint = Checkpoint::parse_line("10|2024-03-01 10:05:00|5|FAILED\r").unwrap();
        assert_eq!(checkpoint.tenant_id.get(), 10);
        assert_eq!(checkpoint.status, CheckpointStatus::Failed);
    }

    #[test_case("7|2024-03-01 10:05:00|2" ; "missing field")]
    #[test_case("7|2024-03-01 10:05:00|2|SUCCESS|x" ; "extra field")]
    #[test_case("-7|2024-03-01 10:05:00|2|SUCCESS" ; "negative tenant")]
    #[test_case("7|2024-03-01T10:05:00|2|SUCCESS" ; "iso separator")]
    #[test_case("7|2024-3-01 10:05:00|2|SUCCESS" ; "short month")]
    #[test_case("7|2024-13-01 10:05:00|2|SUCCESS" ; "impossible month")]
    #[test_case("7|2024-03-01 10:05:00|-2|SUCCESS" ; "negative count")]
    #[test_case("7|2024-03-01 10:05:00|2|success" ; "lowercase status")]
    #[test_case("7|2024-03-01 10:05:00|2|PENDING" ; "unknown status")]
    fn test_parse_line_rejects(line: &str) {
        assert!(Checkpoint::parse_line(line).is_err());
    }

    #[test]
    fn test_epoch() {
        assert_eq!(
            epoch().format(CHECKPOINT_TIME_FORMAT).to_string(),
            "1970-01-01 00:00:00"
        );
    }
}
