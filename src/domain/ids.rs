//! Domain identifier types with validation
//!
//! Newtype wrappers keep tenant identifiers from being mixed up with record
//! counts or other integers flowing through the exporter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tenant identifier newtype wrapper
///
/// Tenants are the top-level partition key: checkpoints, output directories
/// and incremental queries are all scoped by tenant.
///
/// # Examples
///
/// ```
/// use invex::domain::ids::TenantId;
/// use std::str::FromStr;
///
/// let tenant = TenantId::from_str("7").unwrap();
/// assert_eq!(tenant.get(), 7);
/// assert_eq!(tenant.to_string(), "7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(i64);

impl TenantId {
    /// Creates a new TenantId
    ///
    /// # Returns
    ///
    /// Returns `Err` for negative identifiers, which the checkpoint
    /// grammar cannot represent.
    pub fn new(id: i64) -> Result<Self, String> {
        if id < 0 {
            return Err(format!("Tenant ID cannot be negative, got {id}"));
        }
        Ok(Self(id))
    }

    /// Returns the raw identifier
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Tenant ID cannot be empty".to_string());
        }
        let id = trimmed
            .parse::<i64>()
            .map_err(|_| format!("Tenant ID must be an integer, got '{trimmed}'"))?;
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_parse() {
        let tenant = TenantId::from_str(" 42 ").unwrap();
        assert_eq!(tenant.get(), 42);
    }

    #[test]
    fn test_tenant_id_rejects_garbage() {
        assert!(TenantId::from_str("").is_err());
        assert!(TenantId::from_str("abc").is_err());
        assert!(TenantId::from_str("-3").is_err());
    }

    #[test]
    fn test_tenant_id_ordering() {
        let mut tenants = vec![
            TenantId::new(10).unwrap(),
            TenantId::new(7).unwrap(),
            TenantId::new(9).unwrap(),
        ];
        tenants.sort();
        let raw: Vec<i64> = tenants.iter().map(TenantId::get).collect();
        assert_eq!(raw, vec![7, 9, 10]);
    }
}
