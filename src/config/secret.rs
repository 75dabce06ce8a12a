//! Connection string protection
//!
//! The source DSN usually embeds a password. It is held in a
//! [`secrecy::Secret`] so it is zeroed on drop, redacted in `Debug` output,
//! and only readable through `expose_secret()`.
//!
//! ```rust
//! use invex::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let dsn = secret_string("postgresql://invex:pw@db/billing".to_string());
//! assert!(dsn.expose_secret().as_str().starts_with("postgresql://"));
//! assert!(!format!("{dsn:?}").contains("pw"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// String payload of a [`SecretString`]
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl SecretValue {
    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Redacted, zeroizing string used for the source DSN
pub type SecretString = Secret<SecretValue>;

/// Wrap a connection string
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_dsn_is_redacted_in_debug() {
        let dsn = secret_string("postgresql://invex:hunter2@db/billing".to_string());

        assert!(!format!("{dsn:?}").contains("hunter2"));
        assert_eq!(dsn.expose_secret(), "postgresql://invex:hunter2@db/billing");
    }

    #[test]
    fn test_dsn_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Source {
            connection_string: SecretString,
        }

        let source: Source =
            toml::from_str("connection_string = \"postgresql://u:p@localhost/erp\"").unwrap();
        assert_eq!(
            source.connection_string.expose_secret().as_str(),
            "postgresql://u:p@localhost/erp"
        );
    }

    #[test]
    fn test_dsn_serializes_verbatim() {
        #[derive(Serialize)]
        struct Source {
            connection_string: SecretString,
        }

        let json = serde_json::to_string(&Source {
            connection_string: secret_string("postgresql://localhost/erp".to_string()),
        })
        .unwrap();
        assert_eq!(json, "{\"connection_string\":\"postgresql://localhost/erp\"}");
    }
}
