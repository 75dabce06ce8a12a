//! Domain models and types for Invex.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`TenantId`])
//! - **Domain models** ([`InvoiceRecord`])
//! - **Error types** ([`InvexError`], [`WriteError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, InvexError>`]:
//!
//! ```rust
//! use invex::domain::{InvexError, Result, TenantId};
//!
//! fn parse_tenant(raw: &str) -> Result<TenantId> {
//!     raw.parse().map_err(InvexError::Configuration)
//! }
//!
//! assert!(parse_tenant("12").is_ok());
//! assert!(parse_tenant("twelve").is_err());
//! ```

pub mod errors;
pub mod ids;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{InvexError, WriteError};
pub use ids::TenantId;
pub use record::InvoiceRecord;
pub use result::Result;
