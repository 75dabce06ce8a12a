//! Result type alias for Invex
//!
//! This module provides a convenient Result type alias that uses InvexError
//! as the error type.

use super::errors::InvexError;

/// Result type alias for Invex operations
///
/// # Examples
///
/// ```
/// use invex::domain::result::Result;
/// use invex::domain::errors::InvexError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(InvexError::Export("no tenants".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, InvexError>;
