//! # Sync Error Types
//!
//! Error types for connector operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  NotFound       │  │   Validation    │  │     Conflict            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  unknown number │  │  unknown method │  │  multiple roots         │ │
//! │  │  no orders      │  │  bad filter     │  │  move below own subtree │ │
//! │  │  missing record │  │  unknown status │  │  foreign main detail    │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │      Io         │  │     Config      │                              │
//! │  │                 │  │                 │                              │
//! │  │  gateway failed │  │  load/save/     │                              │
//! │  │                 │  │  validate       │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! │                                                                         │
//! │  Every error leaves the service as {ok: false, error, kind}             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

use actindo_core::{CoreError, ValidationError};
use actindo_store::StoreError;

use crate::config::ConfigError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every failure a call can report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The requested record does not exist.
    ///
    /// ## When This Occurs
    /// - An order number resolves to no detail and no master number
    /// - `orders.list` finds no orders at all
    /// - A customer or order id is unknown
    #[error("{0}")]
    NotFound(String),

    /// The hub sent something the connector cannot act on.
    ///
    /// ## When This Occurs
    /// - Unknown RPC method or category action
    /// - Filter on a column outside the whitelist
    /// - Status id the storefront does not know
    #[error("{0}")]
    Validation(String),

    /// The change would break a storefront invariant.
    ///
    /// ## When This Occurs
    /// - Category tree with zero or several roots
    /// - Moving a category below its own subtree
    /// - Adopting another live article's main detail
    #[error("{0}")]
    Conflict(String),

    /// The storefront gateway failed.
    #[error("Storefront error: {0}")]
    Io(String),

    /// Configuration could not be loaded, saved or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Classification reported in faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Io,
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SyncError {
    pub fn not_found(message: impl Into<String>) -> Self {
        SyncError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        SyncError::Conflict(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::Conflict(_) => ErrorKind::Conflict,
            SyncError::Io(_) => ErrorKind::Io,
            SyncError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The fault payload returned to the hub.
    pub fn to_fault(&self) -> Value {
        json!({
            "ok": false,
            "error": self.to_string(),
            "kind": self.kind().as_str(),
        })
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

/// ```text
/// CoreError::NotFound     → NotFound
/// CoreError::Conflict     → Conflict
/// CoreError::Validation   → Validation
/// StoreError::NotFound    → NotFound
/// StoreError::Duplicate   → Conflict
/// StoreError::Conflict    → Conflict
/// StoreError::Backend     → Io
/// serde_json::Error       → Validation (malformed hub payload)
/// ```
impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { .. } => SyncError::NotFound(err.to_string()),
            CoreError::Conflict(message) => SyncError::Conflict(message),
            CoreError::Validation(inner) => SyncError::Validation(inner.to_string()),
        }
    }
}

impl From<ValidationError> for SyncError {
    fn from(err: ValidationError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => SyncError::NotFound(err.to_string()),
            StoreError::Duplicate { .. } | StoreError::Conflict(_) => {
                SyncError::Conflict(err.to_string())
            }
            StoreError::Backend(message) => SyncError::Io(message),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Validation(format!("malformed payload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_classified() {
        let err: SyncError = StoreError::not_found("Article", 4).into();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Article not found: 4");

        let err: SyncError = StoreError::duplicate("ordernumber", "A-1").into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: SyncError = StoreError::Backend("down".into()).into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_core_errors_are_classified() {
        let err: SyncError = CoreError::conflict("Multiple Roots found! Not allowed").into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: SyncError = ValidationError::UnknownMethod("foo.bar".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_fault_shape() {
        let fault = SyncError::not_found("Could not find any orders").to_fault();
        assert_eq!(fault["ok"], false);
        assert_eq!(fault["error"], "Could not find any orders");
        assert_eq!(fault["kind"], "not_found");
    }
}
