//! # Gateway Error Types
//!
//! Error types for storefront operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Storefront failure (missing row, duplicate number, backend down)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds entity and key                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (in actindo-sync) ← Classified as NotFound/Conflict/Io       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RPC fault {ok: false, error, kind}                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Storefront operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found in the storefront.
    ///
    /// ## When This Occurs
    /// - Article, detail, customer or order id doesn't exist
    /// - An order number resolves to nothing
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Creating a detail with a number another detail carries
    /// - Creating a configurator group that already exists
    #[error("Duplicate {field}: '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// The write would leave the storefront inconsistent.
    ///
    /// ## When This Occurs
    /// - Deleting the main detail of an article that has siblings
    /// - Reassigning a detail to an article that does not exist
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The storefront backend failed.
    ///
    /// ## When This Occurs
    /// - Snapshot file unreadable or malformed
    /// - Remote storefront unreachable
    #[error("Storefront backend failed: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Duplicate error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        StoreError::Duplicate {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("snapshot: {err}"))
    }
}

/// Result type for storefront operations.
pub type StoreResult<T> = Result<T, StoreError>;
