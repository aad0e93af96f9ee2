//! # Error Types
//!
//! Domain error types for actindo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  actindo-core errors (this file)                                        │
//! │  ├── CoreError        - Rule violations (not found, conflict)           │
//! │  └── ValidationError  - Malformed hub input                             │
//! │                                                                         │
//! │  actindo-store errors (separate crate)                                  │
//! │  └── StoreError       - Gateway failures                                │
//! │                                                                         │
//! │  actindo-sync errors (separate crate)                                   │
//! │  └── SyncError        - What the hub sees as a fault                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → RPC fault              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result alias for pure rule evaluation.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Core Error
// =============================================================================

/// Rule evaluation errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity is missing from the loaded data.
    ///
    /// ## When This Occurs
    /// - Moving a category that is not part of the loaded tree
    /// - Referencing a category id that was deleted meanwhile
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// The requested change would break a structural invariant.
    ///
    /// ## When This Occurs
    /// - Category tree has zero or several roots
    /// - Moving a category under itself or one of its descendants
    /// - Moving the root category
    ///
    /// ## Example
    /// ```text
    /// Root
    ///  └── Shoes (3)
    ///       └── Boots (7)
    ///
    /// move(3, append, 7)  →  Conflict("cannot move category 3 below its own subtree")
    /// ```
    #[error("{0}")]
    Conflict(String),

    /// Hub input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity and key.
    pub fn not_found(entity: impl Into<String>, key: impl ToString) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    /// Creates a Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        CoreError::Conflict(message.into())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors raised while interpreting hub payloads.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value has an unusable shape.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A filter references a column outside the whitelist.
    #[error("Unknown filter field found while building query: {0}")]
    UnknownFilterField(String),

    /// A filter uses an operator other than equality or list.
    #[error("Unsupported filter type '{operator}' for field {field}")]
    UnsupportedFilterOperator { field: String, operator: String },

    /// `category.action` received an action it does not know.
    #[error("Unknown category action given: {0}")]
    UnknownCategoryAction(String),

    /// The RPC surface was asked for a method it does not expose.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
}

impl ValidationError {
    /// Creates a Required error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Creates an InvalidFormat error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
