//! # actindo-core: Pure Translation Rules
//!
//! Everything the connector decides without talking to a storefront: how
//! hub payloads are read, how prices convert, where a moved category lands,
//! which variant is which, and how an order is presented to the hub.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Actindo Connector Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Hub (RPC caller)                             │   │
//! │  │    product.*, category.*, customers.*, orders.*, settings.*     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON params                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    actindo-sync (SyncService)                   │   │
//! │  │    dispatch, translators, reconciler, request gate              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ actindo-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │  types   │ │  price   │ │ category │ │ variant  │          │   │
//! │  │   │ hub      │ │ gross/net│ │ arena +  │ │ set      │          │   │
//! │  │   │ payloads │ │ tiers    │ │ moves    │ │ matching │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ identity │ │  order   │ │  filter  │ │   wire   │          │   │
//! │  │   │ master   │ │ payment, │ │ customer │ │ loose    │          │   │
//! │  │   │ numbers  │ │ discount │ │ queries  │ │ coercion │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STOREFRONT • NO CLOCK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                actindo-store (Gateway Layer)                    │   │
//! │  │           gateway traits, in-memory storefront                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`wire`] - Loose hub value coercion, ordered maps, null scrubbing
//! - [`types`] - Hub product and stock payloads
//! - [`price`] - Gross/net conversion and tiered price lists
//! - [`category`] - Category arena with the move policy
//! - [`variant`] - Attribute mapping and variant matching
//! - [`identity`] - Master number derivation
//! - [`order`] - Payment codes, bank data, discount and shipping rules
//! - [`filter`] - Customer list filters
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output
//! 2. **No I/O**: storefront access lives in actindo-store
//! 3. **Decimal Prices**: floats only at the hub edge, `rust_decimal` inside
//! 4. **Explicit Errors**: typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use actindo_core::identity::master_candidate;
//!
//! let master = master_candidate(&["SHIRT-RED", "SHIRT-BLUE"]);
//! assert_eq!(master.as_deref(), Some("SHIRT"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod category;
pub mod error;
pub mod filter;
pub mod identity;
pub mod order;
pub mod price;
pub mod types;
pub mod variant;
pub mod wire;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use category::{CategoryAction, CategoryRecord, CategoryTree, MovePlacement, Placement};
pub use error::{CoreError, CoreResult, ValidationError};
pub use filter::CustomerQuery;
pub use price::{GroupPricing, PriceTier};
pub use types::*;
pub use wire::OrderedMap;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Protocol version reported to the hub.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Id of the storefront's root category.
///
/// ## Hub Convention
/// The hub addresses "top level" as parent 0 or below; such parents are
/// mapped onto this id.
pub const ROOT_CATEGORY_ID: i64 = 1;
