//! # actindo-store: Storefront Gateways
//!
//! Everything the connector reads from or writes to the storefront goes
//! through the traits in [`gateway`].
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     actindo-sync (translators)                          │
//! │                              │                                          │
//! │                              ▼  Arc<dyn StorefrontGateway>              │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │                      actindo-store                                │  │
//! │  │                                                                   │  │
//! │  │  gateway.rs  Shop / Category / Catalog / Customer / Order traits  │  │
//! │  │  model.rs    storefront records                                   │  │
//! │  │  memory.rs   MemoryStorefront (tests, replay)                     │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                  storefront persistence (external)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod gateway;
pub mod memory;
pub mod model;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use gateway::{
    AuditLog, CatalogGateway, CategoryGateway, CustomerGateway, OrderGateway, ShopGateway,
    StatusNotifier, StorefrontGateway, UnitOfWork,
};
pub use memory::{MemoryStorefront, Snapshot};
pub use model::*;
