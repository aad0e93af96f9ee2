//! # actindo-sync: Sync Engine for the Actindo Connector
//!
//! Turns hub RPC calls into storefront reads and writes. Every call gets a
//! fresh [`RequestContext`]; nothing survives between calls except what the
//! storefront itself stores.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           SyncService                                   │
//! │                                                                         │
//! │  RpcMethod dispatch · request gate · null scrubbing · faults           │
//! └────────────────────────────────┬────────────────────────────────────────┘
//!                                  │
//!        ┌──────────────┬──────────┼──────────┬──────────────┐
//!        ▼              ▼          ▼          ▼              ▼
//!  ┌───────────┐ ┌───────────┐ ┌────────┐ ┌──────────┐ ┌───────────┐
//!  │ product   │ │ category  │ │ order  │ │ customer │ │ settings  │
//!  │           │ │           │ │        │ │          │ │           │
//!  │ import,   │ │ tree get, │ │ list,  │ │ list,    │ │ shop meta,│
//!  │ export,   │ │ add/move/ │ │ lines, │ │ get,     │ │ ping,     │
//!  │ stock     │ │ delete    │ │ status │ │ numbers  │ │ time      │
//!  └─────┬─────┘ └───────────┘ └────────┘ └──────────┘ └───────────┘
//!        │
//!        ├── variant   matrix reconciliation, repair, collapse
//!        ├── identity  order numbers ⇄ article ids, master numbers
//!        └── price     hub tiers ⇄ storefront group prices
//! ```
//!
//! ## Module Organization
//! - [`service`] - `SyncService` and the `RpcMethod` enum
//! - [`context`] - Request-scoped gateway handle and reference data caches
//! - [`config`] - TOML configuration with environment overrides
//! - [`error`] - Error taxonomy and fault payloads
//! - [`product`] - Product import, export, listing and stock updates
//! - [`variant`] - Variant matrix reconciliation
//! - [`identity`] - Article lookup and master numbers
//! - [`price`] - Price translation with the storefront's tax rates
//! - [`category`] - Category tree export and actions
//! - [`order`] - Order export and status updates
//! - [`customer`] - Customer export and customer numbers
//! - [`settings`] - Shop settings and diagnostics
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use actindo_store::MemoryStorefront;
//! use actindo_sync::{ConnectorConfig, SyncService};
//!
//! let store = Arc::new(MemoryStorefront::load(Path::new("snapshot.json"))?);
//! let service = SyncService::new(store, ConnectorConfig::load_or_default(None));
//!
//! let result = service.call("actindo.ping", &serde_json::json!([])).await;
//! assert_eq!(result["pong"], "pong");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod error;
pub mod service;

// Translators
pub mod category;
pub mod customer;
pub mod order;
pub mod product;
pub mod settings;

// Product internals
pub mod identity;
pub mod price;
pub mod variant;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, ConnectorConfig};
pub use context::{Language, RequestContext};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use service::{RpcMethod, SyncService};
