//! # Storefront Gateways
//!
//! The seams between the connector and the storefront's persistence. Each
//! concern gets its own trait; [`StorefrontGateway`] bundles them so a single
//! `Arc<dyn StorefrontGateway>` can be injected into the sync service.
//!
//! ## Gateway Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        StorefrontGateway                                │
//! │                                                                         │
//! │  ShopGateway        shops, groups, taxes, countries, units, states ...  │
//! │  CategoryGateway    category rows, create/rename/delete, placements     │
//! │  CatalogGateway     articles, details, configurator, master numbers     │
//! │  CustomerGateway    filtered customer lists, customer numbers           │
//! │  OrderGateway       order pages, status, tracking, payone lookups       │
//! │  StatusNotifier     status mails to customers                           │
//! │  UnitOfWork         flush of buffered writes                            │
//! │  AuditLog           repair trail                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All methods are async and return [`StoreResult`]. Lookups that may
//! legitimately miss return `Option`; lookups by id of something the caller
//! must already know about return [`crate::StoreError::NotFound`].

use async_trait::async_trait;
use chrono::NaiveDateTime;

use actindo_core::variant::{StoreGroup, StoreOption};
use actindo_core::{CategoryRecord, CustomerQuery, Placement};

use crate::error::StoreResult;
use crate::model::*;

// =============================================================================
// Reference Data
// =============================================================================

#[async_trait]
pub trait ShopGateway: Send + Sync {
    /// Shops ordered default first, then by id.
    async fn shops(&self) -> StoreResult<Vec<Shop>>;
    async fn customer_groups(&self) -> StoreResult<Vec<CustomerGroup>>;
    async fn tax_rates(&self) -> StoreResult<Vec<TaxRate>>;
    async fn countries(&self) -> StoreResult<Vec<Country>>;
    async fn units(&self) -> StoreResult<Vec<Unit>>;
    async fn suppliers(&self) -> StoreResult<Vec<Supplier>>;
    async fn order_states(&self) -> StoreResult<Vec<OrderState>>;
    async fn payment_means(&self) -> StoreResult<Vec<PaymentMean>>;
    async fn dispatches(&self) -> StoreResult<Vec<Dispatch>>;
    async fn attribute_fields(&self) -> StoreResult<Vec<AttributeField>>;
    async fn filter_options(&self) -> StoreResult<Vec<FilterOption>>;
    async fn filter_groups(&self) -> StoreResult<Vec<FilterGroup>>;

    /// Current time as the storefront's database sees it.
    async fn database_time(&self) -> StoreResult<NaiveDateTime>;

    /// Reads a connector setting.
    async fn setting(&self, key: &str) -> StoreResult<Option<String>>;
    /// Stores a connector setting.
    async fn save_setting(&self, key: &str, value: &str) -> StoreResult<()>;
}

// =============================================================================
// Categories
// =============================================================================

#[async_trait]
pub trait CategoryGateway: Send + Sync {
    async fn categories(&self) -> StoreResult<Vec<CategoryRecord>>;

    /// Creates a category and returns its id.
    async fn create_category(&self, parent_id: i64, name: &str, position: i64) -> StoreResult<i64>;

    async fn rename_category(&self, id: i64, name: &str) -> StoreResult<()>;

    /// Deletes a category with its whole subtree.
    async fn delete_category(&self, id: i64) -> StoreResult<()>;

    /// Writes parent and position of each given category.
    async fn save_placements(&self, placements: &[Placement]) -> StoreResult<()>;
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn article(&self, id: i64) -> StoreResult<Article>;

    /// All articles ordered by id.
    async fn articles(&self) -> StoreResult<Vec<Article>>;

    /// Creates an article with its main detail.
    async fn create_article(&self, article: NewArticle) -> StoreResult<Article>;

    async fn save_article(&self, article: &Article) -> StoreResult<()>;

    /// Deletes an article with all its details.
    async fn delete_article(&self, id: i64) -> StoreResult<()>;

    async fn detail(&self, id: i64) -> StoreResult<ArticleDetail>;

    async fn detail_by_number(&self, number: &str) -> StoreResult<Option<ArticleDetail>>;

    /// Details of an article, main detail first.
    async fn details(&self, article_id: i64) -> StoreResult<Vec<ArticleDetail>>;

    /// Creates an empty detail under an article.
    async fn create_detail(&self, article_id: i64, number: &str) -> StoreResult<ArticleDetail>;

    /// Writes a detail, including its article assignment.
    async fn save_detail(&self, detail: &ArticleDetail) -> StoreResult<()>;

    /// Deletes a detail with its attributes and option relations.
    async fn delete_detail(&self, id: i64) -> StoreResult<()>;

    /// Article whose stored master number equals `number`.
    async fn article_by_master_number(&self, number: &str) -> StoreResult<Option<i64>>;

    async fn set_master_number(&self, article_id: i64, number: &str) -> StoreResult<()>;

    async fn configurator_groups(&self) -> StoreResult<Vec<StoreGroup>>;
    async fn configurator_options(&self) -> StoreResult<Vec<StoreOption>>;
    async fn create_configurator_group(&self, name: &str) -> StoreResult<StoreGroup>;
    async fn create_configurator_option(&self, group_id: i64, name: &str) -> StoreResult<StoreOption>;
}

// =============================================================================
// Customers
// =============================================================================

#[async_trait]
pub trait CustomerGateway: Send + Sync {
    /// Customers accepted by the query, sorted and paged.
    async fn customers(&self, query: &CustomerQuery) -> StoreResult<Vec<Customer>>;

    async fn customer(&self, id: i64) -> StoreResult<Customer>;

    async fn set_customer_number(&self, id: i64, number: &str) -> StoreResult<()>;

    async fn customer_stats(&self) -> StoreResult<CustomerStats>;
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// One page of orders, with lines.
    async fn orders(&self, query: OrderQuery) -> StoreResult<Vec<Order>>;

    async fn order(&self, id: i64) -> StoreResult<Order>;

    async fn set_order_status(&self, id: i64, status: i64, comment: &str) -> StoreResult<()>;

    async fn set_tracking_code(&self, id: i64, code: &str) -> StoreResult<()>;

    /// Payone transaction id of an order, when the payment plugin is present.
    async fn payone_transaction(&self, order_id: i64) -> StoreResult<Option<String>>;

    async fn order_stats(&self) -> StoreResult<OrderStats>;
}

/// Sends status mails.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify_status(&self, order_id: i64, status: i64) -> StoreResult<()>;
}

/// Buffered writes.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Makes all writes issued so far durable.
    async fn flush(&self) -> StoreResult<()>;
}

/// Trail of automatic corrections.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> StoreResult<()>;
}

// =============================================================================
// Bundle
// =============================================================================

/// Everything the connector needs from a storefront.
pub trait StorefrontGateway:
    ShopGateway
    + CategoryGateway
    + CatalogGateway
    + CustomerGateway
    + OrderGateway
    + StatusNotifier
    + UnitOfWork
    + AuditLog
{
}

impl<T> StorefrontGateway for T where
    T: ShopGateway
        + CategoryGateway
        + CatalogGateway
        + CustomerGateway
        + OrderGateway
        + StatusNotifier
        + UnitOfWork
        + AuditLog
{
}
