//! # Storefront Records
//!
//! The normalized storefront model the connector reads and writes. These are
//! the storefront's shapes, not the hub's: translators in `actindo-sync`
//! convert between the two.
//!
//! ## Catalog Shape
//! ```text
//! Article ─────────────┬── main_detail_id ──► ArticleDetail (is_main)
//!   master_number      ├── ArticleDetail ─── option_ids ──► StoreOption
//!   configurator_set ──┤                └── prices: PriceTier[]
//!   images ────────────┘   mappings: option id sets (variant-only images)
//! ```
//!
//! Every record derives `Serialize`/`Deserialize` so a whole storefront can
//! be seeded from (and dumped to) a JSON snapshot.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use actindo_core::order::{DebitAccount, SepaPaymentData};
use actindo_core::price::GroupPricing;
use actindo_core::PriceTier;

// =============================================================================
// Reference Data
// =============================================================================

/// A (sub-)shop with its locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub locale_id: i64,
    /// Full locale, e.g. `de_DE`.
    pub locale: String,
    /// Human readable language name.
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub default: bool,
    /// Newline separated host aliases.
    #[serde(default)]
    pub domain_alias: String,
}

/// A customer group and how it deals with tax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerGroup {
    pub id: i64,
    pub key: String,
    #[serde(default)]
    pub description: String,
    /// Show prices gross in the storefront.
    #[serde(default)]
    pub show_gross: bool,
    /// Prices are entered gross.
    #[serde(default)]
    pub gross_entry: bool,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub minimum_order: f64,
}

impl CustomerGroup {
    pub fn pricing(&self) -> GroupPricing {
        GroupPricing {
            id: self.id,
            key: self.key.clone(),
            gross_entry: self.gross_entry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRate {
    pub id: i64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub iso: String,
}

/// Packaging unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub unit: String,
    #[serde(default)]
    pub description: String,
}

/// Manufacturer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    pub id: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMean {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub active: bool,
}

/// Definition of a free article attribute column (`attrN`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub translatable: bool,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub required: bool,
    /// Storefront field type: `text`, `price`, `textarea`, `select`, ...
    #[serde(default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub variantable: bool,
}

fn default_field_type() -> String {
    "text".to_string()
}

/// A filter option (exported as `filterN`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub id: i64,
    pub name: String,
    /// Filter groups the option belongs to.
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

/// A filter group (property set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub comparable: bool,
    #[serde(default)]
    pub position: i64,
}

// =============================================================================
// Catalog
// =============================================================================

/// An article (product family) with everything stored at article level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub description_long: String,
    pub keywords: String,
    pub active: bool,
    pub supplier_id: i64,
    pub tax_id: i64,
    pub filter_group_id: Option<i64>,
    pub highlight: bool,
    pub last_stock: bool,
    pub pseudo_sales: i64,
    pub notification: bool,
    pub cross_bundle_look: bool,
    pub esd: bool,
    pub available_from: Option<NaiveDate>,
    pub created: Option<NaiveDate>,
    pub changed: Option<NaiveDateTime>,
    pub main_detail_id: i64,
    /// Number the hub knows a variant family by.
    pub master_number: Option<String>,
    pub configurator_set: Option<ConfiguratorSet>,
    pub categories: Vec<i64>,
    /// Customer group ids that must not see the article.
    pub customer_group_blacklist: Vec<i64>,
    pub links: Vec<ArticleLink>,
    /// Related article ids (cross-selling group 1).
    pub related: Vec<i64>,
    /// Similar article ids (cross-selling group 2).
    pub similar: Vec<i64>,
    pub images: Vec<ArticleImage>,
    /// Keyed by shop id.
    pub translations: BTreeMap<i64, ArticleTranslation>,
    /// Filter option id → values.
    pub filter_values: BTreeMap<i64, Vec<String>>,
}

impl Article {
    pub fn is_variant_family(&self) -> bool {
        self.configurator_set.is_some()
    }
}

/// What it takes to create an article with its main detail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewArticle {
    pub name: String,
    pub number: String,
    pub tax_id: i64,
    pub notification: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleLink {
    pub name: String,
    pub link: String,
    pub target: String,
    /// Language code the link belongs to.
    pub language: String,
}

/// Texts and translated attributes for one shop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleTranslation {
    pub name: String,
    pub keywords: String,
    pub description: String,
    pub description_long: String,
    pub attributes: BTreeMap<String, String>,
}

/// An image attached to an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleImage {
    pub id: i64,
    pub name: String,
    pub extension: String,
    pub description: String,
    /// Language code → title.
    pub titles: BTreeMap<String, String>,
    pub position: i64,
    pub main: bool,
    pub payload: String,
    pub size: f64,
    /// Option id sets the image is restricted to. Empty means the image
    /// belongs to the whole article.
    pub mappings: Vec<BTreeSet<i64>>,
}

impl ArticleImage {
    pub fn is_variant_only(&self) -> bool {
        !self.mappings.is_empty()
    }
}

/// A sellable unit of an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleDetail {
    pub id: i64,
    pub article_id: i64,
    pub number: String,
    pub is_main: bool,
    pub active: bool,
    pub in_stock: i64,
    pub additional_text: String,
    pub ean: String,
    pub supplier_number: String,
    pub shipping_time: i64,
    pub weight: f64,
    pub width: f64,
    pub height: f64,
    pub len: f64,
    pub position: i64,
    pub shipping_free: bool,
    pub release_date: Option<NaiveDate>,
    pub purchase_steps: Option<f64>,
    pub purchase_unit: Option<f64>,
    pub reference_unit: Option<f64>,
    pub unit_id: Option<i64>,
    pub pack_unit: String,
    pub prices: Vec<PriceTier>,
    /// Configurator options this detail is made of.
    pub option_ids: BTreeSet<i64>,
    /// Free attribute columns (`attrN` → value).
    pub attributes: BTreeMap<String, String>,
}

/// The configurator set of a variant family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfiguratorSet {
    pub name: String,
    pub group_ids: Vec<i64>,
    pub option_ids: BTreeSet<i64>,
}

// =============================================================================
// Customers
// =============================================================================

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub salutation: String,
    pub company: String,
    pub department: String,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub street_number: String,
    pub zip: String,
    pub city: String,
    pub country_id: i64,
    pub phone: String,
    pub fax: String,
    pub vat_id: String,
}

/// A stored delivery address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingAddress {
    pub id: i64,
    #[serde(flatten)]
    pub address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub id: i64,
    pub email: String,
    pub shop_id: i64,
    /// Customer group key.
    pub group_key: String,
    /// External customer number assigned by the hub.
    pub customer_number: String,
    pub billing: Address,
    pub shipping: Vec<ShippingAddress>,
    pub birthday: Option<NaiveDate>,
    pub payment_id: i64,
    pub debit: Option<DebitAccount>,
    pub payment_data: Vec<SepaPaymentData>,
}

/// Aggregate numbers for `customers.count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CustomerStats {
    pub count: i64,
    pub max_customer_id: i64,
    pub max_customer_number: i64,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub id: i64,
    pub number: String,
    pub customer_id: i64,
    pub status: i64,
    pub payment_id: i64,
    pub dispatch_id: i64,
    pub shop_id: i64,
    /// Language (shop) id the order was placed in.
    pub language: String,
    pub ordered_at: Option<NaiveDateTime>,
    /// Prices are net (B2B order).
    pub net: bool,
    pub invoice_amount: f64,
    pub invoice_amount_net: f64,
    pub invoice_shipping: f64,
    pub invoice_shipping_net: f64,
    pub currency: String,
    pub currency_factor: f64,
    pub customer_comment: String,
    pub comment: String,
    pub tracking_code: String,
    pub billing: Address,
    pub shipping: Address,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderLine {
    pub id: i64,
    pub article_number: String,
    pub article_name: String,
    pub price: f64,
    pub quantity: i64,
    pub tax_rate: f64,
    /// 0 article, 1 premium, 2 voucher, 3 discount, 4 payment surcharge.
    pub mode: i64,
}

/// Paging for order lists; always ordered by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderQuery {
    pub offset: usize,
    pub limit: usize,
    pub descending: bool,
}

impl Default for OrderQuery {
    fn default() -> Self {
        OrderQuery {
            offset: 0,
            limit: 50,
            descending: true,
        }
    }
}

/// Aggregate numbers for `orders.count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    pub count: i64,
    pub max_order_id: i64,
}

// =============================================================================
// Audit
// =============================================================================

/// A correction the connector made to storefront data on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub entity: String,
    pub entity_id: i64,
    pub action: String,
    pub detail: String,
}

impl AuditEntry {
    pub fn new(
        entity: impl Into<String>,
        entity_id: i64,
        action: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        AuditEntry {
            id: Uuid::new_v4(),
            at: Utc::now(),
            entity: entity.into(),
            entity_id,
            action: action.into(),
            detail: detail.into(),
        }
    }
}
