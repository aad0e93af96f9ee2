//! # Request Context
//!
//! Everything one RPC call shares: the gateway, the configuration and a set
//! of lazily loaded reference data caches. A context lives exactly as long as
//! the call that created it, so caches never outlive the request boundary.
//!
//! ```text
//! SyncService::call
//!     │
//!     ├── RequestContext::new(gateway, config)
//!     │       shops ─────────┐
//!     │       languages      │  OnceCell: loaded on first use,
//!     │       groups, taxes  │  then reused by every translator
//!     │       fields, ...  ──┘  within this call
//!     │
//!     └── drop(ctx)  ← caches gone
//! ```

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use actindo_core::order::language_code;
use actindo_core::price::{to_decimal, GroupPricing};
use actindo_store::{AttributeField, Country, CustomerGroup, Shop, StorefrontGateway, TaxRate};

use crate::config::ConnectorConfig;
use crate::error::SyncResult;

/// A storefront language, derived from the shops' locales.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    /// Locale id; the hub's language id.
    pub id: i64,
    pub locale: String,
    pub name: String,
    /// Two letter code (`de_DE` → `de`).
    pub code: String,
    pub is_default: bool,
}

/// Request-scoped state.
pub struct RequestContext {
    gateway: Arc<dyn StorefrontGateway>,
    config: Arc<ConnectorConfig>,
    shops: OnceCell<Vec<Shop>>,
    languages: OnceCell<Vec<Language>>,
    customer_groups: OnceCell<Vec<CustomerGroup>>,
    tax_rates: OnceCell<Vec<TaxRate>>,
    attribute_fields: OnceCell<Vec<AttributeField>>,
    countries: OnceCell<Vec<Country>>,
    /// Order number → article id.
    pub(crate) article_ids: Mutex<HashMap<String, i64>>,
}

impl RequestContext {
    pub fn new(gateway: Arc<dyn StorefrontGateway>, config: Arc<ConnectorConfig>) -> Self {
        RequestContext {
            gateway,
            config,
            shops: OnceCell::new(),
            languages: OnceCell::new(),
            customer_groups: OnceCell::new(),
            tax_rates: OnceCell::new(),
            attribute_fields: OnceCell::new(),
            countries: OnceCell::new(),
            article_ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn gateway(&self) -> &dyn StorefrontGateway {
        self.gateway.as_ref()
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    // =========================================================================
    // Shops & Languages
    // =========================================================================

    pub async fn shops(&self) -> SyncResult<&[Shop]> {
        let shops = self
            .shops
            .get_or_try_init(|| async { self.gateway.shops().await })
            .await?;
        Ok(shops)
    }

    /// Languages in shop order; the first one is the default.
    pub async fn languages(&self) -> SyncResult<&[Language]> {
        let shops = self.shops().await?;
        let languages = self
            .languages
            .get_or_init(|| async {
                let mut languages: Vec<Language> = Vec::new();
                for shop in shops {
                    if languages.iter().any(|l| l.id == shop.locale_id) {
                        continue;
                    }
                    languages.push(Language {
                        id: shop.locale_id,
                        locale: shop.locale.clone(),
                        name: shop.language.clone(),
                        code: language_code(&shop.locale),
                        is_default: languages.is_empty(),
                    });
                }
                languages
            })
            .await;
        Ok(languages)
    }

    pub async fn default_language(&self) -> SyncResult<Option<&Language>> {
        Ok(self.languages().await?.first())
    }

    /// Code of the default language, `de` when no shop exists.
    pub async fn default_language_code(&self) -> SyncResult<String> {
        Ok(self
            .default_language()
            .await?
            .map(|l| l.code.clone())
            .unwrap_or_else(|| actindo_core::order::DEFAULT_COUNTRY.to_string()))
    }

    pub async fn language_by_id(&self, id: i64) -> SyncResult<Option<&Language>> {
        Ok(self.languages().await?.iter().find(|l| l.id == id))
    }

    /// First shop whose locale has the given language code.
    pub async fn shop_for_language(&self, code: &str) -> SyncResult<Option<&Shop>> {
        Ok(self
            .shops()
            .await?
            .iter()
            .find(|s| language_code(&s.locale) == code))
    }

    // =========================================================================
    // Customer Groups & Taxes
    // =========================================================================

    pub async fn customer_groups(&self) -> SyncResult<&[CustomerGroup]> {
        let groups = self
            .customer_groups
            .get_or_try_init(|| async { self.gateway.customer_groups().await })
            .await?;
        Ok(groups)
    }

    pub async fn group_pricing(&self) -> SyncResult<Vec<GroupPricing>> {
        Ok(self
            .customer_groups()
            .await?
            .iter()
            .map(CustomerGroup::pricing)
            .collect())
    }

    pub async fn customer_group_by_key(&self, key: &str) -> SyncResult<Option<&CustomerGroup>> {
        Ok(self.customer_groups().await?.iter().find(|g| g.key == key))
    }

    /// Tax rate in percent; 0 for unknown ids.
    pub async fn tax_rate(&self, tax_id: i64) -> SyncResult<Decimal> {
        let rates = self
            .tax_rates
            .get_or_try_init(|| async { self.gateway.tax_rates().await })
            .await?;
        Ok(rates
            .iter()
            .find(|t| t.id == tax_id)
            .map(|t| to_decimal(t.rate))
            .unwrap_or_default())
    }

    // =========================================================================
    // Misc Reference Data
    // =========================================================================

    pub async fn attribute_fields(&self) -> SyncResult<&[AttributeField]> {
        let fields = self
            .attribute_fields
            .get_or_try_init(|| async { self.gateway.attribute_fields().await })
            .await?;
        Ok(fields)
    }

    /// Lower-case ISO code of a country, `None` when unknown.
    pub async fn country_iso(&self, country_id: i64) -> SyncResult<Option<String>> {
        let countries = self
            .countries
            .get_or_try_init(|| async { self.gateway.countries().await })
            .await?;
        Ok(countries
            .iter()
            .find(|c| c.id == country_id)
            .map(|c| c.iso.to_lowercase()))
    }
}
