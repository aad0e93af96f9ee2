//! # In-Memory Storefront
//!
//! A complete [`StorefrontGateway`] held in memory. The replay binary seeds
//! it from a JSON snapshot; tests build it from fixtures.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  MemoryStorefront                                                       │
//! │  ├── state: RwLock<Snapshot>      ← every record, serde round-trippable │
//! │  ├── flushes: AtomicUsize         ← counts UnitOfWork::flush calls      │
//! │  └── notifier_fails: AtomicBool   ← makes status mails fail             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes are applied immediately; `flush` only counts, so tests can observe
//! how bulk writes were chunked. Ids are assigned as `max + 1`.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use actindo_core::filter::CustomerColumn;
use actindo_core::variant::{StoreGroup, StoreOption};
use actindo_core::{CategoryRecord, CustomerQuery, Placement};

use crate::error::{StoreError, StoreResult};
use crate::gateway::*;
use crate::model::*;

// =============================================================================
// Snapshot
// =============================================================================

/// Every record of a storefront.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub shops: Vec<Shop>,
    pub customer_groups: Vec<CustomerGroup>,
    pub tax_rates: Vec<TaxRate>,
    pub countries: Vec<Country>,
    pub units: Vec<Unit>,
    pub suppliers: Vec<Supplier>,
    pub order_states: Vec<OrderState>,
    pub payment_means: Vec<PaymentMean>,
    pub dispatches: Vec<Dispatch>,
    pub attribute_fields: Vec<AttributeField>,
    pub filter_options: Vec<FilterOption>,
    pub filter_groups: Vec<FilterGroup>,
    pub categories: Vec<CategoryRecord>,
    pub articles: Vec<Article>,
    pub details: Vec<ArticleDetail>,
    pub configurator_groups: Vec<StoreGroup>,
    pub configurator_options: Vec<StoreOption>,
    pub customers: Vec<Customer>,
    pub orders: Vec<Order>,
    /// Order id → payone transaction id.
    pub payone: BTreeMap<i64, String>,
    pub settings: BTreeMap<String, String>,
    pub audit: Vec<AuditEntry>,
    /// `(order id, status)` of every mail sent.
    #[serde(skip)]
    pub notifications: Vec<(i64, i64)>,
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}

impl Snapshot {
    fn article_mut(&mut self, id: i64) -> StoreResult<&mut Article> {
        self.articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::not_found("Article", id))
    }

    fn number_taken(&self, number: &str, except: Option<i64>) -> bool {
        self.details
            .iter()
            .any(|d| d.number == number && Some(d.id) != except)
    }

    fn country_iso(&self, id: i64) -> String {
        self.countries
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.iso.clone())
            .unwrap_or_default()
    }

    fn customer_column(&self, customer: &Customer, column: CustomerColumn) -> String {
        match column {
            CustomerColumn::CustomerId => customer.id.to_string(),
            CustomerColumn::DebKredId => customer.customer_number.clone(),
            CustomerColumn::FirstName => customer.billing.first_name.clone(),
            CustomerColumn::LastName => customer.billing.last_name.clone(),
            CustomerColumn::Company => customer.billing.company.clone(),
            CustomerColumn::Country => self.country_iso(customer.billing.country_id),
            CustomerColumn::Email => customer.email.clone(),
        }
    }
}

fn compare_column(column: CustomerColumn, a: &str, b: &str) -> Ordering {
    if column.is_numeric() {
        let a = a.trim().parse::<i64>().unwrap_or_default();
        let b = b.trim().parse::<i64>().unwrap_or_default();
        a.cmp(&b)
    } else {
        a.cmp(b)
    }
}

// =============================================================================
// Storefront
// =============================================================================

/// An in-memory storefront.
#[derive(Debug, Default)]
pub struct MemoryStorefront {
    state: RwLock<Snapshot>,
    flushes: AtomicUsize,
    notifier_fails: AtomicBool,
}

impl MemoryStorefront {
    pub fn new(snapshot: Snapshot) -> Self {
        MemoryStorefront {
            state: RwLock::new(snapshot),
            flushes: AtomicUsize::new(0),
            notifier_fails: AtomicBool::new(false),
        }
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Loads a snapshot file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_json(&content)?;
        info!(path = %path.display(), "Loaded storefront snapshot");
        Ok(store)
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.clone()
    }

    pub async fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(&*self.state.read().await)?)
    }

    /// Makes every following status mail fail.
    pub fn set_notifier_failing(&self, failing: bool) {
        self.notifier_fails.store(failing, AtomicOrdering::SeqCst);
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(AtomicOrdering::SeqCst)
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.read().await.audit.clone()
    }

    pub async fn notifications(&self) -> Vec<(i64, i64)> {
        self.state.read().await.notifications.clone()
    }
}

// =============================================================================
// Reference Data
// =============================================================================

#[async_trait]
impl ShopGateway for MemoryStorefront {
    async fn shops(&self) -> StoreResult<Vec<Shop>> {
        let mut shops = self.state.read().await.shops.clone();
        shops.sort_by_key(|s| (!s.default, s.id));
        Ok(shops)
    }

    async fn customer_groups(&self) -> StoreResult<Vec<CustomerGroup>> {
        Ok(self.state.read().await.customer_groups.clone())
    }

    async fn tax_rates(&self) -> StoreResult<Vec<TaxRate>> {
        Ok(self.state.read().await.tax_rates.clone())
    }

    async fn countries(&self) -> StoreResult<Vec<Country>> {
        Ok(self.state.read().await.countries.clone())
    }

    async fn units(&self) -> StoreResult<Vec<Unit>> {
        Ok(self.state.read().await.units.clone())
    }

    async fn suppliers(&self) -> StoreResult<Vec<Supplier>> {
        Ok(self.state.read().await.suppliers.clone())
    }

    async fn order_states(&self) -> StoreResult<Vec<OrderState>> {
        Ok(self.state.read().await.order_states.clone())
    }

    async fn payment_means(&self) -> StoreResult<Vec<PaymentMean>> {
        Ok(self.state.read().await.payment_means.clone())
    }

    async fn dispatches(&self) -> StoreResult<Vec<Dispatch>> {
        Ok(self.state.read().await.dispatches.clone())
    }

    async fn attribute_fields(&self) -> StoreResult<Vec<AttributeField>> {
        Ok(self.state.read().await.attribute_fields.clone())
    }

    async fn filter_options(&self) -> StoreResult<Vec<FilterOption>> {
        Ok(self.state.read().await.filter_options.clone())
    }

    async fn filter_groups(&self) -> StoreResult<Vec<FilterGroup>> {
        let mut groups = self.state.read().await.filter_groups.clone();
        groups.sort_by_key(|g| (g.position, g.id));
        Ok(groups)
    }

    async fn database_time(&self) -> StoreResult<NaiveDateTime> {
        Ok(Local::now().naive_local())
    }

    async fn setting(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.state.read().await.settings.get(key).cloned())
    }

    async fn save_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        debug!(key = %key, "Saving setting");
        self.state
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// =============================================================================
// Categories
// =============================================================================

#[async_trait]
impl CategoryGateway for MemoryStorefront {
    async fn categories(&self) -> StoreResult<Vec<CategoryRecord>> {
        Ok(self.state.read().await.categories.clone())
    }

    async fn create_category(&self, parent_id: i64, name: &str, position: i64) -> StoreResult<i64> {
        let mut state = self.state.write().await;
        if !state.categories.iter().any(|c| c.id == parent_id) {
            return Err(StoreError::not_found("Category", parent_id));
        }
        let id = next_id(state.categories.iter().map(|c| c.id));
        state.categories.push(CategoryRecord {
            id,
            parent_id: Some(parent_id),
            name: name.to_string(),
            position,
        });
        debug!(category_id = %id, parent_id = %parent_id, "Created category");
        Ok(id)
    }

    async fn rename_category(&self, id: i64, name: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("Category", id))?;
        category.name = name.to_string();
        Ok(())
    }

    async fn delete_category(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.categories.iter().any(|c| c.id == id) {
            return Err(StoreError::not_found("Category", id));
        }

        let mut doomed: HashSet<i64> = HashSet::from([id]);
        loop {
            let before = doomed.len();
            for category in &state.categories {
                if category.parent_id.is_some_and(|p| doomed.contains(&p)) {
                    doomed.insert(category.id);
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        state.categories.retain(|c| !doomed.contains(&c.id));
        for article in &mut state.articles {
            article.categories.retain(|c| !doomed.contains(c));
        }
        debug!(category_id = %id, removed = doomed.len(), "Deleted category subtree");
        Ok(())
    }

    async fn save_placements(&self, placements: &[Placement]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for placement in placements {
            let category = state
                .categories
                .iter_mut()
                .find(|c| c.id == placement.id)
                .ok_or_else(|| StoreError::not_found("Category", placement.id))?;
            category.parent_id = Some(placement.parent_id);
            category.position = placement.position;
        }
        Ok(())
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogGateway for MemoryStorefront {
    async fn article(&self, id: i64) -> StoreResult<Article> {
        self.state
            .read()
            .await
            .articles
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Article", id))
    }

    async fn articles(&self) -> StoreResult<Vec<Article>> {
        let mut articles = self.state.read().await.articles.clone();
        articles.sort_by_key(|a| a.id);
        Ok(articles)
    }

    async fn create_article(&self, new: NewArticle) -> StoreResult<Article> {
        let mut state = self.state.write().await;
        if state.number_taken(&new.number, None) {
            return Err(StoreError::duplicate("ordernumber", new.number));
        }

        let id = next_id(state.articles.iter().map(|a| a.id));
        let detail_id = next_id(state.details.iter().map(|d| d.id));
        let article = Article {
            id,
            name: new.name,
            tax_id: new.tax_id,
            notification: new.notification,
            main_detail_id: detail_id,
            created: Some(Utc::now().date_naive()),
            ..Article::default()
        };
        state.details.push(ArticleDetail {
            id: detail_id,
            article_id: id,
            number: new.number,
            is_main: true,
            ..ArticleDetail::default()
        });
        state.articles.push(article.clone());
        info!(article_id = %id, "Created article");
        Ok(article)
    }

    async fn save_article(&self, article: &Article) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let stored = state.article_mut(article.id)?;
        *stored = article.clone();
        stored.changed = Some(Local::now().naive_local());
        Ok(())
    }

    async fn delete_article(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.articles.len();
        state.articles.retain(|a| a.id != id);
        if state.articles.len() == before {
            return Err(StoreError::not_found("Article", id));
        }
        state.details.retain(|d| d.article_id != id);
        info!(article_id = %id, "Deleted article");
        Ok(())
    }

    async fn detail(&self, id: i64) -> StoreResult<ArticleDetail> {
        self.state
            .read()
            .await
            .details
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("ArticleDetail", id))
    }

    async fn detail_by_number(&self, number: &str) -> StoreResult<Option<ArticleDetail>> {
        Ok(self
            .state
            .read()
            .await
            .details
            .iter()
            .find(|d| d.number == number)
            .cloned())
    }

    async fn details(&self, article_id: i64) -> StoreResult<Vec<ArticleDetail>> {
        let mut details: Vec<ArticleDetail> = self
            .state
            .read()
            .await
            .details
            .iter()
            .filter(|d| d.article_id == article_id)
            .cloned()
            .collect();
        details.sort_by_key(|d| (!d.is_main, d.id));
        Ok(details)
    }

    async fn create_detail(&self, article_id: i64, number: &str) -> StoreResult<ArticleDetail> {
        let mut state = self.state.write().await;
        if !state.articles.iter().any(|a| a.id == article_id) {
            return Err(StoreError::not_found("Article", article_id));
        }
        if state.number_taken(number, None) {
            return Err(StoreError::duplicate("ordernumber", number));
        }
        let detail = ArticleDetail {
            id: next_id(state.details.iter().map(|d| d.id)),
            article_id,
            number: number.to_string(),
            ..ArticleDetail::default()
        };
        state.details.push(detail.clone());
        debug!(article_id = %article_id, number = %number, "Created detail");
        Ok(detail)
    }

    async fn save_detail(&self, detail: &ArticleDetail) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.number_taken(&detail.number, Some(detail.id)) {
            return Err(StoreError::duplicate("ordernumber", detail.number.clone()));
        }
        if !state.articles.iter().any(|a| a.id == detail.article_id) {
            return Err(StoreError::Conflict(format!(
                "detail {} assigned to missing article {}",
                detail.id, detail.article_id
            )));
        }
        let stored = state
            .details
            .iter_mut()
            .find(|d| d.id == detail.id)
            .ok_or_else(|| StoreError::not_found("ArticleDetail", detail.id))?;
        *stored = detail.clone();
        Ok(())
    }

    async fn delete_detail(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.details.len();
        state.details.retain(|d| d.id != id);
        if state.details.len() == before {
            return Err(StoreError::not_found("ArticleDetail", id));
        }
        debug!(detail_id = %id, "Deleted detail");
        Ok(())
    }

    async fn article_by_master_number(&self, number: &str) -> StoreResult<Option<i64>> {
        Ok(self
            .state
            .read()
            .await
            .articles
            .iter()
            .find(|a| a.master_number.as_deref() == Some(number))
            .map(|a| a.id))
    }

    async fn set_master_number(&self, article_id: i64, number: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.article_mut(article_id)?.master_number = Some(number.to_string());
        Ok(())
    }

    async fn configurator_groups(&self) -> StoreResult<Vec<StoreGroup>> {
        Ok(self.state.read().await.configurator_groups.clone())
    }

    async fn configurator_options(&self) -> StoreResult<Vec<StoreOption>> {
        Ok(self.state.read().await.configurator_options.clone())
    }

    async fn create_configurator_group(&self, name: &str) -> StoreResult<StoreGroup> {
        let mut state = self.state.write().await;
        if state.configurator_groups.iter().any(|g| g.name == name) {
            return Err(StoreError::duplicate("configurator group", name));
        }
        let group = StoreGroup {
            id: next_id(state.configurator_groups.iter().map(|g| g.id)),
            name: name.to_string(),
        };
        state.configurator_groups.push(group.clone());
        Ok(group)
    }

    async fn create_configurator_option(&self, group_id: i64, name: &str) -> StoreResult<StoreOption> {
        let mut state = self.state.write().await;
        if !state.configurator_groups.iter().any(|g| g.id == group_id) {
            return Err(StoreError::not_found("ConfiguratorGroup", group_id));
        }
        if state
            .configurator_options
            .iter()
            .any(|o| o.group_id == group_id && o.name == name)
        {
            return Err(StoreError::duplicate("configurator option", name));
        }
        let option = StoreOption {
            id: next_id(state.configurator_options.iter().map(|o| o.id)),
            group_id,
            name: name.to_string(),
        };
        state.configurator_options.push(option.clone());
        Ok(option)
    }
}

// =============================================================================
// Customers
// =============================================================================

#[async_trait]
impl CustomerGateway for MemoryStorefront {
    async fn customers(&self, query: &CustomerQuery) -> StoreResult<Vec<Customer>> {
        let state = self.state.read().await;
        let mut matching: Vec<&Customer> = state
            .customers
            .iter()
            .filter(|c| query.accepts(|column| state.customer_column(c, column)))
            .collect();

        matching.sort_by(|a, b| {
            let explicit = query.sort.map_or(Ordering::Equal, |(column, direction)| {
                direction.apply(compare_column(
                    column,
                    &state.customer_column(a, column),
                    &state.customer_column(b, column),
                ))
            });
            explicit.then_with(|| b.id.cmp(&a.id))
        });

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn customer(&self, id: i64) -> StoreResult<Customer> {
        self.state
            .read()
            .await
            .customers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Customer", id))
    }

    async fn set_customer_number(&self, id: i64, number: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let customer = state
            .customers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("Customer", id))?;
        customer.customer_number = number.to_string();
        Ok(())
    }

    async fn customer_stats(&self) -> StoreResult<CustomerStats> {
        let state = self.state.read().await;
        Ok(CustomerStats {
            count: state.customers.len() as i64,
            max_customer_id: state.customers.iter().map(|c| c.id).max().unwrap_or(0),
            max_customer_number: state
                .customers
                .iter()
                .filter_map(|c| c.customer_number.trim().parse::<i64>().ok())
                .max()
                .unwrap_or(0),
        })
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderGateway for MemoryStorefront {
    async fn orders(&self, query: OrderQuery) -> StoreResult<Vec<Order>> {
        let mut orders = self.state.read().await.orders.clone();
        orders.sort_by_key(|o| o.id);
        if query.descending {
            orders.reverse();
        }
        Ok(orders
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn order(&self, id: i64) -> StoreResult<Order> {
        self.state
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Order", id))
    }

    async fn set_order_status(&self, id: i64, status: i64, comment: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        order.status = status;
        order.comment = comment.to_string();
        info!(order_id = %id, status = %status, "Order status changed");
        Ok(())
    }

    async fn set_tracking_code(&self, id: i64, code: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        order.tracking_code = code.to_string();
        Ok(())
    }

    async fn payone_transaction(&self, order_id: i64) -> StoreResult<Option<String>> {
        Ok(self.state.read().await.payone.get(&order_id).cloned())
    }

    async fn order_stats(&self) -> StoreResult<OrderStats> {
        let state = self.state.read().await;
        Ok(OrderStats {
            count: state.orders.len() as i64,
            max_order_id: state.orders.iter().map(|o| o.id).max().unwrap_or(0),
        })
    }
}

#[async_trait]
impl StatusNotifier for MemoryStorefront {
    async fn notify_status(&self, order_id: i64, status: i64) -> StoreResult<()> {
        if self.notifier_fails.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Backend("mail transport unavailable".into()));
        }
        self.state
            .write()
            .await
            .notifications
            .push((order_id, status));
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryStorefront {
    async fn flush(&self) -> StoreResult<()> {
        self.flushes.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl AuditLog for MemoryStorefront {
    async fn record(&self, entry: AuditEntry) -> StoreResult<()> {
        self.state.write().await.audit.push(entry);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
