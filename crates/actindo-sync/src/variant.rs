//! # Variant Reconciliation
//!
//! Brings the details of one article in line with the hub's variant matrix.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        reconcile(article, matrix)                       │
//! │                                                                         │
//! │  1. configurator set   names differ? → rebuild, create groups/options   │
//! │  2. mapping            hub ids ⇄ storefront ids, joined by name         │
//! │  3. plan               set-equal match → Keep                           │
//! │                        same number     → Adopt (options replaced)       │
//! │                        otherwise       → Create                         │
//! │                        renumbered Keep → parked on a temporary number   │
//! │  4. repair             Create hits a foreign detail → reassign, audit   │
//! │  5. stale details      deleted                                          │
//! │  6. copy data          stock, flags, texts, prices, attributes          │
//! │  7. write              chunked, flush after each chunk                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The article record itself (configurator set, main detail, master number)
//! is only updated in memory; the product import saves it afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

use actindo_core::types::shipping_time;
use actindo_core::variant::{
    plan, same_names, AttributeMapping, ExistingVariant, StoreGroup, StoreOption, VariantAction,
    WantedVariant,
};
use actindo_core::{HubCombination, HubVariantMatrix};
use actindo_store::{Article, ArticleDetail, ArticleImage, AuditEntry, ConfiguratorSet};

use crate::context::RequestContext;
use crate::error::{SyncError, SyncResult};
use crate::identity;
use crate::price::import_prices;
use crate::product::article_image;

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Detail ids in hub order; the first one is the main detail.
    pub details: Vec<i64>,
    pub created: usize,
    pub adopted: usize,
    pub repaired: usize,
    pub deleted: usize,
    /// The mapping the plan was made with.
    pub mapping: AttributeMapping,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.adopted == 0 && self.repaired == 0 && self.deleted == 0
    }
}

/// Reconciles the details of `article` with `matrix`.
///
/// `template` carries the product-level detail fields every variant
/// inherits (dimensions, packaging unit, supplier number, ...).
pub async fn reconcile(
    ctx: &RequestContext,
    article: &mut Article,
    matrix: &HubVariantMatrix,
    template: &ArticleDetail,
    base_price: f64,
    master_number: &str,
) -> SyncResult<Reconciliation> {
    let gateway = ctx.gateway();
    let language = ctx.default_language_code().await?;
    let hub_groups = matrix.group_names(&language);
    let hub_values = matrix.value_names(&language);

    // 1 + 2
    let (set_groups, set_options) =
        ensure_configurator_set(ctx, article, &hub_groups, &hub_values).await?;
    let mapping = AttributeMapping::build(&hub_groups, &hub_values, &set_groups, &set_options);

    // 3
    let option_groups: HashMap<i64, i64> = gateway
        .configurator_options()
        .await?
        .into_iter()
        .map(|o| (o.id, o.group_id))
        .collect();
    let existing: Vec<ExistingVariant> = gateway
        .details(article.id)
        .await?
        .into_iter()
        .map(|d| ExistingVariant {
            detail_id: d.id,
            group_ids: d
                .option_ids
                .iter()
                .filter_map(|o| option_groups.get(o).copied())
                .collect(),
            option_ids: d.option_ids.clone(),
            number: d.number,
        })
        .collect();
    let wanted: Vec<WantedVariant> = matrix
        .combination_advanced
        .iter()
        .map(|(number, c)| WantedVariant {
            number: number.to_string(),
            group_ids: c.attribute_name_id.clone(),
            option_ids: c.attribute_value_id.clone(),
        })
        .collect();
    let plan = plan(&wanted, &existing, &mapping);
    park_renumbered(ctx, &plan.actions, &existing).await?;

    let mut outcome = Reconciliation::default();
    let mut resolved: Vec<ArticleDetail> = Vec::with_capacity(plan.actions.len());

    // 4
    for action in &plan.actions {
        let detail = match action {
            VariantAction::Keep { detail_id, .. } => gateway.detail(*detail_id).await?,
            VariantAction::Adopt { detail_id, number } => {
                let detail = gateway.detail(*detail_id).await?;
                outcome.adopted += 1;
                if !detail.option_ids.is_empty() {
                    warn!(
                        article_id = %article.id,
                        detail_id = %detail.id,
                        number = %number,
                        "Replacing options of a detail whose number matched"
                    );
                    gateway
                        .record(AuditEntry::new(
                            "ArticleDetail",
                            detail.id,
                            "options_replaced",
                            format!("ordernumber {number} matched without its options"),
                        ))
                        .await?;
                }
                detail
            }
            VariantAction::Create { number } => {
                let (detail, repaired) = claim_or_create(ctx, article.id, number).await?;
                if repaired {
                    outcome.repaired += 1;
                } else {
                    outcome.created += 1;
                }
                detail
            }
        };
        resolved.push(detail);
    }

    // 5
    for detail_id in &plan.stale {
        gateway.delete_detail(*detail_id).await?;
        outcome.deleted += 1;
    }
    if outcome.deleted > 0 {
        debug!(article_id = %article.id, deleted = outcome.deleted, "Deleted stale details");
    }

    // 6
    let fields = ctx.attribute_fields().await?;
    let combinations: Vec<(&str, &HubCombination)> = matrix.combination_advanced.iter().collect();
    let mut updated = Vec::with_capacity(resolved.len());
    for (index, (detail, (number, combination))) in
        resolved.into_iter().zip(combinations).enumerate()
    {
        let mut prices = import_prices(
            ctx,
            &combination.preisgruppen,
            article.tax_id,
            &combination.shop.art.products_pseudoprices,
            base_price,
            &detail.prices,
        )
        .await?;
        if prices.is_empty() {
            prices = template.prices.clone();
        }

        let attributes: BTreeMap<String, String> = combination
            .shop
            .properties
            .iter()
            .filter(|p| fields.iter().any(|f| f.variantable && f.name == p.field_id))
            .map(|p| (p.field_id.clone(), p.field_value.clone()))
            .collect();

        updated.push(ArticleDetail {
            id: detail.id,
            article_id: article.id,
            number: number.to_string(),
            is_main: index == 0,
            active: combination.data.products_status,
            in_stock: combination.l_bestand,
            additional_text: option_text(&combination.attribute_value_id, &hub_values),
            ean: combination.shop.art.products_ean.clone(),
            shipping_time: shipping_time(combination.data.shipping_status),
            weight: combination.shop.art.products_weight,
            position: index as i64,
            prices,
            option_ids: mapping
                .translate_options(&combination.attribute_value_id)
                .unwrap_or_default(),
            attributes,
            ..template.clone()
        });
        identity::forget(ctx, &detail.number).await;
    }

    // 7
    save_details(ctx, &updated).await?;

    outcome.details = updated.iter().map(|d| d.id).collect();
    if let Some(main) = outcome.details.first() {
        article.main_detail_id = *main;
    }
    if !master_number.is_empty() {
        article.master_number = Some(master_number.to_string());
    }
    outcome.mapping = mapping;

    info!(
        article_id = %article.id,
        variants = outcome.details.len(),
        created = outcome.created,
        adopted = outcome.adopted,
        repaired = outcome.repaired,
        deleted = outcome.deleted,
        "Reconciled variants"
    );
    Ok(outcome)
}

/// Option names of a combination, joined by ` / `.
fn option_text(value_ids: &[i64], names: &BTreeMap<i64, (i64, String)>) -> String {
    value_ids
        .iter()
        .filter_map(|id| names.get(id).map(|(_, name)| name.as_str()))
        .collect::<Vec<_>>()
        .join(" / ")
}

// =============================================================================
// Configurator Set
// =============================================================================

/// Makes the article's configurator set carry exactly the hub's groups and
/// values; returns the set's groups and options.
async fn ensure_configurator_set(
    ctx: &RequestContext,
    article: &mut Article,
    hub_groups: &BTreeMap<i64, String>,
    hub_values: &BTreeMap<i64, (i64, String)>,
) -> SyncResult<(Vec<StoreGroup>, Vec<StoreOption>)> {
    let gateway = ctx.gateway();
    let mut groups = gateway.configurator_groups().await?;
    let mut options = gateway.configurator_options().await?;

    let up_to_date = article.configurator_set.as_ref().is_some_and(|set| {
        let set_groups = groups
            .iter()
            .filter(|g| set.group_ids.contains(&g.id))
            .map(|g| g.name.as_str());
        let set_options = options
            .iter()
            .filter(|o| set.option_ids.contains(&o.id))
            .map(|o| o.name.as_str());
        same_names(set_groups, hub_groups.values().map(String::as_str))
            && same_names(set_options, hub_values.values().map(|(_, name)| name.as_str()))
    });

    if !up_to_date {
        let mut set = ConfiguratorSet {
            name: article
                .configurator_set
                .as_ref()
                .map(|s| s.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Set-{}", article.id)),
            ..ConfiguratorSet::default()
        };

        for (hub_id, name) in hub_groups {
            let group = match groups.iter().find(|g| g.name == *name) {
                Some(group) => group.clone(),
                None => {
                    let group = gateway.create_configurator_group(name).await?;
                    groups.push(group.clone());
                    group
                }
            };
            if !set.group_ids.contains(&group.id) {
                set.group_ids.push(group.id);
            }

            for (_, (_, value)) in hub_values.iter().filter(|(_, (group, _))| group == hub_id) {
                let existing = options
                    .iter()
                    .find(|o| o.group_id == group.id && o.name == *value)
                    .cloned();
                let option = match existing {
                    Some(option) => option,
                    None => {
                        let option = gateway.create_configurator_option(group.id, value).await?;
                        options.push(option.clone());
                        option
                    }
                };
                set.option_ids.insert(option.id);
            }
        }

        info!(
            article_id = %article.id,
            groups = set.group_ids.len(),
            options = set.option_ids.len(),
            "Rebuilt configurator set"
        );
        article.configurator_set = Some(set);
    }

    let set = article.configurator_set.clone().unwrap_or_default();
    Ok((
        groups
            .into_iter()
            .filter(|g| set.group_ids.contains(&g.id))
            .collect(),
        options
            .into_iter()
            .filter(|o| set.option_ids.contains(&o.id))
            .collect(),
    ))
}

// =============================================================================
// Renumbering
// =============================================================================

/// Prefix of the number a kept detail holds while its new one is written.
const PARKED_PREFIX: &str = "~parked-";

/// Moves kept details whose number changes onto a temporary number.
///
/// Numbers are unique across the storefront, so swapping or rotating the
/// numbers of siblings cannot be written in one pass. Parked numbers are
/// derived from the detail id; an interrupted run leaves them behind and
/// the next run replaces them.
async fn park_renumbered(
    ctx: &RequestContext,
    actions: &[VariantAction],
    existing: &[ExistingVariant],
) -> SyncResult<usize> {
    let gateway = ctx.gateway();
    let mut parked = 0;

    for action in actions {
        let VariantAction::Keep { detail_id, number } = action else {
            continue;
        };
        let unchanged = existing
            .iter()
            .any(|d| d.detail_id == *detail_id && d.number == *number);
        if unchanged {
            continue;
        }

        let mut detail = gateway.detail(*detail_id).await?;
        identity::forget(ctx, &detail.number).await;
        detail.number = format!("{PARKED_PREFIX}{}", detail.id);
        gateway.save_detail(&detail).await?;
        parked += 1;
    }

    if parked > 0 {
        gateway.flush().await?;
        debug!(parked, "Parked renumbered details");
    }
    Ok(parked)
}

// =============================================================================
// Repair
// =============================================================================

/// Creates a detail for `number`, or takes over the detail that already
/// carries it. The flag tells whether a foreign detail was taken over.
async fn claim_or_create(
    ctx: &RequestContext,
    article_id: i64,
    number: &str,
) -> SyncResult<(ArticleDetail, bool)> {
    let gateway = ctx.gateway();
    let Some(mut detail) = gateway.detail_by_number(number).await? else {
        return Ok((gateway.create_detail(article_id, number).await?, false));
    };

    if detail.article_id == article_id {
        return Err(SyncError::conflict(format!(
            "ordernumber {number} is already used by another variant of article {article_id}"
        )));
    }

    let previous_owner = detail.article_id;
    match gateway.article(previous_owner).await {
        Ok(owner) if owner.main_detail_id == detail.id => {
            return Err(SyncError::conflict(format!(
                "ordernumber {number} is the main detail of article {previous_owner}"
            )));
        }
        Ok(_) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }

    warn!(
        article_id = %article_id,
        detail_id = %detail.id,
        previous_owner = %previous_owner,
        number = %number,
        "Taking over detail from another article"
    );
    gateway
        .record(AuditEntry::new(
            "ArticleDetail",
            detail.id,
            "reassigned",
            format!("ordernumber {number} moved from article {previous_owner} to {article_id}"),
        ))
        .await?;

    detail.article_id = article_id;
    detail.is_main = false;
    detail.option_ids = BTreeSet::new();
    identity::forget(ctx, number).await;
    Ok((detail, true))
}

// =============================================================================
// Collapse
// =============================================================================

/// Turns a former variant family back into a plain article.
///
/// Extra details are deleted, the main detail takes the stored master
/// number and the configurator set is dropped. Returns the number of
/// deleted details.
pub async fn collapse(ctx: &RequestContext, article: &mut Article) -> SyncResult<usize> {
    let gateway = ctx.gateway();
    let details = gateway.details(article.id).await?;
    if details.len() <= 1 && article.configurator_set.is_none() {
        return Ok(0);
    }

    let main_id = details
        .iter()
        .find(|d| d.id == article.main_detail_id)
        .or_else(|| details.first())
        .map(|d| d.id);

    let mut deleted = 0;
    for detail in details.iter().filter(|d| Some(d.id) != main_id) {
        gateway.delete_detail(detail.id).await?;
        identity::forget(ctx, &detail.number).await;
        deleted += 1;
    }

    if let Some(mut main) = details.into_iter().find(|d| Some(d.id) == main_id) {
        if let Some(master) = article.master_number.clone().filter(|n| !n.is_empty()) {
            identity::forget(ctx, &main.number).await;
            main.number = master;
        }
        main.is_main = true;
        main.additional_text.clear();
        main.option_ids.clear();
        gateway.save_detail(&main).await?;
        article.main_detail_id = main.id;
    }
    article.configurator_set = None;
    gateway.flush().await?;

    info!(article_id = %article.id, deleted, "Collapsed variant family");
    Ok(deleted)
}

// =============================================================================
// Images
// =============================================================================

/// Variant images of a matrix, deduplicated by name and size.
///
/// Each image carries the option set of every variant that uses it;
/// variants whose options cannot be mapped contribute no mapping.
pub fn variant_images(
    matrix: &HubVariantMatrix,
    mapping: &AttributeMapping,
    language: &str,
    first_position: i64,
) -> Vec<ArticleImage> {
    let mut images: Vec<((String, String), ArticleImage)> = Vec::new();

    for (_, combination) in matrix.combination_advanced.iter() {
        let options = mapping.translate_options(&combination.attribute_value_id);
        for hub in &combination.shop.images {
            let key = (hub.image_name.clone(), format!("{:.2}", hub.image_size));
            let index = match images.iter().position(|(k, _)| *k == key) {
                Some(index) => index,
                None => {
                    let position = first_position + images.len() as i64;
                    images.push((key, article_image(hub, language, position)));
                    images.len() - 1
                }
            };
            if let Some(options) = &options {
                let image = &mut images[index].1;
                if !image.mappings.contains(options) {
                    image.mappings.push(options.clone());
                }
            }
        }
    }

    images.into_iter().map(|(_, image)| image).collect()
}

// =============================================================================
// Writes
// =============================================================================

/// Saves details in chunks, flushing after each chunk.
pub(crate) async fn save_details(ctx: &RequestContext, details: &[ArticleDetail]) -> SyncResult<()> {
    let gateway = ctx.gateway();
    for chunk in details.chunks(ctx.config().batch.chunk_size.max(1)) {
        for detail in chunk {
            gateway.save_detail(detail).await?;
        }
        gateway.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectorConfig;
    use crate::context::tests::{context, shop};
    use crate::error::ErrorKind;
    use std::sync::Arc;
    use actindo_store::{CatalogGateway, NewArticle, Snapshot};
    use serde_json::json;

    fn snapshot() -> Snapshot {
        Snapshot {
            shops: vec![shop(1, 1, "de_DE", true)],
            ..Snapshot::default()
        }
    }

    fn matrix(combinations: serde_json::Value) -> HubVariantMatrix {
        serde_json::from_value(json!({
            "names": {"10": {"de": "Farbe"}, "11": {"de": "Größe"}},
            "values": {
                "10": {"100": {"de": "Rot"}, "101": {"de": "Blau"}},
                "11": {"110": {"de": "M"}, "111": {"de": "L"}}
            },
            "combination_advanced": combinations
        }))
        .unwrap()
    }

    fn two_shirts() -> HubVariantMatrix {
        matrix(json!({
            "SHIRT-R-M": {
                "attribute_name_id": [10, 11], "attribute_value_id": [100, 110],
                "l_bestand": 5, "data": {"products_status": 1, "shipping_status": 3},
                "shop": {"images": [{"image_name": "rot.jpg", "image_size": 1024.001}]}
            },
            "SHIRT-B-L": {
                "attribute_name_id": [11, 10], "attribute_value_id": [111, 101],
                "l_bestand": "2",
                "shop": {"images": [{"image_name": "rot.jpg", "image_size": 1024.0}]}
            }
        }))
    }

    async fn family(store: &actindo_store::MemoryStorefront, number: &str) -> Article {
        store
            .create_article(NewArticle {
                name: "Shirt".into(),
                number: number.into(),
                tax_id: 1,
                notification: false,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_family_adopts_main_detail() {
        let (store, ctx) = context(snapshot());
        let mut article = family(&store, "SHIRT-R-M").await;

        let outcome = reconcile(&ctx, &mut article, &two_shirts(), &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();
        store.save_article(&article).await.unwrap();

        assert_eq!(outcome.adopted, 1);
        assert_eq!(outcome.created, 1);
        assert_eq!(article.master_number.as_deref(), Some("SHIRT"));
        assert_eq!(article.configurator_set.as_ref().unwrap().option_ids.len(), 4);

        let details = store.details(article.id).await.unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].number, "SHIRT-R-M");
        assert_eq!(details[0].additional_text, "Rot / M");
        assert_eq!(details[0].shipping_time, 2);
        assert!(details[0].active);
        assert_eq!(details[1].in_stock, 2);
        assert!(!details[1].is_main);
    }

    #[tokio::test]
    async fn test_second_run_changes_nothing() {
        let (store, ctx) = context(snapshot());
        let mut article = family(&store, "SHIRT-R-M").await;
        reconcile(&ctx, &mut article, &two_shirts(), &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();
        store.save_article(&article).await.unwrap();

        let ctx = RequestContext::new(store.clone(), Arc::new(ConnectorConfig::default()));
        let mut article = store.article(article.id).await.unwrap();
        let outcome = reconcile(&ctx, &mut article, &two_shirts(), &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();

        assert!(outcome.is_noop());
        assert_eq!(outcome.details.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_combination_is_deleted() {
        let (store, ctx) = context(snapshot());
        let mut article = family(&store, "SHIRT-R-M").await;
        reconcile(&ctx, &mut article, &two_shirts(), &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();

        let only_red = matrix(json!({
            "SHIRT-R-M": {"attribute_name_id": [10, 11], "attribute_value_id": [100, 110]}
        }));
        let outcome = reconcile(&ctx, &mut article, &only_red, &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();

        assert_eq!(outcome.deleted, 1);
        assert!(store.detail_by_number("SHIRT-B-L").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_swapped_numbers_follow_their_options() {
        let (store, ctx) = context(snapshot());
        let mut article = family(&store, "SHIRT-R-M").await;
        reconcile(&ctx, &mut article, &two_shirts(), &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();
        store.save_article(&article).await.unwrap();
        let red = store.detail_by_number("SHIRT-R-M").await.unwrap().unwrap();
        let blue = store.detail_by_number("SHIRT-B-L").await.unwrap().unwrap();

        let swapped = matrix(json!({
            "SHIRT-B-L": {"attribute_name_id": [10, 11], "attribute_value_id": [100, 110]},
            "SHIRT-R-M": {"attribute_name_id": [10, 11], "attribute_value_id": [101, 111]}
        }));
        let outcome = reconcile(&ctx, &mut article, &swapped, &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();

        assert_eq!(outcome.details, vec![red.id, blue.id]);
        assert_eq!(outcome.created + outcome.deleted, 0);
        let red = store.detail(red.id).await.unwrap();
        let blue = store.detail(blue.id).await.unwrap();
        assert_eq!(red.number, "SHIRT-B-L");
        assert_eq!(red.additional_text, "Rot / M");
        assert_eq!(blue.number, "SHIRT-R-M");
        assert_eq!(blue.additional_text, "Blau / L");
    }

    #[tokio::test]
    async fn test_new_variant_may_take_number_given_up_by_sibling() {
        let (store, ctx) = context(snapshot());
        let mut article = family(&store, "SHIRT-R-M").await;
        let only_red = matrix(json!({
            "SHIRT-R-M": {"attribute_name_id": [10, 11], "attribute_value_id": [100, 110]}
        }));
        reconcile(&ctx, &mut article, &only_red, &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();
        let red = store.detail_by_number("SHIRT-R-M").await.unwrap().unwrap();

        let moved = matrix(json!({
            "SHIRT-RED": {"attribute_name_id": [10, 11], "attribute_value_id": [100, 110]},
            "SHIRT-R-M": {"attribute_name_id": [10, 11], "attribute_value_id": [101, 111]}
        }));
        let outcome = reconcile(&ctx, &mut article, &moved, &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.repaired, 0);
        assert_eq!(store.detail(red.id).await.unwrap().number, "SHIRT-RED");
        let blue = store.detail_by_number("SHIRT-R-M").await.unwrap().unwrap();
        assert_ne!(blue.id, red.id);
        assert_eq!(blue.article_id, article.id);
    }

    #[tokio::test]
    async fn test_orphaned_detail_is_taken_over_and_audited() {
        let mut snap = snapshot();
        snap.details.push(ArticleDetail {
            id: 50,
            article_id: 99,
            number: "SHIRT-B-L".into(),
            ..ArticleDetail::default()
        });
        let (store, ctx) = context(snap);
        let mut article = family(&store, "SHIRT-R-M").await;

        let outcome = reconcile(&ctx, &mut article, &two_shirts(), &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();

        assert_eq!(outcome.repaired, 1);
        assert_eq!(store.detail(50).await.unwrap().article_id, article.id);
        let audit = store.audit_entries().await;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "reassigned");
        assert_eq!(audit[0].entity_id, 50);
    }

    #[tokio::test]
    async fn test_foreign_main_detail_is_a_conflict() {
        let (store, ctx) = context(snapshot());
        family(&store, "SHIRT-B-L").await;
        let mut article = family(&store, "SHIRT-R-M").await;

        let err = reconcile(&ctx, &mut article, &two_shirts(), &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_collapse_keeps_main_under_master_number() {
        let (store, ctx) = context(snapshot());
        let mut article = family(&store, "SHIRT-R-M").await;
        reconcile(&ctx, &mut article, &two_shirts(), &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();

        let deleted = collapse(&ctx, &mut article).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(article.configurator_set.is_none());
        let details = store.details(article.id).await.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].number, "SHIRT");
        assert!(details[0].option_ids.is_empty());
    }

    #[tokio::test]
    async fn test_variant_images_are_shared_by_name_and_size() {
        let (store, ctx) = context(snapshot());
        let mut article = family(&store, "SHIRT-R-M").await;
        let matrix = two_shirts();
        let outcome = reconcile(&ctx, &mut article, &matrix, &ArticleDetail::default(), 0.0, "SHIRT")
            .await
            .unwrap();

        let images = variant_images(&matrix, &outcome.mapping, "de", 3);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].position, 3);
        assert_eq!(images[0].mappings.len(), 2);
        assert!(images[0].is_variant_only());
    }
}
