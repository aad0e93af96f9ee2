//! # Product Synchronization
//!
//! `product.count`, `product.get`, `product.delete`, `product.create_update`
//! and `product.update_stock`.
//!
//! ## Import Chain
//! ```text
//! product.create_update(product)
//!     │
//!     ├── resolve art_nr ──► NotFound? create (first combination's number)
//!     │
//!     ├──  1. base fields          flags, dates, supplier, main detail data
//!     ├──  2. categories           swg + all_categories
//!     ├──  3. links                content entries of type "link"
//!     ├──  4. cross-selling        group 1 related, group 2 similar
//!     ├──  5. visibility           whitelist → blacklist
//!     ├──  6. images               replaced as a whole
//!     ├──  7. properties           filterN values, attrN attributes
//!     ├──  8. tax                  before prices
//!     ├──  9. prices               per customer group
//!     ├── 10. translations         default language on the record
//!     ├── 11. packaging unit
//!     ├── 12. variants             reconcile / collapse
//!     ├── 13. variant images
//!     └── 14. activation, save, flush                        → {ok, success: 1}
//! ```
//!
//! Steps run strictly in this order. The article record is built up in
//! memory and written once at the end.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use actindo_core::price::to_f64;
use actindo_core::types::{shipping_time, ZERO_DATE};
use actindo_core::wire::{entries, flag, is_collection, loose_i64, loose_string};
use actindo_core::{
    CategoryTree, HubAttributes, HubImage, HubProduct, HubProperty, HubStockUpdate,
    HubVariantMatrix,
};
use actindo_store::{
    Article, ArticleDetail, ArticleImage, ArticleLink, ArticleTranslation, NewArticle,
};

use crate::category::load_tree;
use crate::context::RequestContext;
use crate::error::{SyncError, SyncResult};
use crate::identity;
use crate::price::{export_prices, import_prices, write_prices};
use crate::variant::{self, save_details};

/// Cross-selling group for related articles.
const RELATED_GROUP: i64 = 1;
/// Cross-selling group for similar articles.
const SIMILAR_GROUP: i64 = 2;
/// Prefix of filter properties (`filter12`).
const FILTER_PREFIX: &str = "filter";

// =============================================================================
// Count & Delete
// =============================================================================

/// `product.count`: articles per category, `-1` holding the total.
pub async fn count(ctx: &RequestContext, category_id: i64) -> SyncResult<Value> {
    let articles = ctx.gateway().articles().await?;

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for article in &articles {
        for id in &article.categories {
            if category_id > 0 && *id != category_id {
                continue;
            }
            *counts.entry(*id).or_default() += 1;
        }
    }

    let mut count = Map::new();
    count.insert("-1".into(), json!(articles.len()));
    for (id, n) in counts {
        count.insert(id.to_string(), json!(n));
    }
    Ok(json!({ "ok": true, "count": count }))
}

/// `product.delete`.
pub async fn delete(ctx: &RequestContext, number: &str) -> SyncResult<Value> {
    let article_id = identity::resolve_article_id(ctx, number).await?;
    ctx.gateway().delete_article(article_id).await?;
    ctx.gateway().flush().await?;
    identity::forget(ctx, number).await;
    info!(article_id = %article_id, number = %number, "Deleted article");
    Ok(json!({ "ok": true }))
}

// =============================================================================
// Export
// =============================================================================

/// `product.get`.
///
/// Without an order number (empty or `"0"`), or with `just_list`, the call
/// lists articles; otherwise `number` is the storefront article id to export
/// in full.
pub async fn get(
    ctx: &RequestContext,
    number: &str,
    just_list: bool,
    offset: usize,
    limit: usize,
    filters: &Value,
) -> SyncResult<Value> {
    let number = number.trim();
    if number.is_empty() || number == "0" {
        return list(ctx, offset, limit, filters).await;
    }
    if just_list {
        let mut filters = filters.as_object().cloned().unwrap_or_default();
        filters.insert("ordernumber".into(), json!(number));
        return list(ctx, offset, limit, &Value::Object(filters)).await;
    }
    let article_id = number
        .parse::<i64>()
        .map_err(|_| SyncError::validation(format!("not an article id: {number}")))?;
    export(ctx, article_id).await
}

/// Compact listing keyed by article id.
///
/// `filters.start` and `filters.limit` override the positional paging, a
/// `limit` of 0 lists everything. `filters.ordernumber` narrows the list to
/// one article (none when the number is unknown).
pub async fn list(
    ctx: &RequestContext,
    offset: usize,
    limit: usize,
    filters: &Value,
) -> SyncResult<Value> {
    let offset = filters
        .get("start")
        .map(|v| loose_i64(v).max(0) as usize)
        .unwrap_or(offset);
    let limit = filters
        .get("limit")
        .map(|v| loose_i64(v).max(0) as usize)
        .unwrap_or(limit);

    let only = match filters.get("ordernumber").map(loose_string) {
        Some(number) if !number.is_empty() => {
            match identity::resolve_article_id(ctx, &number).await {
                Ok(id) => Some(id),
                Err(err) if err.is_not_found() => Some(0),
                Err(err) => return Err(err),
            }
        }
        _ => None,
    };

    let mut articles = ctx.gateway().articles().await?;
    articles.retain(|a| only.map_or(true, |id| a.id == id));
    articles.sort_by_key(|a| a.id);
    let take = if limit == 0 { usize::MAX } else { limit };
    let page: Vec<Article> = articles.into_iter().skip(offset).take(take).collect();

    let tree = tree_or_none(ctx).await?;
    let numbers = identity::external_numbers(ctx, &page).await?;

    let mut products = Map::new();
    for article in &page {
        products.insert(
            article.id.to_string(),
            json!({
                "products_id": article.id,
                "art_nr": numbers.get(&article.id).cloned().unwrap_or_default(),
                "art_name": article.name,
                "grundpreis": 0.0,
                "categories_id": first_category(tree.as_ref(), &article.categories),
                "products_status": flag(article.active),
                "created": date_timestamp(article.created),
                "last_modified": datetime_timestamp(article.changed),
            }),
        );
    }

    debug!(count = products.len(), offset, limit, "Listed articles");
    Ok(json!({ "ok": true, "products": products }))
}

/// Full export of one article.
pub async fn export(ctx: &RequestContext, article_id: i64) -> SyncResult<Value> {
    let gateway = ctx.gateway();
    let article = gateway.article(article_id).await?;
    let main = gateway.detail(article.main_detail_id).await?;
    let language = ctx.default_language_code().await?;
    let default_language_id = ctx.default_language().await?.map(|l| l.id).unwrap_or_default();
    let tree = tree_or_none(ctx).await?;
    let prices = export_prices(ctx, &main.prices).await?;

    let unit = match main.unit_id {
        Some(id) => gateway
            .units()
            .await?
            .into_iter()
            .find(|u| u.id == id)
            .map(|u| u.description)
            .unwrap_or_default(),
        None => String::new(),
    };

    let mut record = Map::new();
    record.insert("products_id".into(), json!(article.id));
    record.insert("articledetailsID".into(), json!(main.id));
    record.insert("art_nr".into(), json!(identity::external_number(ctx, &article).await?));
    record.insert("art_name".into(), json!(article.name));
    record.insert("abverkauf".into(), json!(flag(article.last_stock)));
    record.insert("bundle".into(), json!(flag(article.cross_bundle_look)));
    record.insert("products_digital".into(), json!(flag(article.esd)));
    record.insert("topseller".into(), json!(flag(article.highlight)));
    record.insert("pseudosales".into(), json!(article.pseudo_sales));
    record.insert("notification".into(), json!(flag(article.notification)));
    record.insert("manufacturers_id".into(), json!(article.supplier_id));
    record.insert("filtergroup_id".into(), json!(article.filter_group_id.unwrap_or_default()));
    record.insert("fsk18".into(), json!(0));
    record.insert("products_status".into(), json!(flag(article.active)));
    record.insert("created".into(), json!(date_timestamp(article.created)));
    record.insert("last_modified".into(), json!(datetime_timestamp(article.changed)));
    record.insert(
        "products_date_available".into(),
        json!(article
            .available_from
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| ZERO_DATE.to_string())),
    );
    record.insert("mwst".into(), json!(to_f64(ctx.tax_rate(article.tax_id).await?)));

    // main detail
    record.insert("l_bestand".into(), json!(main.in_stock));
    record.insert("products_quantity".into(), json!(main.in_stock));
    record.insert("products_ean".into(), json!(main.ean));
    record.insert("products_sort".into(), json!(main.position));
    record.insert("suppliernumber".into(), json!(main.supplier_number));
    record.insert("shipping_free".into(), json!(flag(main.shipping_free)));
    record.insert("shipping_status".into(), json!(main.shipping_time + 1));
    record.insert("weight".into(), json!(main.weight));
    record.insert("products_weight".into(), json!(main.weight));
    record.insert("weight_unit".into(), json!("kg"));
    record.insert("height".into(), json!(number_text(main.height)));
    record.insert("length".into(), json!(number_text(main.len)));
    record.insert("width".into(), json!(number_text(main.width)));
    record.insert("einheit".into(), json!(unit));
    record.insert("products_vpe".into(), json!(main.unit_id.unwrap_or_default()));
    record.insert("products_vpe_status".into(), json!(flag(main.purchase_unit.is_some())));
    record.insert("products_vpe_value".into(), json!(optional_text(main.purchase_unit)));
    record.insert(
        "products_vpe_referenzeinheit".into(),
        json!(optional_text(main.reference_unit)),
    );
    record.insert("products_vpe_staffelung".into(), json!(optional_text(main.purchase_steps)));

    // prices
    write_prices(&mut record, &prices);
    record.insert("ek".into(), json!(prices.ek));

    // categories
    record.insert("categories_id".into(), json!(primary_category(tree.as_ref(), &article.categories)));
    record.insert("all_categories".into(), json!(article.categories));

    // texts
    record.insert("products_description".into(), json!(article.description_long));
    record.insert("products_short_description".into(), json!(article.description));
    record.insert("products_keywords".into(), json!(article.keywords));
    record.insert(
        "description".into(),
        Value::Object(export_descriptions(ctx, &article, default_language_id).await?),
    );

    record.insert("content".into(), json!(export_links(&article, &language)));
    record.insert("xselling".into(), json!(export_cross_selling(ctx, &article).await?));

    let groups: Vec<i64> = ctx
        .customer_groups()
        .await?
        .iter()
        .map(|g| g.id)
        .filter(|id| !article.customer_group_blacklist.contains(id))
        .collect();
    record.insert("group_permission".into(), json!(groups));

    record.insert(
        "images".into(),
        json!(article
            .images
            .iter()
            .filter(|i| !i.is_variant_only())
            .enumerate()
            .map(|(n, image)| export_image(image, n))
            .collect::<Vec<_>>()),
    );
    record.insert(
        "properties".into(),
        json!(export_properties(ctx, &article, &main, &language).await?),
    );

    let attributes = if article.is_variant_family() {
        export_variants(ctx, &article, &language).await?
    } else {
        Value::Array(Vec::new())
    };
    record.insert("attributes".into(), attributes);

    Ok(json!({ "ok": true, "products": [Value::Object(record)] }))
}

/// `{language id: texts}` for the default language and every translation.
async fn export_descriptions(
    ctx: &RequestContext,
    article: &Article,
    default_language_id: i64,
) -> SyncResult<Map<String, Value>> {
    let mut descriptions = Map::new();
    descriptions.insert(
        default_language_id.to_string(),
        json!({
            "language_id": default_language_id,
            "products_name": article.name,
            "products_description": article.description_long,
            "products_short_description": article.description,
            "products_keywords": article.keywords,
        }),
    );

    let shops = ctx.shops().await?;
    for (shop_id, translation) in &article.translations {
        let Some(shop) = shops.iter().find(|s| s.id == *shop_id) else {
            continue;
        };
        if shop.locale_id == default_language_id {
            continue;
        }
        descriptions.insert(
            shop.locale_id.to_string(),
            json!({
                "language_id": shop.locale_id,
                "products_name": translation.name,
                "products_description": translation.description_long,
                "products_short_description": translation.description,
                "products_keywords": translation.keywords,
            }),
        );
    }
    Ok(descriptions)
}

fn export_links(article: &Article, language: &str) -> Vec<Value> {
    article
        .links
        .iter()
        .map(|link| {
            json!({
                "language_code": if link.language.is_empty() { language } else { link.language.as_str() },
                "type": "link",
                "content": link.link,
                "content_target": link.target,
                "content_name": link.name,
            })
        })
        .collect()
}

/// Related and similar articles by their external numbers; articles that no
/// longer exist are skipped.
async fn export_cross_selling(ctx: &RequestContext, article: &Article) -> SyncResult<Vec<Value>> {
    let mut entries = Vec::new();
    let groups = [(RELATED_GROUP, &article.related), (SIMILAR_GROUP, &article.similar)];
    for (group, ids) in groups {
        for (sort_order, id) in ids.iter().enumerate() {
            let other = match ctx.gateway().article(*id).await {
                Ok(other) => other,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err.into()),
            };
            entries.push(json!({
                "art_nr": identity::external_number(ctx, &other).await?,
                "group": group,
                "sort_order": sort_order,
            }));
        }
    }
    Ok(entries)
}

fn export_image(image: &ArticleImage, index: usize) -> Value {
    let file_name = if image.extension.is_empty() {
        image.name.clone()
    } else {
        format!("{}.{}", image.name, image.extension)
    };
    json!({
        "image": image.payload,
        "image_size": image.size,
        "image_type": mime_type(&image.extension),
        "image_name": file_name,
        "image_nr": index,
        "image_title": image.titles,
    })
}

fn mime_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "png" => "image/png",
        _ => "image/jpeg",
    }
}

/// Configured attribute fields of the main detail (plus translated values)
/// and filter values as `filterN` joined by `|`.
async fn export_properties(
    ctx: &RequestContext,
    article: &Article,
    main: &ArticleDetail,
    language: &str,
) -> SyncResult<Vec<Value>> {
    let fields = ctx.attribute_fields().await?;
    let is_field = |name: &str| fields.iter().any(|f| f.name == name);
    let property = |field: &str, code: &str, value: &str| {
        json!({ "field_id": field, "language_code": code, "field_value": value })
    };

    let mut properties: Vec<Value> = main
        .attributes
        .iter()
        .filter(|(name, _)| is_field(name))
        .map(|(name, value)| property(name, language, value))
        .collect();

    let shops = ctx.shops().await?;
    for (shop_id, translation) in &article.translations {
        let Some(shop) = shops.iter().find(|s| s.id == *shop_id) else {
            continue;
        };
        let code = actindo_core::order::language_code(&shop.locale);
        for (name, value) in translation.attributes.iter().filter(|(n, _)| is_field(n)) {
            properties.push(property(name, &code, value));
        }
    }

    for (option_id, values) in &article.filter_values {
        properties.push(property(
            &format!("{FILTER_PREFIX}{option_id}"),
            language,
            &values.join("|"),
        ));
    }
    Ok(properties)
}

/// The variant matrix of a family in the hub's shape.
async fn export_variants(
    ctx: &RequestContext,
    article: &Article,
    language: &str,
) -> SyncResult<Value> {
    let gateway = ctx.gateway();
    let set = article.configurator_set.clone().unwrap_or_default();
    let groups = gateway.configurator_groups().await?;
    let options = gateway.configurator_options().await?;

    let mut names = Map::new();
    let mut values = Map::new();
    let mut simple = Map::new();
    for group in groups.iter().filter(|g| set.group_ids.contains(&g.id)) {
        names.insert(group.id.to_string(), json!({ language: group.name }));
        let mut group_values = Map::new();
        let mut group_simple = Map::new();
        for option in options
            .iter()
            .filter(|o| o.group_id == group.id && set.option_ids.contains(&o.id))
        {
            group_values.insert(option.id.to_string(), json!({ language: option.name }));
            group_simple.insert(
                option.id.to_string(),
                json!({
                    "options_values_price": 0,
                    "attributes_model": 0,
                    "options_values_weight": 0,
                    "sortorder": 0,
                }),
            );
        }
        values.insert(group.id.to_string(), Value::Object(group_values));
        simple.insert(group.id.to_string(), Value::Object(group_simple));
    }

    let mut details = gateway.details(article.id).await?;
    details.sort_by(|a, b| a.number.cmp(&b.number));

    let mut advanced = Map::new();
    for detail in &details {
        let mut name_ids = Vec::new();
        let mut value_ids = Vec::new();
        for option in options.iter().filter(|o| detail.option_ids.contains(&o.id)) {
            name_ids.push(option.group_id);
            value_ids.push(option.id);
        }

        let mut combination = Map::new();
        combination.insert("attribute_name_id".into(), json!(name_ids));
        combination.insert("attribute_value_id".into(), json!(value_ids));
        combination.insert(
            "data".into(),
            json!({
                "products_status": flag(detail.active),
                "products_ean": detail.ean,
                "products_is_standard": flag(detail.is_main),
            }),
        );
        combination.insert("l_bestand".into(), json!(detail.in_stock));
        write_prices(&mut combination, &export_prices(ctx, &detail.prices).await?);

        let images: Vec<Value> = article
            .images
            .iter()
            .filter(|i| i.mappings.iter().any(|m| m.is_subset(&detail.option_ids)))
            .enumerate()
            .map(|(n, image)| export_image(image, n))
            .collect();
        combination.insert("shop".into(), json!({ "images": images }));

        advanced.insert(detail.number.clone(), Value::Object(combination));
    }

    Ok(json!({
        "names": names,
        "values": values,
        "combination_simple": simple,
        "combination_advanced": advanced,
    }))
}

// =============================================================================
// Import
// =============================================================================

/// `product.create_update`.
pub async fn create_update(ctx: &RequestContext, payload: &Value) -> SyncResult<Value> {
    let product: HubProduct = serde_json::from_value(payload.clone())?;
    if product.art_nr.trim().is_empty() {
        return Err(SyncError::validation("art_nr missing"));
    }

    let article_id = match identity::resolve_article_id(ctx, &product.art_nr).await {
        Ok(id) => id,
        Err(err) if err.is_not_found() => create(ctx, &product).await?,
        Err(err) => return Err(err),
    };

    update(ctx, article_id, &product).await?;
    Ok(json!({ "ok": true, "success": 1 }))
}

async fn create(ctx: &RequestContext, product: &HubProduct) -> SyncResult<i64> {
    let number = product.creation_number().to_string();
    let article = ctx
        .gateway()
        .create_article(NewArticle {
            name: product.art_name.clone(),
            number: number.clone(),
            tax_id: ctx.config().tax.standard_tax_id,
            notification: true,
        })
        .await?;
    info!(article_id = %article.id, number = %number, "Created article");
    Ok(article.id)
}

async fn update(ctx: &RequestContext, article_id: i64, product: &HubProduct) -> SyncResult<()> {
    let gateway = ctx.gateway();
    let mut article = gateway.article(article_id).await?;
    let mut main = gateway.detail(article.main_detail_id).await?;
    let language = ctx.default_language_code().await?;
    let art = &product.shop.art;

    // 1
    article.active = art.products_status;
    article.available_from = art.available_from().and_then(parse_date);
    article.cross_bundle_look = art.bundle;
    article.esd = art.products_digital;
    article.filter_group_id = (art.filtergroup_id > 0).then_some(art.filtergroup_id);
    article.highlight = art.topseller;
    article.last_stock = art.abverkauf;
    article.pseudo_sales = art.pseudosales;
    article.supplier_id = art.manufacturers_id;
    article.notification = art.email_notification;
    if !product.art_name.is_empty() {
        article.name = product.art_name.clone();
    }

    main.ean = product.ean.clone();
    main.height = product.size_h;
    main.len = product.size_l;
    main.width = product.size_b;
    main.in_stock = product.l_bestand;
    main.position = art.products_sort;
    main.release_date = article.available_from;
    main.shipping_free = art.shipping_free;
    main.shipping_time = shipping_time(art.shipping_status);
    main.supplier_number = art.suppliernumber.clone();
    main.weight = if art.products_weight != 0.0 {
        art.products_weight
    } else {
        product.weight
    };

    // 2
    article.categories = product.category_ids();

    // 3
    article.links = product
        .shop
        .content
        .iter()
        .filter(|c| c.kind == "link")
        .map(|c| ArticleLink {
            name: c.content_name.clone(),
            link: c.content.clone(),
            target: c.content_link_target.clone(),
            language: c.language_code.clone(),
        })
        .collect();

    // 4
    article.related.clear();
    article.similar.clear();
    for entry in &product.shop.xselling {
        let other = match identity::resolve_article_id(ctx, &entry.art_nr).await {
            Ok(id) => id,
            Err(err) if err.is_not_found() => {
                debug!(number = %entry.art_nr, "Skipping unknown cross-selling article");
                continue;
            }
            Err(err) => return Err(err),
        };
        let target = match entry.group {
            RELATED_GROUP => &mut article.related,
            SIMILAR_GROUP => &mut article.similar,
            _ => continue,
        };
        if !target.contains(&other) {
            target.push(other);
        }
    }

    // 5
    article.customer_group_blacklist = match &product.shop.group_permission {
        Some(allowed) => ctx
            .customer_groups()
            .await?
            .iter()
            .map(|g| g.id)
            .filter(|id| !allowed.contains(id))
            .collect(),
        None => Vec::new(),
    };

    // 6
    article.images = product
        .shop
        .images
        .iter()
        .enumerate()
        .map(|(n, image)| article_image(image, &language, n as i64))
        .collect();
    if let Some(first) = article.images.first_mut() {
        first.main = true;
    }

    // 7
    apply_properties(ctx, &mut article, &mut main, &product.shop.properties, &language).await?;

    // 8
    article.tax_id = ctx.config().tax.tax_id(&product.mwst_stkey);

    // 9
    main.prices = import_prices(
        ctx,
        &product.preisgruppen,
        article.tax_id,
        &art.products_pseudoprices,
        product.ek,
        &main.prices,
    )
    .await?;

    // 10
    apply_translations(ctx, &mut article, product).await?;

    // 11
    if art.products_vpe_status {
        main.purchase_steps = art.products_vpe_staffelung.or(Some(art.products_vpe_value));
        main.purchase_unit = Some(art.products_vpe_value);
        main.reference_unit = art.products_vpe_referenzeinheit.or(Some(art.products_vpe_value));
        main.unit_id = Some(art.products_vpe);
        main.pack_unit = product.einheit.clone();
    } else {
        main.purchase_steps = None;
        main.purchase_unit = None;
        main.reference_unit = None;
        main.unit_id = None;
        main.pack_unit = String::new();
    }

    // 12 + 13
    match &product.shop.attributes {
        HubAttributes::Matrix(matrix) => {
            gateway.save_detail(&main).await?;
            import_variants(ctx, &mut article, matrix, &main, product, &language).await?;
        }
        HubAttributes::Plain => {
            main.active = article.active;
            gateway.save_detail(&main).await?;
            variant::collapse(ctx, &mut article).await?;
        }
        HubAttributes::Absent => {
            main.active = article.active;
            gateway.save_detail(&main).await?;
        }
    }

    // 14
    gateway.save_article(&article).await?;
    gateway.flush().await?;

    info!(
        article_id = %article.id,
        number = %product.art_nr,
        categories = article.categories.len(),
        images = article.images.len(),
        "Imported article"
    );
    Ok(())
}

async fn import_variants(
    ctx: &RequestContext,
    article: &mut Article,
    matrix: &HubVariantMatrix,
    template: &ArticleDetail,
    product: &HubProduct,
    language: &str,
) -> SyncResult<()> {
    let outcome =
        variant::reconcile(ctx, article, matrix, template, product.ek, &product.art_nr).await?;

    let first_position = article.images.len() as i64;
    let images = variant::variant_images(matrix, &outcome.mapping, language, first_position);
    article.images.extend(images);
    Ok(())
}

/// Filter values (only when the article has a filter group) and attribute
/// fields. Attributes in the default language land on the main detail,
/// other languages on the matching shop's translation.
async fn apply_properties(
    ctx: &RequestContext,
    article: &mut Article,
    main: &mut ArticleDetail,
    properties: &[HubProperty],
    language: &str,
) -> SyncResult<()> {
    let fields = ctx.attribute_fields().await?;
    let filter_options = ctx.gateway().filter_options().await?;

    main.attributes.clear();
    article.filter_values.clear();
    for translation in article.translations.values_mut() {
        translation.attributes.clear();
    }

    for property in properties {
        let code = if property.language_code.is_empty() {
            language
        } else {
            property.language_code.as_str()
        };

        if let Some(option_id) = property
            .field_id
            .strip_prefix(FILTER_PREFIX)
            .and_then(|id| id.parse::<i64>().ok())
        {
            if article.filter_group_id.is_none() || code != language {
                continue;
            }
            if !filter_options.iter().any(|o| o.id == option_id) {
                debug!(option_id, "Skipping unknown filter option");
                continue;
            }
            let values: Vec<String> = property
                .field_value
                .split('|')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect();
            if !values.is_empty() {
                article.filter_values.insert(option_id, values);
            }
            continue;
        }

        if !fields.iter().any(|f| f.name == property.field_id) {
            continue;
        }
        if code == language {
            main.attributes
                .insert(property.field_id.clone(), property.field_value.clone());
        } else if let Some(shop) = ctx.shop_for_language(code).await? {
            article
                .translations
                .entry(shop.id)
                .or_default()
                .attributes
                .insert(property.field_id.clone(), property.field_value.clone());
        }
    }
    Ok(())
}

/// Default-language texts go onto the record, other languages onto the
/// translation of a shop with that language.
async fn apply_translations(
    ctx: &RequestContext,
    article: &mut Article,
    product: &HubProduct,
) -> SyncResult<()> {
    let default_id = ctx.default_language().await?.map(|l| l.id);

    for desc in &product.shop.desc {
        let name = if desc.products_name.is_empty() {
            product.art_name.clone()
        } else {
            desc.products_name.clone()
        };

        if Some(desc.language_id) == default_id {
            article.name = name;
            article.description = desc.products_short_description.clone();
            article.description_long = desc.products_description.clone();
            article.keywords = desc.products_keywords.clone();
            continue;
        }

        let Some(shop) = ctx.shop_for_language(&desc.language_code).await? else {
            debug!(language = %desc.language_code, "No shop for translation language");
            continue;
        };
        let translation: &mut ArticleTranslation = article.translations.entry(shop.id).or_default();
        translation.name = name;
        translation.description = desc.products_short_description.clone();
        translation.description_long = desc.products_description.clone();
        translation.keywords = desc.products_keywords.clone();
    }
    Ok(())
}

/// Storefront image from a hub image; titles keep every language, the
/// description takes the given language's title.
pub(crate) fn article_image(hub: &HubImage, language: &str, position: i64) -> ArticleImage {
    let (name, extension) = match hub.image_name.rsplit_once('.') {
        Some((name, extension)) if !name.is_empty() => (name.to_string(), extension.to_lowercase()),
        _ => (hub.image_name.clone(), extension_for(&hub.image_type).to_string()),
    };
    ArticleImage {
        id: position + 1,
        name,
        extension,
        description: hub.image_title.get(language).cloned().unwrap_or_default(),
        titles: hub.image_title.clone(),
        position,
        main: false,
        payload: hub.image.clone(),
        size: hub.image_size,
        mappings: Vec::new(),
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/bmp" => "bmp",
        "image/gif" => "gif",
        "image/png" => "png",
        _ => "jpg",
    }
}

// =============================================================================
// Stock
// =============================================================================

/// `product.update_stock`, for one product or a batch keyed by anything.
///
/// A batch never fails as a whole: every entry reports into `success`, and
/// failing entries also carry their fault in `failed`.
pub async fn update_stock(ctx: &RequestContext, payload: &Value) -> SyncResult<Value> {
    if payload.get("art_nr").is_some() || !is_collection(payload) {
        return import_stock(ctx, payload).await;
    }

    let keyed: Vec<(String, &Value)> = match payload {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        _ => entries(payload)
            .into_iter()
            .enumerate()
            .map(|(n, v)| (n.to_string(), v))
            .collect(),
    };

    let mut success = Map::new();
    let mut failed = Map::new();
    for (key, item) in keyed {
        let result = match import_stock(ctx, item).await {
            Ok(result) => result,
            Err(err) => {
                warn!(key = %key, error = %err, "Stock update failed");
                err.to_fault()
            }
        };
        let ok = result.get("ok").and_then(Value::as_bool).unwrap_or(false);
        success.insert(key.clone(), json!(ok));
        if !ok {
            failed.insert(key, result);
        }
    }

    Ok(json!({ "ok": true, "success": success, "failed": failed }))
}

async fn import_stock(ctx: &RequestContext, item: &Value) -> SyncResult<Value> {
    let update: HubStockUpdate = serde_json::from_value(item.clone())?;
    let gateway = ctx.gateway();
    let article_id = identity::resolve_article_id(ctx, &update.art_nr).await?;
    let variants = &update.attributes.combination_advanced;

    if !variants.is_empty() {
        let details = gateway.details(article_id).await?;
        let mut changed = Vec::with_capacity(variants.len());
        for (number, stock) in variants.iter() {
            let Some(detail) = details.iter().find(|d| d.number == number) else {
                debug!(article_id = %article_id, number = %number, "Skipping unknown variant");
                continue;
            };
            let mut detail = detail.clone();
            detail.in_stock = stock.l_bestand;
            if let Some(active) = stock.data.products_status {
                detail.active = active;
            }
            if let Some(status) = stock.data.shipping_status {
                detail.shipping_time = shipping_time(status);
            }
            changed.push(detail);
        }
        save_details(ctx, &changed).await?;
        debug!(article_id = %article_id, variants = changed.len(), "Updated variant stock");
    } else {
        let mut article = gateway.article(article_id).await?;
        let mut main = gateway.detail(article.main_detail_id).await?;
        article.active = update.products_status;
        main.in_stock = update.l_bestand;
        main.shipping_time = shipping_time(update.shipping_status);
        gateway.save_article(&article).await?;
        gateway.save_detail(&main).await?;
        gateway.flush().await?;
        debug!(article_id = %article_id, stock = main.in_stock, "Updated stock");
    }

    Ok(json!({ "ok": true }))
}

// =============================================================================
// Helpers
// =============================================================================

/// The category tree, or `None` when the storefront's tree is unusable;
/// exports still work without category levels.
async fn tree_or_none(ctx: &RequestContext) -> SyncResult<Option<CategoryTree>> {
    match load_tree(ctx).await {
        Ok(tree) => Ok(Some(tree)),
        Err(SyncError::Conflict(message)) => {
            warn!(error = %message, "Category tree unusable for export");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// First of the article's categories in depth-first tree order.
fn first_category(tree: Option<&CategoryTree>, categories: &[i64]) -> i64 {
    let Some(tree) = tree else {
        return categories.first().copied().unwrap_or_default();
    };
    tree.depth_first()
        .into_iter()
        .find(|id| categories.contains(id))
        .or_else(|| categories.first().copied())
        .unwrap_or_default()
}

/// The article's category closest to the root.
fn primary_category(tree: Option<&CategoryTree>, categories: &[i64]) -> i64 {
    let level = |id: &i64| tree.and_then(|t| t.level(*id)).unwrap_or(usize::MAX);
    categories
        .iter()
        .enumerate()
        .min_by_key(|(n, id)| (level(id), *n))
        .map(|(_, id)| *id)
        .unwrap_or_default()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn date_timestamp(date: Option<NaiveDate>) -> i64 {
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(-1)
}

fn datetime_timestamp(datetime: Option<NaiveDateTime>) -> i64 {
    datetime.map(|dt| dt.and_utc().timestamp()).unwrap_or(-1)
}

/// `10` for 10.0, `10.5` for 10.5.
fn number_text(value: f64) -> String {
    value.to_string()
}

fn optional_text(value: Option<f64>) -> String {
    value.map(number_text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{context, shop};
    use actindo_core::CategoryRecord;
    use actindo_store::{
        AttributeField, CatalogGateway, CustomerGroup, FilterOption, MemoryStorefront, Snapshot,
        TaxRate, Unit,
    };

    fn group(id: i64, key: &str, gross: bool) -> CustomerGroup {
        CustomerGroup {
            id,
            key: key.into(),
            description: key.into(),
            show_gross: gross,
            gross_entry: gross,
            discount: 0.0,
            minimum_order: 0.0,
        }
    }

    fn field(name: &str) -> AttributeField {
        AttributeField {
            name: name.into(),
            label: String::new(),
            translatable: true,
            help: String::new(),
            required: false,
            field_type: "text".into(),
            variantable: false,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            shops: vec![shop(1, 1, "de_DE", true), shop(2, 2, "en_GB", false)],
            customer_groups: vec![group(1, "EK", true), group(2, "H", false), group(3, "B", true)],
            tax_rates: vec![TaxRate { id: 1, rate: 19.0 }, TaxRate { id: 4, rate: 7.0 }],
            categories: vec![
                CategoryRecord { id: 1, parent_id: None, name: "Root".into(), position: 0 },
                CategoryRecord { id: 2, parent_id: Some(1), name: "Kleidung".into(), position: 0 },
                CategoryRecord { id: 3, parent_id: Some(2), name: "Hemden".into(), position: 0 },
            ],
            attribute_fields: vec![field("attr1")],
            filter_options: vec![FilterOption { id: 5, name: "Farbe".into(), group_ids: vec![7] }],
            units: vec![Unit { id: 1, unit: "St".into(), description: "Stück".into() }],
            ..Snapshot::default()
        }
    }

    fn shirt() -> Value {
        json!({
            "art_nr": "SHIRT",
            "art_name": "Hemd",
            "swg": 3,
            "l_bestand": "7",
            "ean": "4001",
            "size_h": 10,
            "size_l": "20.5",
            "size_b": 5,
            "weight": 0.3,
            "mwst_stkey": "2",
            "ek": 4.5,
            "einheit": "Stück",
            "preisgruppen": {"1": {"is_brutto": 1, "grundpreis": 10.7}},
            "shop": {
                "art": {
                    "products_status": 1,
                    "products_date_available": "2024-05-01 00:00:00",
                    "filtergroup_id": 7,
                    "shipping_status": 3,
                    "products_sort": 2,
                    "products_vpe_status": 1,
                    "products_vpe_value": 0.5,
                    "products_vpe": 1
                },
                "all_categories": [2, 3],
                "group_permission": [1, 3],
                "content": [
                    {"type": "link", "content": "https://example.org/a.pdf",
                     "content_name": "Datenblatt", "content_link_target": "_blank",
                     "language_code": "de"},
                    {"type": "file", "content": "ignored"}
                ],
                "images": [
                    {"image_name": "front.png", "image": "AAAA", "image_size": 12.0,
                     "image_title": {"de": "Vorne", "en": "Front"}}
                ],
                "properties": [
                    {"field_id": "attr1", "field_value": "Baumwolle", "language_code": "de"},
                    {"field_id": "attr1", "field_value": "Cotton", "language_code": "en"},
                    {"field_id": "attr9", "field_value": "unknown field", "language_code": "de"},
                    {"field_id": "filter5", "field_value": "rot|blau", "language_code": "de"}
                ],
                "desc": [
                    {"language_id": 1, "language_code": "de", "products_name": "Hemd",
                     "products_short_description": "Kurz", "products_description": "Lang"},
                    {"language_id": 2, "language_code": "en", "products_name": "Shirt"}
                ],
                "attributes": ""
            }
        })
    }

    fn family() -> Value {
        let mut product = shirt();
        product["art_nr"] = json!("POLO");
        product["shop"]["attributes"] = json!({
            "names": {"10": {"de": "Farbe"}},
            "values": {"10": {"100": {"de": "Rot"}, "101": {"de": "Blau"}}},
            "combination_advanced": {
                "POLO-R": {"attribute_name_id": [10], "attribute_value_id": [100],
                           "l_bestand": 3, "data": {"products_status": 1}},
                "POLO-B": {"attribute_name_id": [10], "attribute_value_id": [101],
                           "l_bestand": 4, "data": {"products_status": 1}}
            }
        });
        product
    }

    async fn imported(store: &MemoryStorefront, number: &str) -> Article {
        let detail = store.detail_by_number(number).await.unwrap().unwrap();
        store.article(detail.article_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_update_creates_plain_article() {
        let (store, ctx) = context(snapshot());

        let result = create_update(&ctx, &shirt()).await.unwrap();
        assert_eq!(result, json!({"ok": true, "success": 1}));

        let article = imported(&store, "SHIRT").await;
        assert_eq!(article.tax_id, 4);
        assert_eq!(article.categories, vec![3, 2]);
        assert_eq!(article.customer_group_blacklist, vec![2]);
        assert_eq!(article.description_long, "Lang");
        assert_eq!(article.translations[&2].name, "Shirt");
        assert_eq!(article.translations[&2].attributes["attr1"], "Cotton");
        assert_eq!(article.filter_values[&5], vec!["rot".to_string(), "blau".to_string()]);
        assert_eq!(article.links.len(), 1);
        assert_eq!(article.available_from, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert!(article.images[0].main);
        assert_eq!(article.images[0].description, "Vorne");

        let main = store.detail(article.main_detail_id).await.unwrap();
        assert_eq!(main.in_stock, 7);
        assert_eq!(main.shipping_time, 2);
        assert_eq!(main.attributes.len(), 1);
        assert_eq!(main.purchase_unit, Some(0.5));
        assert_eq!(main.reference_unit, Some(0.5));
        assert_eq!(main.pack_unit, "Stück");
        assert!(main.active);
        assert_eq!(main.prices.len(), 1);
    }

    #[tokio::test]
    async fn test_second_import_updates_in_place() {
        let (store, ctx) = context(snapshot());
        create_update(&ctx, &shirt()).await.unwrap();

        let mut changed = shirt();
        changed["l_bestand"] = json!(1);
        changed["mwst_stkey"] = json!("1");
        changed["shop"]["art"]["products_vpe_status"] = json!(0);
        changed["shop"].as_object_mut().unwrap().remove("group_permission");
        create_update(&ctx, &changed).await.unwrap();

        assert_eq!(store.articles().await.unwrap().len(), 1);
        let article = imported(&store, "SHIRT").await;
        assert_eq!(article.tax_id, 1);
        assert!(article.customer_group_blacklist.is_empty());
        let main = store.detail(article.main_detail_id).await.unwrap();
        assert_eq!(main.in_stock, 1);
        assert_eq!(main.purchase_unit, None);
        assert!(main.pack_unit.is_empty());
    }

    #[tokio::test]
    async fn test_family_is_created_from_first_combination() {
        let (store, ctx) = context(snapshot());
        create_update(&ctx, &family()).await.unwrap();

        let article = imported(&store, "POLO-B").await;
        assert_eq!(article.master_number.as_deref(), Some("POLO"));
        assert_eq!(store.detail(article.main_detail_id).await.unwrap().number, "POLO-R");
        assert_eq!(store.details(article.id).await.unwrap().len(), 2);

        // re-import resolves through the master number
        create_update(&ctx, &family()).await.unwrap();
        assert_eq!(store.articles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_import_collapses_family() {
        let (store, ctx) = context(snapshot());
        create_update(&ctx, &family()).await.unwrap();

        let mut plain = family();
        plain["shop"]["attributes"] = json!([]);
        create_update(&ctx, &plain).await.unwrap();

        let article = imported(&store, "POLO").await;
        assert!(article.configurator_set.is_none());
        assert_eq!(store.details(article.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_export_round_trips_key_fields() {
        let (store, ctx) = context(snapshot());
        let mut product = shirt();
        product["shop"]["xselling"] = json!([{"art_nr": "GONE", "group": 1}]);
        create_update(&ctx, &product).await.unwrap();
        let article = imported(&store, "SHIRT").await;

        let result = export(&ctx, article.id).await.unwrap();
        let record = &result["products"][0];

        assert_eq!(record["art_nr"], "SHIRT");
        assert_eq!(record["categories_id"], 2);
        assert_eq!(record["group_permission"], json!([1, 3]));
        assert_eq!(record["mwst"], 7.0);
        assert_eq!(record["shipping_status"], 3);
        assert_eq!(record["einheit"], "Stück");
        assert_eq!(record["length"], "20.5");
        assert_eq!(record["products_date_available"], "2024-05-01");
        assert_eq!(record["images"][0]["image_name"], "front.png");
        assert_eq!(record["images"][0]["image_type"], "image/png");
        assert_eq!(record["xselling"], json!([]));
        assert_eq!(record["description"]["2"]["products_name"], "Shirt");
        assert_eq!(record["preisgruppen"]["1"]["grundpreis"], 10.7);

        let properties = record["properties"].as_array().unwrap();
        assert!(properties.contains(&json!({
            "field_id": "filter5", "language_code": "de", "field_value": "rot|blau"
        })));
        assert!(properties.contains(&json!({
            "field_id": "attr1", "language_code": "en", "field_value": "Cotton"
        })));
    }

    #[tokio::test]
    async fn test_export_of_family_carries_matrix() {
        let (store, ctx) = context(snapshot());
        create_update(&ctx, &family()).await.unwrap();
        let article = imported(&store, "POLO-R").await;
        assert_eq!(identity::resolve_article_id(&ctx, "POLO").await.unwrap(), article.id);

        let result = export(&ctx, article.id).await.unwrap();
        let attributes = &result["products"][0]["attributes"];

        assert_eq!(result["products"][0]["art_nr"], "POLO");
        let advanced = attributes["combination_advanced"].as_object().unwrap();
        assert_eq!(advanced.keys().collect::<Vec<_>>(), vec!["POLO-B", "POLO-R"]);
        assert_eq!(advanced["POLO-R"]["data"]["products_is_standard"], 1);
        assert_eq!(advanced["POLO-B"]["l_bestand"], 4);
    }

    #[tokio::test]
    async fn test_list_uses_master_numbers_and_filters() {
        let (_, ctx) = context(snapshot());
        create_update(&ctx, &shirt()).await.unwrap();
        create_update(&ctx, &family()).await.unwrap();

        let all = get(&ctx, "", false, 0, 0, &Value::Null).await.unwrap();
        let numbers: Vec<&Value> = all["products"]
            .as_object()
            .unwrap()
            .values()
            .map(|p| &p["art_nr"])
            .collect();
        assert_eq!(numbers, vec!["SHIRT", "POLO"]);
        assert_eq!(all["products"]["1"]["categories_id"], 2);

        let zero = get(&ctx, " 0 ", false, 0, 0, &Value::Null).await.unwrap();
        assert_eq!(zero, all);

        let one = get(&ctx, "POLO-B", true, 0, 0, &json!({})).await.unwrap();
        assert_eq!(one["products"].as_object().unwrap().len(), 1);

        let none = list(&ctx, 0, 10, &json!({"ordernumber": "NOPE"})).await.unwrap();
        assert!(none["products"].as_object().unwrap().is_empty());

        let paged = list(&ctx, 0, 10, &json!({"start": 1, "limit": 1})).await.unwrap();
        assert!(paged["products"].get("2").is_some());
    }

    #[tokio::test]
    async fn test_count_per_category_with_total() {
        let (_, ctx) = context(snapshot());
        create_update(&ctx, &shirt()).await.unwrap();
        create_update(&ctx, &family()).await.unwrap();

        let all = count(&ctx, 0).await.unwrap();
        assert_eq!(all["count"]["-1"], 2);
        assert_eq!(all["count"]["3"], 2);

        let one = count(&ctx, 2).await.unwrap();
        assert!(one["count"].get("3").is_none());
        assert_eq!(one["count"]["2"], 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_number_is_not_found() {
        let (store, ctx) = context(snapshot());
        create_update(&ctx, &shirt()).await.unwrap();

        delete(&ctx, "SHIRT").await.unwrap();
        assert!(store.articles().await.unwrap().is_empty());

        let err = delete(&ctx, "SHIRT").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stock_batch_reports_per_key() {
        let (store, ctx) = context(snapshot());
        create_update(&ctx, &shirt()).await.unwrap();
        create_update(&ctx, &family()).await.unwrap();

        let result = update_stock(
            &ctx,
            &json!({
                "a": {"art_nr": "SHIRT", "l_bestand": 42, "products_status": 0, "shipping_status": 1},
                "b": {"art_nr": "NOPE", "l_bestand": 1},
                "c": {"art_nr": "POLO", "attributes": {"combination_advanced": {
                    "POLO-B": {"l_bestand": 9, "data": {"products_status": 0}}
                }}}
            }),
        )
        .await
        .unwrap();

        assert_eq!(result["success"], json!({"a": true, "b": false, "c": true}));
        assert_eq!(result["failed"]["b"]["ok"], false);

        let shirt = imported(&store, "SHIRT").await;
        assert!(!shirt.active);
        let main = store.detail(shirt.main_detail_id).await.unwrap();
        assert_eq!(main.in_stock, 42);

        let blue = store.detail_by_number("POLO-B").await.unwrap().unwrap();
        assert_eq!(blue.in_stock, 9);
        assert!(!blue.active);
        let red = store.detail_by_number("POLO-R").await.unwrap().unwrap();
        assert_eq!(red.in_stock, 3);
    }

    #[tokio::test]
    async fn test_single_stock_update_propagates_errors() {
        let (_, ctx) = context(snapshot());
        let err = update_stock(&ctx, &json!({"art_nr": "NOPE", "l_bestand": 1}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
