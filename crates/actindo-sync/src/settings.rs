//! # Shop Settings & Diagnostics
//!
//! `settings.get` plus the `actindo.*` diagnostics (`ping`, `get_time`,
//! `get_connector_version`).
//!
//! ## settings.get
//! ```text
//! settings.get(vars)
//!     │
//!     ├── vars.notification_url_order? ──► url::Url::parse ──► save_setting
//!     │
//!     └── reference data, keyed the way the hub expects:
//!             languages            language id  → language
//!             customers_status     group id     → names per language
//!             vpe                  unit id      → language id → name
//!             orders_status        state id     → language id → text
//!             xsell_groups         1 / 2        → names per language
//!             artikel_properties   field id     → field definition
//!             installed_*_modules  code         → module
//!             multistores          shop id      → shop
//! ```

use chrono::{Local, NaiveDateTime, Timelike, Utc};
use serde_json::{json, Map, Value};
use tracing::info;

use actindo_core::wire::flag;
use actindo_core::PROTOCOL_VERSION;

use crate::context::{Language, RequestContext};
use crate::error::{SyncError, SyncResult};

/// Setting key of the URL the hub wants pinged on new orders.
pub const NOTIFICATION_URL_KEY: &str = "notification_url_order";

/// Highest shipping time offered, in days.
const MAX_SHIPPING_DAYS: i64 = 31;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `settings.get`.
pub async fn get(ctx: &RequestContext, vars: &Value) -> SyncResult<Value> {
    if let Some(url) = vars.get(NOTIFICATION_URL_KEY).and_then(Value::as_str) {
        store_notification_url(ctx, url).await?;
    }

    let languages = ctx.languages().await?;
    let gateway = ctx.gateway();

    let mut settings = Map::new();
    settings.insert("languages".into(), languages_of(languages));
    settings.insert(
        "manufacturers".into(),
        gateway
            .suppliers()
            .await?
            .into_iter()
            .map(|s| json!({ "manufacturers_id": s.id, "manufacturers_name": s.name }))
            .collect(),
    );

    let mut groups = Map::new();
    for group in ctx.customer_groups().await? {
        let name = format!("{} - {}", group.key, group.description);
        groups.insert(
            group.id.to_string(),
            json!({
                "customers_status_id": group.id,
                "customers_status_min_order": group.minimum_order,
                "customers_status_discount": group.discount,
                "customers_status_show_price_tax": flag(group.show_gross),
                "customers_status_name": per_language(languages, |_| json!(name)),
            }),
        );
    }
    settings.insert("customers_status".into(), Value::Object(groups));

    let mut units = Map::new();
    for unit in gateway.units().await? {
        let name = format!("{} - {}", unit.unit, unit.description);
        units.insert(
            unit.id.to_string(),
            per_language(languages, |_| json!({ "products_vpe": unit.id, "vpe_name": name })),
        );
    }
    settings.insert("vpe".into(), Value::Object(units));

    settings.insert(
        "shipping".into(),
        (0..=MAX_SHIPPING_DAYS)
            .map(|days| json!({ "id": days + 1, "text": format!("{days} Tage") }))
            .collect(),
    );

    let mut states = Map::new();
    for state in gateway.order_states().await? {
        states.insert(
            state.id.to_string(),
            per_language(languages, |_| json!(state.description)),
        );
    }
    settings.insert("orders_status".into(), Value::Object(states));

    settings.insert("xsell_groups".into(), cross_selling_groups(languages));
    settings.insert("artikel_properties".into(), article_properties(ctx).await?);
    settings.insert(
        "artikel_property_sets".into(),
        gateway
            .filter_groups()
            .await?
            .into_iter()
            .map(|g| {
                json!({
                    "id": g.id,
                    "name": format!("Filter: {}", g.name),
                    "comparable": flag(g.comparable),
                    "position": g.position,
                })
            })
            .collect(),
    );

    let mut payments = Map::new();
    for mean in gateway.payment_means().await? {
        payments.insert(
            mean.name.clone(),
            json!({
                "id": mean.id,
                "code": mean.name,
                "active": flag(mean.active),
                "name": mean.description,
            }),
        );
    }
    settings.insert("installed_payment_modules".into(), Value::Object(payments));

    let mut dispatches = gateway.dispatches().await?;
    dispatches.sort_by(|a, b| a.name.cmp(&b.name));
    let mut shipping_modules = Map::new();
    for dispatch in dispatches {
        shipping_modules.insert(
            dispatch.name.clone(),
            json!({
                "id": dispatch.id,
                "code": dispatch.name,
                "active": flag(dispatch.active),
                "name": dispatch.description,
            }),
        );
    }
    settings.insert("installed_shipping_modules".into(), Value::Object(shipping_modules));
    settings.insert("multistores".into(), multistores(ctx).await?);

    Ok(json!({ "ok": true, "settings": settings }))
}

async fn store_notification_url(ctx: &RequestContext, raw: &str) -> SyncResult<()> {
    let url = url::Url::parse(raw.trim()).map_err(|e| {
        SyncError::validation(format!("invalid notification url {raw}: {e}"))
    })?;
    ctx.gateway()
        .save_setting(NOTIFICATION_URL_KEY, url.as_str())
        .await?;
    info!(url = %url, "Stored order notification url");
    Ok(())
}

// =============================================================================
// Reference Data
// =============================================================================

fn languages_of(languages: &[Language]) -> Value {
    let map: Map<String, Value> = languages
        .iter()
        .map(|l| {
            (
                l.id.to_string(),
                json!({
                    "language_id": l.id,
                    "locale": l.locale,
                    "language_name": l.name,
                    "_shopware_code": l.locale,
                    "language_code": l.code,
                    "is_default": flag(l.is_default),
                }),
            )
        })
        .collect();
    Value::Object(map)
}

/// One value per language id.
fn per_language(languages: &[Language], value: impl Fn(&Language) -> Value) -> Value {
    Value::Object(
        languages
            .iter()
            .map(|l| (l.id.to_string(), value(l)))
            .collect(),
    )
}

fn cross_selling_groups(languages: &[Language]) -> Value {
    let groups = [(1, 0, "Zubehör-Artikel"), (2, 1, "Ähnliche Artikel")];
    Value::Object(
        groups
            .into_iter()
            .map(|(id, sort, name)| {
                (
                    id.to_string(),
                    json!({
                        "products_xsell_grp_name_id": id,
                        "xsell_sort_order": sort,
                        "groupname": per_language(languages, |_| json!(name)),
                    }),
                )
            })
            .collect(),
    )
}

/// Free attribute columns followed by the filter options (`filterN`).
async fn article_properties(ctx: &RequestContext) -> SyncResult<Value> {
    let mut fields = Map::new();

    for field in ctx.attribute_fields().await? {
        fields.insert(
            field.name.clone(),
            json!({
                "field_id": field.name,
                "field_name": field.label,
                "field_i18n": flag(field.translatable),
                "field_set": "Shopware",
                "field_set_ids": [0],
                "field_help": field.help,
                "field_noempty": flag(field.required),
                "field_type": hub_field_type(&field.field_type),
                "variantable": flag(field.variantable),
            }),
        );
    }

    for option in ctx.gateway().filter_options().await? {
        let id = format!("filter{}", option.id);
        fields.insert(
            id.clone(),
            json!({
                "field_id": id,
                "field_name": option.name,
                "field_i18n": 1,
                "field_set": "Shopware-Filter",
                "field_set_ids": option.group_ids,
                "field_noempty": 0,
                "field_type": "textfield",
            }),
        );
    }

    Ok(Value::Object(fields))
}

/// Storefront field type → hub widget.
fn hub_field_type(field_type: &str) -> &'static str {
    match field_type {
        "price" => "numberfield",
        "textarea" => "textarea",
        "select" => "combobox",
        "boolean" => "boolean",
        "date" => "datefield",
        "time" => "timefield",
        _ => "textfield",
    }
}

/// Shops, default first. Unnamed shops get a generated name.
async fn multistores(ctx: &RequestContext) -> SyncResult<Value> {
    let languages = ctx.languages().await?;
    let mut shops: Vec<_> = ctx.shops().await?.iter().collect();
    shops.sort_by(|a, b| b.default.cmp(&a.default).then(a.id.cmp(&b.id)));

    let mut stores = Map::new();
    for shop in shops {
        let name = if !shop.name.is_empty() {
            shop.name.clone()
        } else if shop.default {
            "Main Store".to_string()
        } else {
            format!("{} - {} ({})", shop.language, shop.locale, shop.id)
        };
        let url_http = shop
            .domain_alias
            .lines()
            .map(str::trim)
            .find(|d| !d.is_empty())
            .map(|d| format!("http://{d}"))
            .unwrap_or_default();
        let locale = shop.locale.split('_').next().unwrap_or_default();

        let mut store = Map::new();
        store.insert("id".into(), json!(shop.id));
        store.insert("name".into(), json!(name));
        store.insert("url_http".into(), json!(url_http));
        store.insert("active".into(), json!(1));
        store.insert("locale".into(), json!(locale));
        if let Some(language) = languages.iter().find(|l| l.code == locale) {
            store.insert("language_id".into(), json!(language.id));
            store.insert("language_name".into(), json!(language.name));
        }
        stores.insert(shop.id.to_string(), Value::Object(store));
    }
    Ok(Value::Object(stores))
}

// =============================================================================
// Diagnostics
// =============================================================================

/// `actindo.ping`.
pub fn ping() -> Value {
    json!({ "ok": true, "pong": "pong" })
}

/// `actindo.get_time`: server and database clocks with the database's
/// offset from GMT.
pub async fn get_time(ctx: &RequestContext) -> SyncResult<Value> {
    let now = Utc::now().naive_utc();
    let now = now.with_nanosecond(0).unwrap_or(now);
    let server = Local::now().naive_local();
    let database = ctx.gateway().database_time().await?;
    let database = database.with_nanosecond(0).unwrap_or(database);

    let diff = (database - now).num_seconds();
    Ok(json!({
        "time_server": timestamp(&server),
        "gmtime_server": timestamp(&now),
        "time_database": timestamp(&database),
        "gmtime_database": timestamp(&now),
        "diff_seconds": diff,
        "diff": format_offset(diff),
    }))
}

fn timestamp(time: &NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// `3600` → `01:00:00`, `-5400` → `-01:30:00`.
fn format_offset(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let abs = seconds.abs();
    format!(
        "{sign}{:02}:{:02}:{:02}",
        abs / 3600,
        (abs % 3600) / 60,
        abs % 60
    )
}

/// `actindo.get_connector_version`.
pub fn connector_version(ctx: &RequestContext) -> Value {
    let revision = PROTOCOL_VERSION
        .split_once('.')
        .map(|(_, rev)| rev)
        .unwrap_or_default();
    let shop = &ctx.config().shop;

    json!({
        "revision": revision,
        "protocol_version": PROTOCOL_VERSION,
        "shop_type": shop.kind,
        "shop_version": shop.version,
        "capabilities": {
            "artikel_vpe": 1,
            "artikel_shippingtime": 0,
            "artikel_shippingtime_days": 1,
            "artikel_properties": 1,
            "artikel_property_sets": 1,
            "artikel_contents": 1,
            "artikel_attributsartikel": 1,
            "wg_sync": 1,
            "artikel_list_filters": 1,
            "multi_livelager": 1,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{context, shop};
    use crate::error::ErrorKind;
    use actindo_store::{
        AttributeField, CustomerGroup, Dispatch, FilterGroup, FilterOption, OrderState,
        PaymentMean, ShopGateway, Snapshot, Unit,
    };

    fn snapshot() -> Snapshot {
        let mut english = shop(2, 2, "en_GB", false);
        english.domain_alias = "\nshop.example.co.uk\nwww.example.co.uk".into();
        english.language = "English".into();
        let mut german = shop(1, 1, "de_DE", true);
        german.language = "Deutsch".into();

        Snapshot {
            shops: vec![german, english],
            customer_groups: vec![CustomerGroup {
                id: 1,
                key: "EK".into(),
                description: "Shopkunden".into(),
                show_gross: true,
                gross_entry: true,
                discount: 2.5,
                minimum_order: 10.0,
            }],
            units: vec![Unit { id: 3, unit: "l".into(), description: "Liter".into() }],
            order_states: vec![OrderState { id: 0, description: "Offen".into() }],
            attribute_fields: vec![AttributeField {
                name: "attr4".into(),
                label: "Material".into(),
                translatable: true,
                help: String::new(),
                required: false,
                field_type: "select".into(),
                variantable: true,
            }],
            filter_options: vec![FilterOption { id: 7, name: "Farbe".into(), group_ids: vec![1, 2] }],
            filter_groups: vec![FilterGroup {
                id: 1,
                name: "Textil".into(),
                comparable: true,
                position: 0,
            }],
            payment_means: vec![PaymentMean {
                id: 5,
                name: "prepayment".into(),
                description: "Vorkasse".into(),
                active: true,
            }],
            dispatches: vec![
                Dispatch { id: 9, name: "UPS".into(), description: String::new(), active: false },
                Dispatch { id: 8, name: "DHL".into(), description: "Paket".into(), active: true },
            ],
            ..Snapshot::default()
        }
    }

    #[tokio::test]
    async fn test_settings_are_keyed_per_language() {
        let (_, ctx) = context(snapshot());
        let settings = get(&ctx, &Value::Null).await.unwrap()["settings"].clone();

        assert_eq!(settings["languages"]["1"]["language_code"], "de");
        assert_eq!(settings["languages"]["1"]["is_default"], 1);
        assert_eq!(
            settings["customers_status"]["1"]["customers_status_name"]["2"],
            "EK - Shopkunden"
        );
        assert_eq!(settings["customers_status"]["1"]["customers_status_show_price_tax"], 1);
        assert_eq!(settings["vpe"]["3"]["1"]["vpe_name"], "l - Liter");
        assert_eq!(settings["orders_status"]["0"]["2"], "Offen");
        assert_eq!(settings["xsell_groups"]["2"]["groupname"]["1"], "Ähnliche Artikel");

        let shipping = settings["shipping"].as_array().unwrap();
        assert_eq!(shipping.len(), 32);
        assert_eq!(shipping[0], json!({"id": 1, "text": "0 Tage"}));
        assert_eq!(shipping[31]["text"], "31 Tage");
    }

    #[tokio::test]
    async fn test_properties_and_modules() {
        let (_, ctx) = context(snapshot());
        let settings = get(&ctx, &json!({})).await.unwrap()["settings"].clone();

        let properties = &settings["artikel_properties"];
        assert_eq!(properties["attr4"]["field_type"], "combobox");
        assert_eq!(properties["attr4"]["variantable"], 1);
        assert_eq!(properties["filter7"]["field_set_ids"], json!([1, 2]));
        assert_eq!(settings["artikel_property_sets"][0]["name"], "Filter: Textil");

        assert_eq!(settings["installed_payment_modules"]["prepayment"]["name"], "Vorkasse");
        let shipping: Vec<&String> = settings["installed_shipping_modules"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(shipping, vec!["DHL", "UPS"]);
    }

    #[tokio::test]
    async fn test_multistores_name_unnamed_shops() {
        let (_, ctx) = context(snapshot());
        let settings = get(&ctx, &Value::Null).await.unwrap()["settings"].clone();
        let stores = &settings["multistores"];

        assert_eq!(stores["1"]["name"], "Main Store");
        assert_eq!(stores["2"]["name"], "English - en_GB (2)");
        assert_eq!(stores["2"]["url_http"], "http://shop.example.co.uk");
        assert_eq!(stores["2"]["language_id"], 2);
        assert_eq!(stores["2"]["locale"], "en");
    }

    #[tokio::test]
    async fn test_notification_url_is_validated_and_stored() {
        let (store, ctx) = context(snapshot());

        let err = get(&ctx, &json!({"notification_url_order": "not a url"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        get(&ctx, &json!({"notification_url_order": "https://hub.example.org/ping"}))
            .await
            .unwrap();
        assert_eq!(
            store.setting(NOTIFICATION_URL_KEY).await.unwrap().as_deref(),
            Some("https://hub.example.org/ping")
        );
    }

    #[test]
    fn test_offset_formatting() {
        assert_eq!(format_offset(0), "00:00:00");
        assert_eq!(format_offset(3600), "01:00:00");
        assert_eq!(format_offset(-5400), "-01:30:00");
        assert_eq!(format_offset(7322), "02:02:02");
    }

    #[tokio::test]
    async fn test_diagnostics() {
        let (_, ctx) = context(Snapshot::default());

        assert_eq!(ping(), json!({"ok": true, "pong": "pong"}));

        let time = get_time(&ctx).await.unwrap();
        assert_eq!(time["time_server"].as_str().unwrap().len(), 19);
        assert!(time["diff_seconds"].is_i64());

        let version = connector_version(&ctx);
        assert_eq!(version["protocol_version"], PROTOCOL_VERSION);
        assert_eq!(version["revision"], "0");
        assert_eq!(version["capabilities"]["artikel_shippingtime"], 0);
        assert_eq!(version["capabilities"]["multi_livelager"], 1);
    }
}
