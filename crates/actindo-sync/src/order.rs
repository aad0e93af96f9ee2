//! # Order Export
//!
//! `orders.list`, `orders.list_positions`, `orders.count`,
//! `orders.set_status`, `orders.set_status_invoice` and
//! `orders.set_trackingcode`.
//!
//! ## Listing
//! ```text
//! orders.list(filters)
//!     │
//!     ├── start 0, limit <orders.page_size>, id DESC
//!     ├── storefront has no orders at all → NotFound
//!     │
//!     └── per order
//!           status < 0           → skipped
//!           customer missing     → skipped (warn)
//!           payment code, bank data, payone id, discount, dates
//! ```

use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use actindo_core::order::{
    bank_details, decode_special_chars, discount_amount, line_type, salutation, shipping_number,
    shipping_tax_rate, PaymentCode, DEFAULT_COUNTRY, MODE_DISCOUNT, PREMIUM_LONG_TEXT,
};
use actindo_core::wire::{entries, flag, loose_bool, loose_i64, loose_string};
use actindo_store::{Address, Order, OrderQuery};

use crate::context::RequestContext;
use crate::error::{SyncError, SyncResult};

/// Premium article line mode.
const MODE_PREMIUM: i64 = 1;

// =============================================================================
// Listing
// =============================================================================

/// Paging parsed from the `orders.list` filters.
fn order_query(ctx: &RequestContext, filters: &Value) -> OrderQuery {
    let offset = filters.get("start").map(loose_i64).unwrap_or(0).max(0) as usize;
    let limit = filters
        .get("limit")
        .map(|v| loose_i64(v).max(0) as usize)
        .unwrap_or(ctx.config().orders.page_size);

    // `order_id` is the only sortable column and maps onto the id anyway
    let descending = !filters
        .get("sortOrder")
        .map(loose_string)
        .is_some_and(|dir| dir.eq_ignore_ascii_case("asc"));

    OrderQuery { offset, limit, descending }
}

/// `orders.list`.
pub async fn list(ctx: &RequestContext, filters: &Value) -> SyncResult<Value> {
    let gateway = ctx.gateway();
    if gateway.order_stats().await?.count == 0 {
        return Err(SyncError::not_found("Could not find any orders"));
    }

    let query = order_query(ctx, filters);
    let payment_means = gateway.payment_means().await?;

    let mut orders = Map::new();
    for order in gateway.orders(query).await? {
        if order.status < 0 {
            continue;
        }
        let customer = match gateway.customer(order.customer_id).await {
            Ok(customer) => customer,
            Err(err) if err.is_not_found() => {
                warn!(order_id = %order.id, customer_id = %order.customer_id, "Skipping order without customer");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let payment_name = payment_means
            .iter()
            .find(|p| p.id == order.payment_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let code = PaymentCode::classify(&payment_name);
        let group_id = ctx
            .customer_group_by_key(&customer.group_key)
            .await?
            .map(|g| g.id)
            .unwrap_or_default();

        let mut buyer = address_fields(ctx, &order.billing).await?;
        buyer.insert("kurzname".into(), json!(short_name(&order.billing)));
        buyer.insert("email".into(), json!(customer.email));
        buyer.insert("preisgruppe".into(), json!(group_id));
        buyer.insert(
            "gebdat".into(),
            json!(customer
                .birthday
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "0000-00-00".to_string())),
        );
        buyer.insert("print_brutto".into(), json!(flag(!order.net)));
        buyer.insert("verf".into(), json!(code.as_str()));
        if let Some(code) = order_language(ctx, &order).await? {
            buyer.insert("langcode".into(), json!(code));
        }
        let bank = bank_details(code, customer.debit.as_ref(), &customer.payment_data);
        if let Value::Object(bank) = serde_json::to_value(bank)? {
            buyer.extend(bank);
        }

        let delivery = address_fields(ctx, &order.shipping).await?;

        let (bill_date, tstamp, date, time) = order_dates(order.ordered_at);
        let mut record = Map::new();
        record.insert("_customers_id".into(), json!(order.customer_id));
        record.insert("_payment_method".into(), json!(payment_name));
        record.insert(
            "beleg_status_text".into(),
            json!(order.customer_comment.replace('\'', "").trim()),
        );
        record.insert("bill_date".into(), json!(bill_date));
        record.insert("val_date".into(), json!(bill_date));
        record.insert("tstamp".into(), json!(tstamp));
        record.insert("webshop_order_date".into(), json!(date));
        record.insert("webshop_order_time".into(), json!(time));
        record.insert("currency".into(), json!(order.currency));
        record.insert("currency_value".into(), json!(order.currency_factor));
        record.insert("external_order_id".into(), json!(order.number));
        record.insert("project_id".into(), json!(order.number));
        record.insert("language".into(), json!(order.language));
        record.insert("langcode".into(), json!(order.language));
        record.insert("netto".into(), json!(order.invoice_amount_net));
        record.insert("netto2".into(), json!(order.invoice_amount_net));
        record.insert("saldo".into(), json!(order.invoice_amount));
        record.insert("order_id".into(), json!(order.id));
        record.insert("orders_status".into(), json!(order.status));
        record.insert("subshop_id".into(), json!(order.shop_id));
        record.insert("rabatt_type".into(), json!("betrag"));
        record.insert(
            "rabatt_betrag".into(),
            json!(discount_amount(
                order
                    .lines
                    .iter()
                    .filter(|l| l.mode == MODE_DISCOUNT)
                    .map(|l| (l.price, l.tax_rate))
            )),
        );

        match gateway.payone_transaction(order.id).await {
            Ok(Some(transaction)) => {
                record.insert("payment_type".into(), json!("payone"));
                record.insert("payment_order_id".into(), json!(transaction));
            }
            Ok(None) => {}
            Err(err) => error!(order_id = %order.id, error = %err, "Payone lookup failed"),
        }

        record.insert("customer".into(), Value::Object(buyer));
        record.insert("delivery".into(), Value::Object(delivery));
        orders.insert(order.id.to_string(), Value::Object(record));
    }

    debug!(count = orders.len(), offset = query.offset, "Exported orders");
    Ok(json!({ "ok": true, "orders": orders }))
}

/// Name and address block shared by `customer` and `delivery`.
async fn address_fields(ctx: &RequestContext, address: &Address) -> SyncResult<Map<String, Value>> {
    let country = ctx
        .country_iso(address.country_id)
        .await?
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string());

    let street = format!("{} {}", address.street, address.street_number.replace(' ', ""));
    let mut fields = Map::new();
    fields.insert("anrede".into(), json!(salutation(&address.salutation)));
    fields.insert("firma".into(), json!(address.company));
    fields.insert("name".into(), json!(address.last_name));
    fields.insert("vorname".into(), json!(address.first_name));
    fields.insert("adresse".into(), json!(street.trim_end()));
    fields.insert("adresse2".into(), json!(address.department));
    fields.insert("plz".into(), json!(address.zip));
    fields.insert("ort".into(), json!(address.city));
    fields.insert("land".into(), json!(country));
    fields.insert("tel".into(), json!(address.phone));
    fields.insert("fax".into(), json!(address.fax));
    fields.insert("ustid".into(), json!(address.vat_id));
    Ok(fields)
}

fn short_name(address: &Address) -> String {
    if address.company.is_empty() {
        format!("{}, {}", address.last_name, address.first_name)
    } else {
        address.company.clone()
    }
}

/// Two letter code of the language shop the order was placed in.
async fn order_language(ctx: &RequestContext, order: &Order) -> SyncResult<Option<String>> {
    let shop_id = order.language.trim().parse::<i64>().unwrap_or(order.shop_id);
    let code = ctx
        .shops()
        .await?
        .iter()
        .find(|s| s.id == shop_id)
        .map(|s| actindo_core::order::language_code(&s.locale));
    Ok(code.filter(|c| c.len() == 2))
}

/// `(bill_date, tstamp, date, time)` with the hub's zero fallbacks.
fn order_dates(ordered_at: Option<NaiveDateTime>) -> (String, i64, String, String) {
    match ordered_at {
        Some(at) => (
            at.format("%Y-%m-%d %H:%M:%S").to_string(),
            at.and_utc().timestamp(),
            at.format("%Y-%m-%d").to_string(),
            at.format("%H:%M:%S").to_string(),
        ),
        None => (
            "0000-00-00 00:00:00".to_string(),
            0,
            "0000-00-00".to_string(),
            "00:00:00".to_string(),
        ),
    }
}

// =============================================================================
// Positions
// =============================================================================

/// `orders.list_positions`: article lines plus a synthetic shipping line.
///
/// Discount lines are left out (they are reported as `rabatt_betrag`) but
/// still count towards the shipping line's tax rate.
pub async fn positions(ctx: &RequestContext, order_id: i64) -> SyncResult<Value> {
    let gateway = ctx.gateway();
    let order = gateway.order(order_id).await?;
    let is_brutto = flag(!order.net);

    let mut positions: Vec<Value> = order
        .lines
        .iter()
        .filter(|line| line.mode != MODE_DISCOUNT)
        .map(|line| {
            json!({
                "art_nr": line.article_number,
                "art_nr_base": line.article_number,
                "art_name": decode_special_chars(&line.article_name),
                "preis": line.price,
                "is_brutto": is_brutto,
                "type": line_type(line.mode),
                "mwst": line.tax_rate.to_string(),
                "menge": line.quantity,
                "attributes": [],
                "langtext": if line.mode == MODE_PREMIUM { PREMIUM_LONG_TEXT } else { "" },
            })
        })
        .collect();

    let dispatch = gateway
        .dispatches()
        .await?
        .into_iter()
        .find(|d| d.id == order.dispatch_id);
    let number = shipping_number(order.dispatch_id);
    positions.push(json!({
        "art_nr": number,
        "art_nr_base": number,
        "art_name": dispatch.as_ref().map(|d| d.name.as_str()).unwrap_or_default(),
        "preis": if order.net { order.invoice_shipping_net } else { order.invoice_shipping },
        "is_brutto": is_brutto,
        "type": line_type(-1),
        "mwst": shipping_tax_rate(order.lines.iter().map(|l| l.tax_rate)),
        "menge": 1,
        "langtext": dispatch.as_ref().map(|d| d.description.as_str()).unwrap_or_default(),
    }));

    Ok(Value::Array(positions))
}

// =============================================================================
// Status & Tracking
// =============================================================================

/// `orders.set_status`.
///
/// The status change stands even when the customer mail cannot be sent;
/// that failure is reported as `{ok: false, error}`.
pub async fn set_status(
    ctx: &RequestContext,
    order_id: i64,
    status: i64,
    comment: &str,
    notify: bool,
) -> SyncResult<Value> {
    let gateway = ctx.gateway();
    if !gateway.order_states().await?.iter().any(|s| s.id == status) {
        return Err(SyncError::validation(format!(
            "could not find order status with id {status}"
        )));
    }

    gateway.set_order_status(order_id, status, comment).await?;
    gateway.flush().await?;
    info!(order_id = %order_id, status = %status, notify, "Updated order status");

    if notify {
        if let Err(err) = gateway.notify_status(order_id, status).await {
            error!(order_id = %order_id, error = %err, "Status mail failed");
            return Ok(json!({
                "ok": false,
                "error": format!("error sending status email to customer: {err}"),
            }));
        }
    }
    Ok(json!({ "ok": true }))
}

/// `orders.set_status_invoice`: the `set_status` parameters as one list.
pub async fn set_status_invoice(ctx: &RequestContext, params: &Value) -> SyncResult<Value> {
    let params = entries(params);
    let param = |n: usize| params.get(n).copied().unwrap_or(&Value::Null);
    set_status(
        ctx,
        loose_i64(param(0)),
        loose_i64(param(1)),
        &loose_string(param(2)),
        loose_bool(param(3)),
    )
    .await
}

/// `orders.set_trackingcode`.
pub async fn set_tracking_code(ctx: &RequestContext, order_id: i64, code: &str) -> SyncResult<Value> {
    ctx.gateway().set_tracking_code(order_id, code).await?;
    ctx.gateway().flush().await?;
    debug!(order_id = %order_id, "Stored tracking code");
    Ok(json!({ "ok": true }))
}

/// `orders.count`.
pub async fn count(ctx: &RequestContext) -> SyncResult<Value> {
    let stats = ctx.gateway().order_stats().await?;
    Ok(json!({
        "ok": true,
        "counts": { "count": stats.count, "max_order_id": stats.max_order_id },
    }))
}
