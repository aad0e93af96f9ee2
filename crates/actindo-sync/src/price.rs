//! # Price Translation
//!
//! Binds the pure price rules in `actindo_core::price` to the storefront's
//! customer groups and tax rates.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use actindo_core::price::{to_external, to_internal, ExternalPrices, HubPriceGroup, PriceContext};
use actindo_core::PriceTier;

use crate::context::RequestContext;
use crate::error::SyncResult;

/// Storefront tiers for the hub's price groups.
pub async fn import_prices(
    ctx: &RequestContext,
    hub: &BTreeMap<i64, HubPriceGroup>,
    tax_id: i64,
    pseudo_prices: &BTreeMap<i64, f64>,
    base_price: f64,
    previous: &[PriceTier],
) -> SyncResult<Vec<PriceTier>> {
    let groups = ctx.group_pricing().await?;
    let price_ctx = PriceContext {
        tax_rate: ctx.tax_rate(tax_id).await?,
        pseudo_prices,
        base_price,
        previous,
    };
    Ok(to_internal(hub, &groups, &price_ctx))
}

/// Hub view of a detail's tiers.
pub async fn export_prices(ctx: &RequestContext, tiers: &[PriceTier]) -> SyncResult<ExternalPrices> {
    let groups = ctx.group_pricing().await?;
    Ok(to_external(tiers, &groups))
}

/// Writes `is_brutto`, `grundpreis`, `preisgruppen` and
/// `products_pseudoprices` into a hub record.
pub fn write_prices(record: &mut Map<String, Value>, prices: &ExternalPrices) {
    record.insert("is_brutto".into(), json!(i64::from(prices.is_brutto)));
    record.insert("grundpreis".into(), json!(prices.grundpreis));
    record.insert("preisgruppen".into(), json!(prices.groups));
    record.insert("products_pseudoprices".into(), json!(prices.pseudo_prices));
}
