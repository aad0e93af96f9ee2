//! # Price Lists
//!
//! Translation between the hub's flat price groups and the storefront's
//! tiered price lists.
//!
//! ## Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Hub (per customer group id)          Storefront (per group key)        │
//! │  ────────────────────────────         ─────────────────────────────     │
//! │  is_brutto      = 1                   from 1   to 9    price 119.00     │
//! │  grundpreis     = 119.00     ◄──────► from 10  to 49   price 110.00     │
//! │  preis_range1   = 10                  from 50  to -    price 100.00     │
//! │  preis_gruppe1  = 110.00                                                │
//! │  preis_range2   = 50                  pseudo price, base price (ek)     │
//! │  preis_gruppe2  = 100.00              copied onto every tier            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Entry Mode
//! Each customer group enters prices either gross or net. Incoming prices
//! are converted into the group's mode; outgoing prices are reported in the
//! group's mode together with the matching `is_brutto` flag.
//!
//! | group mode | hub sends gross         | hub sends net         |
//! |------------|-------------------------|-----------------------|
//! | net        | round(p / (1 + r), 2)   | p                     |
//! | gross      | p                       | p × (1 + r)           |
//!
//! All arithmetic uses `rust_decimal`; conversion from and to the hub's
//! floats happens only at the edges ([`to_decimal`], [`to_f64`]).

use rust_decimal::prelude::*;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::wire::{loose_bool, loose_f64, loose_i64};

/// Decimal places used for every price the connector reports.
pub const DECIMAL_PLACES: u32 = 2;

/// Key of the storefront's default (shop customer) group.
pub const DEFAULT_GROUP_KEY: &str = "EK";

// =============================================================================
// Decimal Edges
// =============================================================================

/// Converts a hub float into a decimal for calculation.
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Converts a decimal back into a hub float, rounded to 2 places.
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    round2(value).to_f64().unwrap_or_default()
}

/// Rounds half away from zero to 2 places.
#[inline]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

fn tax_factor(rate: Decimal) -> Decimal {
    Decimal::ONE + rate / Decimal::ONE_HUNDRED
}

/// Price for a group that stores net prices.
pub fn net_price(price: Decimal, tax_rate: Decimal, is_gross: bool) -> Decimal {
    if is_gross {
        round2(price / tax_factor(tax_rate))
    } else {
        price
    }
}

/// Price for a group that stores gross prices.
pub fn gross_price(price: Decimal, tax_rate: Decimal, is_gross: bool) -> Decimal {
    if is_gross {
        price
    } else {
        price * tax_factor(tax_rate)
    }
}

// =============================================================================
// Hub Price Group
// =============================================================================

/// One customer group's prices as the hub encodes them.
///
/// Tier keys are numbered (`preis_gruppeN` / `preis_rangeN`); the numbering
/// carries no meaning beyond pairing a price with its quantity threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubPriceGroup {
    pub is_brutto: bool,
    pub grundpreis: f64,
    /// `(from quantity, price)` pairs in hub order.
    pub tiers: Vec<(i64, f64)>,
}

impl HubPriceGroup {
    fn from_fields(fields: &serde_json::Map<String, Value>) -> Self {
        let mut tiers = Vec::new();
        for (key, value) in fields {
            let Some(index) = key.strip_prefix("preis_gruppe") else {
                continue;
            };
            let range = fields
                .get(&format!("preis_range{index}"))
                .map(loose_i64)
                .unwrap_or_default();
            tiers.push((range, loose_f64(value)));
        }

        HubPriceGroup {
            is_brutto: fields.get("is_brutto").map(loose_bool).unwrap_or(false),
            grundpreis: fields.get("grundpreis").map(loose_f64).unwrap_or_default(),
            tiers,
        }
    }
}

impl<'de> Deserialize<'de> for HubPriceGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(fields) => Ok(HubPriceGroup::from_fields(&fields)),
            _ => Ok(HubPriceGroup::default()),
        }
    }
}

impl Serialize for HubPriceGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.tiers.len() * 2))?;
        map.serialize_entry("is_brutto", &i64::from(self.is_brutto))?;
        map.serialize_entry("grundpreis", &self.grundpreis)?;
        for (n, (from, price)) in self.tiers.iter().enumerate() {
            map.serialize_entry(&format!("preis_gruppe{}", n + 1), price)?;
            map.serialize_entry(&format!("preis_range{}", n + 1), from)?;
        }
        map.end()
    }
}

// =============================================================================
// Storefront Tier
// =============================================================================

/// Entry mode of a customer group, as far as pricing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPricing {
    pub id: i64,
    pub key: String,
    /// Prices are entered (and reported) gross.
    pub gross_entry: bool,
}

/// A storefront price tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    pub customer_group: String,
    pub from: u32,
    pub to: Option<u32>,
    pub price: Decimal,
    #[serde(default)]
    pub pseudo_price: Decimal,
    #[serde(default)]
    pub base_price: Decimal,
}

/// Inputs for [`to_internal`] besides the hub groups themselves.
#[derive(Debug, Clone)]
pub struct PriceContext<'a> {
    pub tax_rate: Decimal,
    /// Pseudo ("was") prices per hub group id. Zero counts as not sent.
    pub pseudo_prices: &'a BTreeMap<i64, f64>,
    /// Purchase price, copied onto every tier.
    pub base_price: f64,
    /// Tiers stored before this import, used to carry pseudo prices forward.
    pub previous: &'a [PriceTier],
}

/// Builds storefront tiers from hub price groups.
///
/// Groups the storefront does not know are skipped. Hub tiers are kept only
/// when both quantity and price are positive; the `from = 1` tier always
/// comes from `grundpreis`.
pub fn to_internal(
    hub: &BTreeMap<i64, HubPriceGroup>,
    groups: &[GroupPricing],
    ctx: &PriceContext<'_>,
) -> Vec<PriceTier> {
    let mut tiers = Vec::new();

    for (group_id, info) in hub {
        let Some(group) = groups.iter().find(|g| g.id == *group_id) else {
            continue;
        };
        let convert = |price: f64| {
            let price = to_decimal(price);
            if group.gross_entry {
                gross_price(price, ctx.tax_rate, info.is_brutto)
            } else {
                net_price(price, ctx.tax_rate, info.is_brutto)
            }
        };

        let mut ranges: BTreeMap<u32, Decimal> = BTreeMap::new();
        for (from, price) in &info.tiers {
            let Ok(from) = u32::try_from(*from) else {
                continue;
            };
            if from > 0 && *price > 0.0 {
                ranges.insert(from, convert(*price));
            }
        }
        ranges.insert(1, convert(info.grundpreis));

        let pseudo = ctx
            .pseudo_prices
            .get(group_id)
            .map(|p| to_decimal(*p))
            .filter(|p| *p > Decimal::ZERO)
            .or_else(|| carried_pseudo_price(ctx.previous, &group.key))
            .unwrap_or_default();
        let base = to_decimal(ctx.base_price);

        let froms: Vec<u32> = ranges.keys().copied().collect();
        for (i, (from, price)) in ranges.into_iter().enumerate() {
            tiers.push(PriceTier {
                customer_group: group.key.clone(),
                from,
                to: froms.get(i + 1).map(|next| next - 1),
                price,
                pseudo_price: pseudo,
                base_price: base,
            });
        }
    }

    tiers
}

fn carried_pseudo_price(previous: &[PriceTier], group_key: &str) -> Option<Decimal> {
    previous
        .iter()
        .filter(|t| t.customer_group == group_key)
        .map(|t| t.pseudo_price)
        .find(|p| *p > Decimal::ZERO)
}

// =============================================================================
// Export
// =============================================================================

/// Prices in the hub's shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalPrices {
    /// Entry mode of the default group.
    pub is_brutto: bool,
    /// Default group's `from = 1` price.
    pub grundpreis: f64,
    /// Highest purchase price over all tiers.
    pub ek: f64,
    pub groups: BTreeMap<i64, HubPriceGroup>,
    pub pseudo_prices: BTreeMap<i64, f64>,
}

/// Reports storefront tiers in the hub's shape, rounded to 2 places.
pub fn to_external(tiers: &[PriceTier], groups: &[GroupPricing]) -> ExternalPrices {
    let mut out = ExternalPrices::default();
    let mut ek = Decimal::ZERO;

    let mut sorted: Vec<&PriceTier> = tiers.iter().collect();
    sorted.sort_by_key(|t| t.from);

    for tier in sorted {
        ek = ek.max(tier.base_price);
        let Some(group) = groups.iter().find(|g| g.key == tier.customer_group) else {
            continue;
        };
        let price = to_f64(tier.price);
        let entry = out.groups.entry(group.id).or_default();
        entry.is_brutto = group.gross_entry;

        if tier.from == 1 {
            entry.grundpreis = price;
            out.pseudo_prices.insert(group.id, to_f64(tier.pseudo_price));
            if group.key == DEFAULT_GROUP_KEY {
                out.is_brutto = group.gross_entry;
                out.grundpreis = price;
            }
        } else {
            entry.tiers.push((i64::from(tier.from), price));
        }
    }

    out.ek = to_f64(ek);
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn groups() -> Vec<GroupPricing> {
        vec![
            GroupPricing { id: 1, key: "EK".into(), gross_entry: true },
            GroupPricing { id: 2, key: "H".into(), gross_entry: false },
        ]
    }

    fn ctx<'a>(pseudo: &'a BTreeMap<i64, f64>, previous: &'a [PriceTier]) -> PriceContext<'a> {
        PriceContext {
            tax_rate: Decimal::from(19),
            pseudo_prices: pseudo,
            base_price: 50.0,
            previous,
        }
    }

    #[test]
    fn test_hub_group_parses_numbered_tiers() {
        let group: HubPriceGroup = serde_json::from_value(json!({
            "is_brutto": "1",
            "grundpreis": "119.00",
            "preis_gruppe1": 110.0,
            "preis_range1": "10",
            "preis_gruppe2": "100",
            "preis_range2": 50
        }))
        .unwrap();

        assert!(group.is_brutto);
        assert_eq!(group.grundpreis, 119.0);
        assert_eq!(group.tiers, vec![(10, 110.0), (50, 100.0)]);
    }

    #[test]
    fn test_tiers_are_contiguous_and_sorted() {
        let hub = BTreeMap::from([(
            1,
            HubPriceGroup {
                is_brutto: true,
                grundpreis: 119.0,
                tiers: vec![(50, 100.0), (10, 110.0), (0, 90.0), (20, 0.0)],
            },
        )]);
        let pseudo = BTreeMap::new();
        let tiers = to_internal(&hub, &groups(), &ctx(&pseudo, &[]));

        let shape: Vec<(u32, Option<u32>)> = tiers.iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(shape, vec![(1, Some(9)), (10, Some(49)), (50, None)]);
        assert!(tiers.iter().all(|t| t.base_price == Decimal::from(50)));
    }

    #[test]
    fn test_gross_input_for_net_group_is_converted_and_rounded() {
        let hub = BTreeMap::from([(
            2,
            HubPriceGroup { is_brutto: true, grundpreis: 10.0, tiers: vec![] },
        )]);
        let pseudo = BTreeMap::new();
        let tiers = to_internal(&hub, &groups(), &ctx(&pseudo, &[]));
        assert_eq!(tiers[0].price, Decimal::new(840, 2));
        assert_eq!(tiers[0].customer_group, "H");
    }

    #[test]
    fn test_net_input_for_gross_group_adds_tax() {
        let hub = BTreeMap::from([(
            1,
            HubPriceGroup { is_brutto: false, grundpreis: 100.0, tiers: vec![] },
        )]);
        let pseudo = BTreeMap::new();
        let tiers = to_internal(&hub, &groups(), &ctx(&pseudo, &[]));
        assert_eq!(round2(tiers[0].price), Decimal::from(119));
    }

    #[test]
    fn test_unknown_groups_are_skipped() {
        let hub = BTreeMap::from([(
            99,
            HubPriceGroup { is_brutto: true, grundpreis: 10.0, tiers: vec![] },
        )]);
        let pseudo = BTreeMap::new();
        assert!(to_internal(&hub, &groups(), &ctx(&pseudo, &[])).is_empty());
    }

    #[test]
    fn test_pseudo_price_carries_forward_per_group() {
        let previous = vec![PriceTier {
            customer_group: "EK".into(),
            from: 1,
            to: None,
            price: Decimal::from(100),
            pseudo_price: Decimal::from(150),
            base_price: Decimal::ZERO,
        }];
        let hub = BTreeMap::from([
            (1, HubPriceGroup { is_brutto: true, grundpreis: 119.0, tiers: vec![] }),
            (2, HubPriceGroup { is_brutto: false, grundpreis: 80.0, tiers: vec![] }),
        ]);
        let pseudo = BTreeMap::new();
        let tiers = to_internal(&hub, &groups(), &ctx(&pseudo, &previous));

        assert_eq!(tiers[0].pseudo_price, Decimal::from(150));
        assert_eq!(tiers[1].pseudo_price, Decimal::ZERO);
    }

    #[test]
    fn test_zero_pseudo_price_keeps_stored_promotion() {
        let previous = vec![PriceTier {
            customer_group: "EK".into(),
            from: 1,
            to: None,
            price: Decimal::from(100),
            pseudo_price: Decimal::from(150),
            base_price: Decimal::ZERO,
        }];
        let hub = BTreeMap::from([(
            1,
            HubPriceGroup { is_brutto: true, grundpreis: 119.0, tiers: vec![] },
        )]);
        let pseudo = BTreeMap::from([(1, 0.0)]);
        let tiers = to_internal(&hub, &groups(), &ctx(&pseudo, &previous));

        assert_eq!(tiers[0].pseudo_price, Decimal::from(150));
    }

    #[test]
    fn test_oversized_range_is_skipped() {
        let hub = BTreeMap::from([(
            1,
            HubPriceGroup {
                is_brutto: true,
                grundpreis: 119.0,
                tiers: vec![(i64::from(u32::MAX) + 1, 90.0), (10, 110.0)],
            },
        )]);
        let pseudo = BTreeMap::new();
        let tiers = to_internal(&hub, &groups(), &ctx(&pseudo, &[]));

        let froms: Vec<u32> = tiers.iter().map(|t| t.from).collect();
        assert_eq!(froms, vec![1, 10]);
        assert_eq!(tiers[1].to, None);
    }

    #[test]
    fn test_round_trip_when_flag_matches_group_mode() {
        let hub = BTreeMap::from([
            (
                1,
                HubPriceGroup {
                    is_brutto: true,
                    grundpreis: 119.0,
                    tiers: vec![(10, 110.5), (50, 99.99)],
                },
            ),
            (
                2,
                HubPriceGroup { is_brutto: false, grundpreis: 80.0, tiers: vec![(5, 75.0)] },
            ),
        ]);
        let pseudo = BTreeMap::from([(1, 149.0), (2, 0.0)]);
        let tiers = to_internal(&hub, &groups(), &ctx(&pseudo, &[]));
        let back = to_external(&tiers, &groups());

        assert_eq!(back.groups, hub);
        assert_eq!(back.pseudo_prices, pseudo);
        assert!(back.is_brutto);
        assert_eq!(back.grundpreis, 119.0);
        assert_eq!(back.ek, 50.0);
    }

    #[test]
    fn test_export_serializes_numbered_keys() {
        let group = HubPriceGroup { is_brutto: true, grundpreis: 10.0, tiers: vec![(5, 9.0)] };
        let out = serde_json::to_value(&group).unwrap();
        assert_eq!(
            out,
            json!({"is_brutto": 1, "grundpreis": 10.0, "preis_gruppe1": 9.0, "preis_range1": 5})
        );
    }
}
