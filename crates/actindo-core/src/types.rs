//! # Hub Record Shapes
//!
//! Typed views of the payloads the hub pushes into the connector. Every
//! field tolerates the hub's loose typing (see [`crate::wire`]); a missing
//! field takes its default.
//!
//! ## Product Payload
//! ```text
//! HubProduct
//! ├── art_nr, art_name, swg, l_bestand, ean, size_*, weight, ek, einheit
//! ├── preisgruppen { group id → HubPriceGroup }
//! └── shop: HubShopData
//!     ├── art: HubShopArticle          (flags, dates, packaging unit)
//!     ├── all_categories, content, xselling, group_permission
//!     ├── images, properties, desc
//!     └── attributes: HubAttributes
//!         ├── Absent                   (key not sent)
//!         ├── Plain                    (sent, but not a matrix)
//!         └── Matrix(HubVariantMatrix) (names, values, combination_advanced)
//! ```

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::price::HubPriceGroup;
use crate::wire::{loose, OrderedMap};

/// Marker the hub uses for "no date".
pub const ZERO_DATE: &str = "0000-00-00";

// =============================================================================
// Product
// =============================================================================

/// A product pushed by `product.create_update`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubProduct {
    #[serde(default, deserialize_with = "loose::string")]
    pub art_nr: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub art_name: String,
    /// Primary category id.
    #[serde(default, deserialize_with = "loose::int")]
    pub swg: i64,
    #[serde(default, deserialize_with = "loose::int")]
    pub l_bestand: i64,
    #[serde(default, deserialize_with = "loose::string")]
    pub ean: String,
    #[serde(default, deserialize_with = "loose::float")]
    pub size_h: f64,
    #[serde(default, deserialize_with = "loose::float")]
    pub size_l: f64,
    #[serde(default, deserialize_with = "loose::float")]
    pub size_b: f64,
    #[serde(default, deserialize_with = "loose::float")]
    pub weight: f64,
    /// Tax key; `"2"` is the reduced rate.
    #[serde(default, deserialize_with = "loose::string")]
    pub mwst_stkey: String,
    /// Purchase price.
    #[serde(default, deserialize_with = "loose::float")]
    pub ek: f64,
    /// Packaging unit label.
    #[serde(default, deserialize_with = "loose::string")]
    pub einheit: String,
    #[serde(default, deserialize_with = "loose::collection")]
    pub preisgruppen: BTreeMap<i64, HubPriceGroup>,
    #[serde(default)]
    pub shop: HubShopData,
}

impl HubProduct {
    /// Number used for a freshly created article: the first combination's
    /// number for variant families, `art_nr` otherwise.
    pub fn creation_number(&self) -> &str {
        match &self.shop.attributes {
            HubAttributes::Matrix(matrix) => matrix
                .combination_advanced
                .keys()
                .next()
                .unwrap_or(self.art_nr.as_str()),
            _ => &self.art_nr,
        }
    }

    /// `swg` plus `all_categories`, positive, deduplicated, in hub order.
    pub fn category_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for id in std::iter::once(self.swg).chain(self.shop.all_categories.iter().copied()) {
            if id > 0 && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// The `shop` block of a product.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubShopData {
    #[serde(default)]
    pub art: HubShopArticle,
    #[serde(default, deserialize_with = "loose::int_list")]
    pub all_categories: Vec<i64>,
    #[serde(default, deserialize_with = "loose::collection")]
    pub content: Vec<HubContent>,
    #[serde(default, deserialize_with = "loose::collection")]
    pub xselling: Vec<HubCrossSelling>,
    /// Whitelist of customer group ids; `None` means "not sent".
    #[serde(default, deserialize_with = "loose::opt_int_list")]
    pub group_permission: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "loose::collection")]
    pub images: Vec<HubImage>,
    #[serde(default, deserialize_with = "loose::collection")]
    pub properties: Vec<HubProperty>,
    #[serde(default, deserialize_with = "loose::collection")]
    pub desc: Vec<HubTranslation>,
    #[serde(default)]
    pub attributes: HubAttributes,
}

/// Article-level settings inside `shop.art`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubShopArticle {
    #[serde(default, deserialize_with = "loose::flag")]
    pub products_status: bool,
    #[serde(default, deserialize_with = "loose::string")]
    pub products_date_available: String,
    #[serde(default, deserialize_with = "loose::flag")]
    pub bundle: bool,
    #[serde(default, deserialize_with = "loose::flag")]
    pub products_digital: bool,
    #[serde(default, deserialize_with = "loose::int")]
    pub filtergroup_id: i64,
    #[serde(default, deserialize_with = "loose::flag")]
    pub topseller: bool,
    #[serde(default, deserialize_with = "loose::flag")]
    pub abverkauf: bool,
    #[serde(default, deserialize_with = "loose::int")]
    pub pseudosales: i64,
    #[serde(default, deserialize_with = "loose::int")]
    pub manufacturers_id: i64,
    #[serde(default, deserialize_with = "loose::flag")]
    pub email_notification: bool,
    #[serde(default, deserialize_with = "loose::int")]
    pub products_sort: i64,
    #[serde(default, deserialize_with = "loose::flag")]
    pub shipping_free: bool,
    #[serde(default, deserialize_with = "loose::int")]
    pub shipping_status: i64,
    #[serde(default, deserialize_with = "loose::string")]
    pub suppliernumber: String,
    #[serde(default, deserialize_with = "loose::float")]
    pub products_weight: f64,
    #[serde(default, deserialize_with = "pseudo_prices")]
    pub products_pseudoprices: BTreeMap<i64, f64>,
    #[serde(default, deserialize_with = "loose::flag")]
    pub products_vpe_status: bool,
    #[serde(default, deserialize_with = "loose::maybe_float")]
    pub products_vpe_staffelung: Option<f64>,
    #[serde(default, deserialize_with = "loose::float")]
    pub products_vpe_value: f64,
    #[serde(default, deserialize_with = "loose::maybe_float")]
    pub products_vpe_referenzeinheit: Option<f64>,
    #[serde(default, deserialize_with = "loose::int")]
    pub products_vpe: i64,
    #[serde(default, deserialize_with = "loose::string")]
    pub products_ean: String,
}

impl HubShopArticle {
    /// Release date, `None` for the hub's empty and zero dates.
    pub fn available_from(&self) -> Option<&str> {
        let raw = self.products_date_available.trim();
        (!raw.is_empty() && !raw.starts_with(ZERO_DATE)).then_some(raw)
    }
}

/// Storefront shipping time (days) from the hub's shipping status.
pub fn shipping_time(shipping_status: i64) -> i64 {
    (shipping_status - 1).max(0)
}

fn pseudo_prices<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<i64, f64>, D::Error> {
    let value = Value::deserialize(d)?;
    let Value::Object(map) = value else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .iter()
        .filter_map(|(k, v)| k.parse::<i64>().ok().map(|id| (id, crate::wire::loose_f64(v))))
        .collect())
}

// =============================================================================
// Product Sub-Records
// =============================================================================

/// Attached content; only `link` entries are stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubContent {
    #[serde(default, rename = "type", deserialize_with = "loose::string")]
    pub kind: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub content: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub content_name: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub content_link_target: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub language_code: String,
}

/// Cross-selling reference. Group 1 is "related", group 2 is "similar".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubCrossSelling {
    #[serde(default, deserialize_with = "loose::string")]
    pub art_nr: String,
    #[serde(default, deserialize_with = "loose::int")]
    pub group: i64,
}

/// Image payload with per-language titles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubImage {
    #[serde(default, deserialize_with = "loose::string")]
    pub image_name: String,
    /// Opaque image payload; stored as received.
    #[serde(default, deserialize_with = "loose::string")]
    pub image: String,
    #[serde(default, deserialize_with = "loose::collection")]
    pub image_title: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "loose::float")]
    pub image_size: f64,
    #[serde(default, deserialize_with = "loose::string")]
    pub image_type: String,
}

/// A property value: an attribute field (`attrN`) or a filter (`filterN`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubProperty {
    #[serde(default, deserialize_with = "loose::string")]
    pub field_id: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub field_value: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub language_code: String,
    #[serde(default, deserialize_with = "loose::int")]
    pub language_id: i64,
}

/// Texts for one language.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubTranslation {
    #[serde(default, deserialize_with = "loose::int")]
    pub language_id: i64,
    #[serde(default, deserialize_with = "loose::string")]
    pub language_code: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub products_name: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub products_keywords: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub products_short_description: String,
    #[serde(default, deserialize_with = "loose::string")]
    pub products_description: String,
}

// =============================================================================
// Variant Matrix
// =============================================================================

/// What the hub sent in `shop.attributes`.
#[derive(Debug, Clone, Default)]
pub enum HubAttributes {
    /// The key was not sent: variants are left untouched.
    #[default]
    Absent,
    /// Sent, but not a matrix: the product is a plain article.
    Plain,
    /// A variant family.
    Matrix(HubVariantMatrix),
}

impl HubAttributes {
    pub fn matrix(&self) -> Option<&HubVariantMatrix> {
        match self {
            HubAttributes::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for HubAttributes {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;
        let is_matrix =
            matches!(&value, Value::Object(map) if map.contains_key("combination_advanced"));
        if value.is_null() {
            Ok(HubAttributes::Absent)
        } else if is_matrix {
            serde_json::from_value(value)
                .map(HubAttributes::Matrix)
                .map_err(serde::de::Error::custom)
        } else {
            Ok(HubAttributes::Plain)
        }
    }
}

/// Variant groups, values and combinations, keyed by hub ids.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubVariantMatrix {
    /// group id → language code → group name
    #[serde(default, deserialize_with = "loose::collection")]
    pub names: BTreeMap<i64, BTreeMap<String, String>>,
    /// group id → value id → language code → value name
    #[serde(default, deserialize_with = "loose::collection")]
    pub values: BTreeMap<i64, BTreeMap<i64, BTreeMap<String, String>>>,
    /// variant number → combination, in hub order
    #[serde(default)]
    pub combination_advanced: OrderedMap<HubCombination>,
}

impl HubVariantMatrix {
    /// Group names in the given language.
    pub fn group_names(&self, language: &str) -> BTreeMap<i64, String> {
        self.names
            .iter()
            .map(|(id, names)| (*id, names.get(language).cloned().unwrap_or_default()))
            .collect()
    }

    /// Value names in the given language, with their hub group id.
    pub fn value_names(&self, language: &str) -> BTreeMap<i64, (i64, String)> {
        self.values
            .iter()
            .flat_map(|(group, values)| {
                values.iter().map(move |(id, names)| {
                    (*id, (*group, names.get(language).cloned().unwrap_or_default()))
                })
            })
            .collect()
    }
}

/// One entry of `combination_advanced`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubCombination {
    #[serde(default, deserialize_with = "loose::int_list")]
    pub attribute_name_id: Vec<i64>,
    #[serde(default, deserialize_with = "loose::int_list")]
    pub attribute_value_id: Vec<i64>,
    #[serde(default, deserialize_with = "loose::int")]
    pub l_bestand: i64,
    #[serde(default, deserialize_with = "loose::collection")]
    pub preisgruppen: BTreeMap<i64, HubPriceGroup>,
    #[serde(default)]
    pub data: HubCombinationData,
    #[serde(default)]
    pub shop: HubCombinationShop,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubCombinationData {
    #[serde(default, deserialize_with = "loose::flag")]
    pub products_status: bool,
    #[serde(default, deserialize_with = "loose::int")]
    pub shipping_status: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubCombinationShop {
    #[serde(default)]
    pub art: HubShopArticle,
    #[serde(default, deserialize_with = "loose::collection")]
    pub properties: Vec<HubProperty>,
    #[serde(default, deserialize_with = "loose::collection")]
    pub images: Vec<HubImage>,
}

// =============================================================================
// Stock Update
// =============================================================================

/// Payload of `product.update_stock` for a single product.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubStockUpdate {
    #[serde(default, deserialize_with = "loose::string")]
    pub art_nr: String,
    #[serde(default, deserialize_with = "loose::int")]
    pub l_bestand: i64,
    #[serde(default, deserialize_with = "loose::flag")]
    pub products_status: bool,
    #[serde(default, deserialize_with = "loose::int")]
    pub shipping_status: i64,
    #[serde(default)]
    pub attributes: HubStockAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubStockAttributes {
    #[serde(default)]
    pub combination_advanced: OrderedMap<HubVariantStock>,
}

/// Stock for one variant; `data` flags are applied only when sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubVariantStock {
    #[serde(default, deserialize_with = "loose::int")]
    pub l_bestand: i64,
    #[serde(default)]
    pub data: HubVariantStockData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubVariantStockData {
    #[serde(default, deserialize_with = "loose::maybe_flag")]
    pub products_status: Option<bool>,
    #[serde(default, deserialize_with = "loose::maybe_int")]
    pub shipping_status: Option<i64>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_product_parses_loose_fields() {
        let product: HubProduct = serde_json::from_value(json!({
            "art_nr": 4711,
            "art_name": "Kaffeebecher",
            "swg": "12",
            "l_bestand": "30",
            "shop": {
                "art": {"products_status": "1", "products_date_available": "0000-00-00 00:00:00"},
                "all_categories": ["12", "0", 14, "14"],
                "attributes": ""
            }
        }))
        .unwrap();

        assert_eq!(product.art_nr, "4711");
        assert_eq!(product.l_bestand, 30);
        assert!(product.shop.art.products_status);
        assert_eq!(product.shop.art.available_from(), None);
        assert_eq!(product.category_ids(), vec![12, 14]);
        assert!(matches!(product.shop.attributes, HubAttributes::Plain));
        assert_eq!(product.shop.group_permission, None);
        assert_eq!(product.creation_number(), "4711");
    }

    #[test]
    fn test_matrix_keeps_combination_order() {
        let product: HubProduct = serde_json::from_value(json!({
            "art_nr": "SHIRT",
            "shop": {
                "group_permission": ["1", "3"],
                "attributes": {
                    "names": {"10": {"de": "Farbe"}},
                    "values": {"10": {"100": {"de": "Rot"}, "101": {"de": "Blau"}}},
                    "combination_advanced": {
                        "SHIRT-R": {"attribute_name_id": [10], "attribute_value_id": ["100"]},
                        "SHIRT-B": {"attribute_name_id": [10], "attribute_value_id": [101]}
                    }
                }
            }
        }))
        .unwrap();

        let matrix = product.shop.attributes.matrix().unwrap();
        let keys: Vec<&str> = matrix.combination_advanced.keys().collect();
        assert_eq!(keys, vec!["SHIRT-R", "SHIRT-B"]);
        assert_eq!(product.creation_number(), "SHIRT-R");
        assert_eq!(product.shop.group_permission, Some(vec![1, 3]));
        assert_eq!(matrix.value_names("de")[&101], (10, "Blau".to_string()));
    }

    #[test]
    fn test_stock_update_distinguishes_unsent_flags() {
        let update: HubStockUpdate = serde_json::from_value(json!({
            "art_nr": "SHIRT",
            "attributes": {"combination_advanced": {
                "SHIRT-R": {"l_bestand": "4", "data": {"products_status": "0"}},
                "SHIRT-B": {"l_bestand": 2}
            }}
        }))
        .unwrap();

        let red = update.attributes.combination_advanced.get("SHIRT-R").unwrap();
        assert_eq!(red.data.products_status, Some(false));
        let blue = update.attributes.combination_advanced.get("SHIRT-B").unwrap();
        assert_eq!(blue.data.products_status, None);
        assert_eq!(blue.data.shipping_status, None);
    }

    #[test]
    fn test_shipping_time_never_negative() {
        assert_eq!(shipping_time(0), 0);
        assert_eq!(shipping_time(1), 0);
        assert_eq!(shipping_time(4), 3);
    }
}
