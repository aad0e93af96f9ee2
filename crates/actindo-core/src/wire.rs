//! # Wire Helpers
//!
//! The hub is loosely typed: the same field arrives as `"1"`, `1`, `1.0` or
//! `true` depending on which hub module produced it, and empty collections
//! arrive as `""`, `false` or `null`. Everything that reads hub payloads goes
//! through the coercions in this module so the rest of the crate only ever
//! sees fixed types.
//!
//! ## Coercion Table
//! ```text
//! ┌──────────────┬───────────┬─────────────┬──────────┬─────────────────┐
//! │ incoming     │ int       │ float       │ bool     │ string          │
//! ├──────────────┼───────────┼─────────────┼──────────┼─────────────────┤
//! │ 1 / 1.0      │ 1         │ 1.0         │ true     │ "1"             │
//! │ "12"         │ 12        │ 12.0        │ true     │ "12"            │
//! │ "0" / ""     │ 0         │ 0.0         │ false    │ "0" / ""        │
//! │ "9.95"       │ 9         │ 9.95        │ true     │ "9.95"          │
//! │ true/false   │ 1/0       │ 1.0/0.0     │ as is    │ "1" / ""        │
//! │ null         │ 0         │ 0.0         │ false    │ ""              │
//! └──────────────┴───────────┴─────────────┴──────────┴─────────────────┘
//! ```
//!
//! Outgoing payloads use fixed types. [`scrub_nulls`] is the last step before
//! a response leaves the connector: no collection is ever sent as `null`.

use serde::de::{self, DeserializeOwned, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

// =============================================================================
// Loose Scalars
// =============================================================================

/// Reads an integer the way the hub means it.
pub fn loose_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or_default()
        }
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// Reads a float the way the hub means it.
pub fn loose_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or_default(),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Reads a flag the way the hub means it.
///
/// Empty strings, `"0"`, `"false"`, zero, empty collections and `null` are
/// false; everything else is true.
pub fn loose_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

/// Reads a string the way the hub means it.
pub fn loose_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        _ => String::new(),
    }
}

/// Returns true for arrays and objects, the two shapes a hub collection can take.
pub fn is_collection(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// Flattens an array or an index-keyed object into a list of entries.
pub fn entries(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// Serde Adapters
// =============================================================================

/// `deserialize_with` adapters for loosely typed hub fields.
///
/// ## Usage
/// ```rust
/// use serde::Deserialize;
/// use actindo_core::wire::loose;
///
/// #[derive(Deserialize)]
/// struct Stock {
///     #[serde(default, deserialize_with = "loose::int")]
///     l_bestand: i64,
/// }
///
/// let stock: Stock = serde_json::from_str(r#"{"l_bestand": "12"}"#).unwrap();
/// assert_eq!(stock.l_bestand, 12);
/// ```
pub mod loose {
    use super::*;

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Value::deserialize(d).map(|v| loose_i64(&v))
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Value::deserialize(d).map(|v| loose_f64(&v))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Value::deserialize(d).map(|v| loose_bool(&v))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Value::deserialize(d).map(|v| loose_string(&v))
    }

    /// Integer that treats `null`, `""` and zero as absent.
    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Value::deserialize(d).map(|v| Some(loose_i64(&v)).filter(|n| *n != 0))
    }

    /// String that treats `null` and `""` as absent.
    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Value::deserialize(d).map(|v| Some(loose_string(&v)).filter(|s| !s.is_empty()))
    }

    /// Integer that distinguishes "not sent" (`None` via `default`) from a sent value.
    pub fn maybe_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Value::deserialize(d).map(|v| (!v.is_null()).then(|| loose_i64(&v)))
    }

    /// Flag that distinguishes "not sent" (`None` via `default`) from a sent value.
    pub fn maybe_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Value::deserialize(d).map(|v| (!v.is_null()).then(|| loose_bool(&v)))
    }

    /// Float that distinguishes "not sent" from a sent value; `""` counts as not sent.
    pub fn maybe_float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Value::deserialize(d).map(|v| match v {
            Value::Null => None,
            Value::String(ref s) if s.trim().is_empty() => None,
            other => Some(loose_f64(&other)),
        })
    }

    /// List of integers from an array or index-keyed object; anything else is empty.
    pub fn int_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<i64>, D::Error> {
        Value::deserialize(d).map(|v| entries(&v).into_iter().map(loose_i64).collect())
    }

    /// Like [`int_list`], but `None` when the hub did not send a collection at all.
    pub fn opt_int_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<i64>>, D::Error> {
        Value::deserialize(d).map(|v| {
            is_collection(&v).then(|| entries(&v).into_iter().map(loose_i64).collect())
        })
    }

    /// Collection that tolerates `""`, `false` and `null` as "empty", and
    /// index-keyed objects where a list is expected.
    pub fn collection<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(d)?;
        match value {
            Value::Array(_) => serde_json::from_value(value).map_err(de::Error::custom),
            Value::Object(map) => {
                let as_map = Value::Object(map);
                match serde_json::from_value(as_map.clone()) {
                    Ok(parsed) => Ok(parsed),
                    Err(map_err) => {
                        let values = match as_map {
                            Value::Object(m) => m.into_iter().map(|(_, v)| v).collect(),
                            _ => Vec::new(),
                        };
                        serde_json::from_value(Value::Array(values))
                            .map_err(|_| de::Error::custom(map_err))
                    }
                }
            }
            _ => Ok(T::default()),
        }
    }
}

// =============================================================================
// Ordered Map
// =============================================================================

/// String-keyed map that keeps the hub's key order.
///
/// The hub encodes id-keyed structures (`combination_advanced`, category
/// children) as objects whose iteration order carries meaning: the first
/// combination becomes the main variant, children are listed in ordinal order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        OrderedMap(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces, keeping the original position of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.iter().map(|(_, v)| v)
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map, a list, or an empty scalar")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((key, value)) = access.next_entry::<Value, V>()? {
            map.insert(loose_string(&key), value);
        }
        Ok(map)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        let mut index = 0usize;
        while let Some(value) = access.next_element::<V>()? {
            map.insert(index.to_string(), value);
            index += 1;
        }
        Ok(map)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(OrderedMapVisitor(PhantomData))
    }
}

// =============================================================================
// Outgoing Payloads
// =============================================================================

/// Replaces every `null` in an outgoing payload with an empty struct.
///
/// The hub's deserializer treats `null` and "missing" differently from an
/// empty collection; a response must never carry `null`.
pub fn scrub_nulls(value: Value) -> Value {
    match value {
        Value::Null => Value::Object(Map::new()),
        Value::Array(items) => Value::Array(items.into_iter().map(scrub_nulls).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, scrub_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Encodes a flag the way the hub expects it in responses.
pub fn flag(value: bool) -> i64 {
    i64::from(value)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loose_scalars() {
        assert_eq!(loose_i64(&json!("12")), 12);
        assert_eq!(loose_i64(&json!("9.95")), 9);
        assert_eq!(loose_i64(&json!(true)), 1);
        assert_eq!(loose_i64(&json!(null)), 0);
        assert_eq!(loose_f64(&json!("9.95")), 9.95);
        assert_eq!(loose_f64(&json!(3)), 3.0);
        assert!(loose_bool(&json!("1")));
        assert!(!loose_bool(&json!("0")));
        assert!(!loose_bool(&json!("")));
        assert!(!loose_bool(&json!(0.0)));
        assert_eq!(loose_string(&json!(17)), "17");
        assert_eq!(loose_string(&json!(null)), "");
    }

    #[derive(Deserialize, Default)]
    struct Sample {
        #[serde(default, deserialize_with = "loose::int")]
        stock: i64,
        #[serde(default, deserialize_with = "loose::flag")]
        active: bool,
        #[serde(default, deserialize_with = "loose::collection")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "loose::opt_int")]
        parent: Option<i64>,
    }

    #[test]
    fn test_adapters_accept_hub_shapes() {
        let s: Sample =
            serde_json::from_value(json!({"stock": "5", "active": "1", "tags": "", "parent": "0"}))
                .unwrap();
        assert_eq!(s.stock, 5);
        assert!(s.active);
        assert!(s.tags.is_empty());
        assert_eq!(s.parent, None);

        let s: Sample =
            serde_json::from_value(json!({"tags": {"0": "a", "1": "b"}, "parent": 4})).unwrap();
        assert_eq!(s.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(s.parent, Some(4));
    }

    #[test]
    fn test_ordered_map_keeps_hub_order() {
        let map: OrderedMap<i64> =
            serde_json::from_str(r#"{"ZZ-1": 1, "AA-2": 2, "MM-3": 3}"#).unwrap();
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["ZZ-1", "AA-2", "MM-3"]);

        let out = serde_json::to_string(&map).unwrap();
        assert_eq!(out, r#"{"ZZ-1":1,"AA-2":2,"MM-3":3}"#);
    }

    #[test]
    fn test_ordered_map_tolerates_empty_scalars() {
        let map: OrderedMap<i64> = serde_json::from_str(r#""""#).unwrap();
        assert!(map.is_empty());
        let map: OrderedMap<i64> = serde_json::from_str("null").unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_scrub_nulls_replaces_nested_nulls() {
        let out = scrub_nulls(json!({"a": null, "b": [1, null], "c": {"d": null}}));
        assert_eq!(out, json!({"a": {}, "b": [1, {}], "c": {"d": {}}}));
    }
}
