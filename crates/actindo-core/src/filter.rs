//! # Customer Filters
//!
//! Parses the hub's list filters into a [`CustomerQuery`] the gateway can
//! evaluate. Only whitelisted columns can be filtered or sorted on.
//!
//! ## Accepted Shapes
//! ```text
//! { start, limit, sortColName, sortOrder, filter: [ {field, data:{type, value}} ] }
//!
//! [ {field, data:{type, value}}, … ]        bare filter list, no paging
//! ```
//!
//! ## Operators
//! | `data.type`                  | meaning                              |
//! |------------------------------|--------------------------------------|
//! | `list`                       | column IN (comma separated values)   |
//! | `string` / `numeric` / `eq`  | column = value                       |
//! | anything else                | rejected                             |

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::wire::{entries, loose_i64, loose_string};

// =============================================================================
// Columns
// =============================================================================

/// Columns the hub may filter and sort customers by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomerColumn {
    CustomerId,
    DebKredId,
    FirstName,
    LastName,
    Company,
    Country,
    Email,
}

impl CustomerColumn {
    /// The hub's name for this column.
    pub fn as_str(self) -> &'static str {
        match self {
            CustomerColumn::CustomerId => "_customers_id",
            CustomerColumn::DebKredId => "deb_kred_id",
            CustomerColumn::FirstName => "vorname",
            CustomerColumn::LastName => "name",
            CustomerColumn::Company => "firma",
            CustomerColumn::Country => "land",
            CustomerColumn::Email => "email",
        }
    }

    /// Whether values compare as numbers.
    pub fn is_numeric(self) -> bool {
        matches!(self, CustomerColumn::CustomerId | CustomerColumn::DebKredId)
    }
}

impl fmt::Display for CustomerColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerColumn {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "_customers_id" => Ok(CustomerColumn::CustomerId),
            "deb_kred_id" => Ok(CustomerColumn::DebKredId),
            "vorname" => Ok(CustomerColumn::FirstName),
            "name" => Ok(CustomerColumn::LastName),
            "firma" => Ok(CustomerColumn::Company),
            "land" => Ok(CustomerColumn::Country),
            "email" => Ok(CustomerColumn::Email),
            other => Err(ValidationError::UnknownFilterField(other.to_string())),
        }
    }
}

// =============================================================================
// Filters
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOp {
    In(Vec<String>),
    Equals(String),
}

/// One column condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub column: CustomerColumn,
    pub op: FilterOp,
}

impl FieldFilter {
    fn parse(entry: &Value) -> Result<Self, ValidationError> {
        let field = entry.get("field").map(loose_string).unwrap_or_default();
        let column: CustomerColumn = field.parse()?;
        let data = entry.get("data").unwrap_or(&Value::Null);
        let operator = data.get("type").map(loose_string).unwrap_or_default();
        let value = data.get("value").map(loose_string).unwrap_or_default();

        let op = match operator.as_str() {
            "list" => FilterOp::In(value.split(',').map(|v| v.trim().to_string()).collect()),
            "string" | "numeric" | "eq" => FilterOp::Equals(value),
            _ => {
                return Err(ValidationError::UnsupportedFilterOperator { field, operator });
            }
        };
        Ok(FieldFilter { column, op })
    }

    /// Evaluates the condition against a record's column value.
    pub fn matches(&self, value: &str) -> bool {
        let numeric = self.column.is_numeric();
        let same = |wanted: &str| {
            if numeric {
                match (wanted.trim().parse::<i64>(), value.trim().parse::<i64>()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => wanted.trim() == value.trim(),
                }
            } else {
                wanted == value
            }
        };
        match &self.op {
            FilterOp::In(values) => values.iter().any(|v| same(v)),
            FilterOp::Equals(wanted) => same(wanted),
        }
    }
}

// =============================================================================
// Query
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// A parsed customer list request.
///
/// Records are ordered by the explicit sort (if any), then by customer id
/// descending. A limit of `None` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerQuery {
    pub offset: usize,
    pub limit: Option<usize>,
    pub sort: Option<(CustomerColumn, SortDirection)>,
    pub filters: Vec<FieldFilter>,
}

impl CustomerQuery {
    /// Parses either accepted filter shape.
    ///
    /// An unknown sort column is ignored; an unknown filter column or
    /// operator is an error.
    pub fn parse(value: &Value) -> Result<Self, ValidationError> {
        let mut query = CustomerQuery::default();

        let bare = match value {
            Value::Array(items) => items.first().map_or(true, |f| f.get("field").is_some()),
            Value::Object(map) => map.get("0").is_some_and(|f| f.get("field").is_some()),
            _ => false,
        };

        let filter_list = if bare {
            value
        } else {
            if let Some(column) = value
                .get("sortColName")
                .map(loose_string)
                .and_then(|name| name.parse::<CustomerColumn>().ok())
            {
                let direction = match value.get("sortOrder").map(loose_string) {
                    Some(order) if order.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                    _ => SortDirection::Asc,
                };
                query.sort = Some((column, direction));
            }
            query.offset = value.get("start").map(loose_i64).unwrap_or_default().max(0) as usize;
            let limit = value.get("limit").map(loose_i64).unwrap_or_default();
            query.limit = (limit > 0).then_some(limit as usize);
            value.get("filter").unwrap_or(&Value::Null)
        };

        for entry in entries(filter_list) {
            query.filters.push(FieldFilter::parse(entry)?);
        }
        Ok(query)
    }

    /// True when every filter accepts the record.
    pub fn accepts(&self, column_value: impl Fn(CustomerColumn) -> String) -> bool {
        self.filters.iter().all(|f| f.matches(&column_value(f.column)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_shape() {
        let query = CustomerQuery::parse(&json!({
            "start": "20",
            "limit": 10,
            "sortColName": "name",
            "sortOrder": "DESC",
            "filter": [{"field": "land", "data": {"type": "list", "value": "DE, AT"}}]
        }))
        .unwrap();

        assert_eq!(query.offset, 20);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.sort, Some((CustomerColumn::LastName, SortDirection::Desc)));
        assert_eq!(
            query.filters[0].op,
            FilterOp::In(vec!["DE".into(), "AT".into()])
        );
    }

    #[test]
    fn test_bare_list_shape() {
        let query = CustomerQuery::parse(&json!([
            {"field": "_customers_id", "data": {"type": "numeric", "value": "7"}}
        ]))
        .unwrap();
        assert_eq!(query.limit, None);
        assert!(query.accepts(|_| "7".into()));
        assert!(!query.accepts(|_| "8".into()));
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let err = CustomerQuery::parse(&json!({
            "filter": [{"field": "password", "data": {"type": "eq", "value": "x"}}]
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownFilterField(f) if f == "password"));
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let err = CustomerQuery::parse(&json!([
            {"field": "email", "data": {"type": "like", "value": "%@x"}}
        ]))
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedFilterOperator { .. }));
    }

    #[test]
    fn test_unknown_sort_column_is_ignored() {
        let query = CustomerQuery::parse(&json!({"sortColName": "password"})).unwrap();
        assert_eq!(query.sort, None);
        assert!(query.filters.is_empty());
    }

    #[test]
    fn test_numeric_columns_compare_as_numbers() {
        let filter = FieldFilter {
            column: CustomerColumn::DebKredId,
            op: FilterOp::In(vec!["010".into(), "12".into()]),
        };
        assert!(filter.matches("10"));
        assert!(!filter.matches("11"));
    }
}
