//! # Customer Export
//!
//! `customers.list`, `customer.get`, `customers.count` and
//! `customer.set_deb_kred_id`.
//!
//! Filtering, sorting and paging are parsed into a [`CustomerQuery`] once;
//! the gateway applies it. `count` in a response is the number of matching
//! customers before paging.

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use actindo_core::order::salutation;
use actindo_core::CustomerQuery;
use actindo_store::{Customer, ShippingAddress};

use crate::context::RequestContext;
use crate::error::SyncResult;

/// `customers.list`: compact records when `compact`, full ones otherwise.
pub async fn list(ctx: &RequestContext, compact: bool, filters: &Value) -> SyncResult<Value> {
    let query = CustomerQuery::parse(filters)?;
    let gateway = ctx.gateway();

    let total = gateway
        .customers(&CustomerQuery {
            offset: 0,
            limit: None,
            ..query.clone()
        })
        .await?
        .len();

    let mut customers = Vec::new();
    for customer in gateway.customers(&query).await? {
        let record = if compact {
            compact_record(ctx, &customer).await?
        } else {
            full_record(ctx, &customer).await?
        };
        customers.push(Value::Object(record));
    }

    debug!(count = customers.len(), total, compact, "Exported customers");
    Ok(json!({ "ok": true, "count": total, "customers": customers }))
}

/// `customer.get`: full records for the given filters.
pub async fn get(ctx: &RequestContext, filters: &Value) -> SyncResult<Value> {
    list(ctx, false, filters).await
}

/// `customer.set_deb_kred_id`.
pub async fn set_customer_number(
    ctx: &RequestContext,
    customer_id: i64,
    number: &str,
) -> SyncResult<Value> {
    ctx.gateway().set_customer_number(customer_id, number).await?;
    info!(customer_id = %customer_id, number = %number, "Stored customer number");
    Ok(json!({ "ok": true }))
}

/// `customers.count`.
pub async fn count(ctx: &RequestContext) -> SyncResult<Value> {
    let stats = ctx.gateway().customer_stats().await?;
    Ok(json!({
        "ok": true,
        "counts": {
            "count": stats.count,
            "max_customers_id": stats.max_customer_id,
            "max_deb_kred_id": stats.max_customer_number,
        },
    }))
}

// =============================================================================
// Records
// =============================================================================

async fn compact_record(ctx: &RequestContext, customer: &Customer) -> SyncResult<Map<String, Value>> {
    let billing = &customer.billing;
    let mut record = Map::new();
    record.insert("deb_kred_id".into(), json!(customer_number(customer)));
    record.insert("anrede".into(), json!(salutation(&billing.salutation)));
    record.insert("kurzname".into(), json!(short_name(customer)));
    record.insert("firma".into(), json!(billing.company));
    record.insert("name".into(), json!(billing.last_name));
    record.insert("vorname".into(), json!(billing.first_name));
    record.insert("adresse".into(), json!(street(&billing.street, &billing.street_number)));
    record.insert("plz".into(), json!(billing.zip));
    record.insert("ort".into(), json!(billing.city));
    record.insert("land".into(), json!(country(ctx, billing.country_id).await?));
    record.insert("email".into(), json!(customer.email));
    record.insert("_customers_id".into(), json!(customer.id));
    Ok(record)
}

/// Full record with delivery addresses newest first; the newest address is
/// also flattened onto the record.
async fn full_record(ctx: &RequestContext, customer: &Customer) -> SyncResult<Map<String, Value>> {
    let billing = &customer.billing;
    let group = ctx.customer_group_by_key(&customer.group_key).await?;

    let mut record = compact_record(ctx, customer).await?;
    record.insert("adresse2".into(), json!(billing.department));
    record.insert("tel".into(), json!(billing.phone));
    record.insert("fax".into(), json!(billing.fax));
    record.insert("ustid".into(), json!(billing.vat_id));
    record.insert(
        "print_brutto".into(),
        json!(i64::from(group.is_some_and(|g| g.show_gross))),
    );
    record.insert("currency".into(), json!("EUR"));
    record.insert(
        "preisgruppe".into(),
        json!(group.map(|g| g.id.to_string()).unwrap_or_default()),
    );
    record.insert(
        "gebdat".into(),
        json!(customer
            .birthday
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "0000-00-00".to_string())),
    );

    let mut addresses: Vec<&ShippingAddress> = customer.shipping.iter().collect();
    addresses.sort_by(|a, b| b.id.cmp(&a.id));

    let mut delivery = Vec::with_capacity(addresses.len());
    for address in addresses {
        delivery.push(delivery_record(ctx, address).await?);
    }
    if let Some(newest) = delivery.first() {
        record.extend(newest.clone());
    }
    record.insert(
        "delivery_addresses".into(),
        Value::Array(delivery.into_iter().map(Value::Object).collect()),
    );
    Ok(record)
}

async fn delivery_record(
    ctx: &RequestContext,
    shipping: &ShippingAddress,
) -> SyncResult<Map<String, Value>> {
    let address = &shipping.address;
    let short = if address.company.is_empty() {
        &address.last_name
    } else {
        &address.company
    };

    let mut record = Map::new();
    record.insert("delivery_id".into(), json!(shipping.id));
    record.insert("delivery_kurzname".into(), json!(short));
    record.insert("delivery_firma".into(), json!(address.company));
    record.insert("delivery_name".into(), json!(address.last_name));
    record.insert("delivery_vorname".into(), json!(address.first_name));
    record.insert(
        "delivery_adresse".into(),
        json!(street(&address.street, &address.street_number)),
    );
    record.insert("delivery_adresse2".into(), json!(address.department));
    record.insert("delivery_plz".into(), json!(address.zip));
    record.insert("delivery_ort".into(), json!(address.city));
    record.insert("delivery_land".into(), json!(country(ctx, address.country_id).await?));
    Ok(record)
}

/// The hub's numeric customer number, 0 when unset or not numeric.
fn customer_number(customer: &Customer) -> i64 {
    customer
        .customer_number
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(0)
}

fn short_name(customer: &Customer) -> String {
    let billing = &customer.billing;
    if billing.company.is_empty() {
        format!("{}, {}", billing.last_name, billing.first_name)
    } else {
        billing.company.clone()
    }
}

fn street(street: &str, number: &str) -> String {
    format!("{street} {}", number.replace(' ', "")).trim_end().to_string()
}

async fn country(ctx: &RequestContext, country_id: i64) -> SyncResult<String> {
    Ok(ctx.country_iso(country_id).await?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::context;
    use crate::error::ErrorKind;
    use actindo_store::{Address, Country, CustomerGateway, CustomerGroup, Snapshot};
    use chrono::NaiveDate;

    fn address(first: &str, last: &str, company: &str, country_id: i64) -> Address {
        Address {
            salutation: "mr".into(),
            company: company.into(),
            first_name: first.into(),
            last_name: last.into(),
            street: "Ring".into(),
            street_number: "12 b".into(),
            zip: "1010".into(),
            city: "Wien".into(),
            country_id,
            ..Address::default()
        }
    }

    fn customer(id: i64, last: &str, number: &str, country_id: i64) -> Customer {
        Customer {
            id,
            email: format!("{}@example.org", last.to_lowercase()),
            group_key: "H".into(),
            customer_number: number.into(),
            billing: address("Hans", last, "", country_id),
            ..Customer::default()
        }
    }

    fn snapshot() -> Snapshot {
        let mut anna = customer(3, "Berger", "10003", 1);
        anna.birthday = NaiveDate::from_ymd_opt(1980, 2, 29);
        anna.shipping = vec![
            ShippingAddress { id: 7, address: address("Anna", "Berger", "", 1) },
            ShippingAddress { id: 9, address: address("Anna", "Berger", "Lager GmbH", 2) },
        ];
        Snapshot {
            countries: vec![
                Country { id: 1, name: "Österreich".into(), iso: "AT".into() },
                Country { id: 2, name: "Deutschland".into(), iso: "DE".into() },
            ],
            customer_groups: vec![CustomerGroup {
                id: 2,
                key: "H".into(),
                description: "Händler".into(),
                show_gross: false,
                gross_entry: false,
                discount: 0.0,
                minimum_order: 0.0,
            }],
            customers: vec![
                customer(1, "Adler", "", 2),
                customer(2, "Zeller", "abc", 1),
                anna,
            ],
            ..Snapshot::default()
        }
    }

    fn names(result: &Value) -> Vec<&str> {
        result["customers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_compact_list_defaults_to_id_descending() {
        let (_, ctx) = context(snapshot());
        let result = list(&ctx, true, &Value::Null).await.unwrap();

        assert_eq!(result["count"], 3);
        assert_eq!(names(&result), vec!["Berger", "Zeller", "Adler"]);
        let adler = &result["customers"][2];
        assert_eq!(adler["kurzname"], "Adler, Hans");
        assert_eq!(adler["adresse"], "Ring 12b");
        assert_eq!(adler["land"], "de");
        assert_eq!(adler["deb_kred_id"], 0);
        assert!(adler.get("delivery_addresses").is_none());
    }

    #[tokio::test]
    async fn test_filters_and_paging_keep_total() {
        let (_, ctx) = context(snapshot());
        let filters = json!({
            "start": 0,
            "limit": 1,
            "sortColName": "name",
            "sortOrder": "ASC",
            "filter": [{"field": "land", "data": {"type": "list", "value": "AT,DE"}}]
        });

        let result = list(&ctx, true, &filters).await.unwrap();
        assert_eq!(result["count"], 3);
        assert_eq!(names(&result), vec!["Adler"]);
    }

    #[tokio::test]
    async fn test_unknown_filter_field_is_rejected() {
        let (_, ctx) = context(snapshot());
        let filters = json!([{"field": "password", "data": {"type": "string", "value": "x"}}]);
        let err = list(&ctx, true, &filters).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_full_record_flattens_newest_address() {
        let (_, ctx) = context(snapshot());
        let filters = json!([{"field": "_customers_id", "data": {"type": "numeric", "value": 3}}]);

        let result = get(&ctx, &filters).await.unwrap();
        let anna = &result["customers"][0];

        assert_eq!(anna["deb_kred_id"], 10003);
        assert_eq!(anna["gebdat"], "1980-02-29");
        assert_eq!(anna["preisgruppe"], "2");
        assert_eq!(anna["print_brutto"], 0);
        assert_eq!(anna["delivery_addresses"][0]["delivery_id"], 9);
        assert_eq!(anna["delivery_addresses"][1]["delivery_id"], 7);
        assert_eq!(anna["delivery_id"], 9);
        assert_eq!(anna["delivery_kurzname"], "Lager GmbH");
        assert_eq!(anna["delivery_land"], "de");
    }

    #[tokio::test]
    async fn test_customer_number_and_counts() {
        let (store, ctx) = context(snapshot());
        set_customer_number(&ctx, 1, "10010").await.unwrap();
        assert_eq!(store.customer(1).await.unwrap().customer_number, "10010");

        let counts = count(&ctx).await.unwrap();
        assert_eq!(
            counts["counts"],
            json!({"count": 3, "max_customers_id": 3, "max_deb_kred_id": 10010})
        );
    }
}
