//! # Sync Service
//!
//! The entry point for hub calls. A method name is parsed into an
//! [`RpcMethod`] once; positional params are read with loose coercion and
//! missing ones take their defaults.
//!
//! ## Call Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncService::call                              │
//! │                                                                         │
//! │  "orders.set_status", [12, "3", "", 1]                                  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  RpcMethod::from_str ── unknown ──► {ok:false, kind:"validation"}       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  request gate (one call at a time)                                      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  RequestContext::new ──► translator ──► scrub_nulls ──► response        │
//! │                              │                                          │
//! │                              └── Err ──► to_fault                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use actindo_core::wire::{loose_bool, loose_i64, loose_string, scrub_nulls};
use actindo_store::StorefrontGateway;

use crate::config::ConnectorConfig;
use crate::context::RequestContext;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::{category, customer, order, product, settings};

// =============================================================================
// Methods
// =============================================================================

/// Every RPC method the hub may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    ProductCount,
    ProductCreateUpdate,
    ProductGet,
    ProductDelete,
    ProductUpdateStock,
    CategoryGet,
    CategoryAction,
    CustomersList,
    CustomerGet,
    CustomersCount,
    CustomerSetNumber,
    OrdersList,
    OrdersListPositions,
    OrdersCount,
    OrdersSetStatus,
    OrdersSetStatusInvoice,
    OrdersSetTrackingCode,
    SettingsGet,
    Ping,
    GetTime,
    GetConnectorVersion,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 21] = [
        RpcMethod::ProductCount,
        RpcMethod::ProductCreateUpdate,
        RpcMethod::ProductGet,
        RpcMethod::ProductDelete,
        RpcMethod::ProductUpdateStock,
        RpcMethod::CategoryGet,
        RpcMethod::CategoryAction,
        RpcMethod::CustomersList,
        RpcMethod::CustomerGet,
        RpcMethod::CustomersCount,
        RpcMethod::CustomerSetNumber,
        RpcMethod::OrdersList,
        RpcMethod::OrdersListPositions,
        RpcMethod::OrdersCount,
        RpcMethod::OrdersSetStatus,
        RpcMethod::OrdersSetStatusInvoice,
        RpcMethod::OrdersSetTrackingCode,
        RpcMethod::SettingsGet,
        RpcMethod::Ping,
        RpcMethod::GetTime,
        RpcMethod::GetConnectorVersion,
    ];

    /// Wire name, e.g. `orders.set_trackingcode`.
    pub fn as_str(self) -> &'static str {
        match self {
            RpcMethod::ProductCount => "product.count",
            RpcMethod::ProductCreateUpdate => "product.create_update",
            RpcMethod::ProductGet => "product.get",
            RpcMethod::ProductDelete => "product.delete",
            RpcMethod::ProductUpdateStock => "product.update_stock",
            RpcMethod::CategoryGet => "category.get",
            RpcMethod::CategoryAction => "category.action",
            RpcMethod::CustomersList => "customers.list",
            RpcMethod::CustomerGet => "customer.get",
            RpcMethod::CustomersCount => "customers.count",
            RpcMethod::CustomerSetNumber => "customer.set_deb_kred_id",
            RpcMethod::OrdersList => "orders.list",
            RpcMethod::OrdersListPositions => "orders.list_positions",
            RpcMethod::OrdersCount => "orders.count",
            RpcMethod::OrdersSetStatus => "orders.set_status",
            RpcMethod::OrdersSetStatusInvoice => "orders.set_status_invoice",
            RpcMethod::OrdersSetTrackingCode => "orders.set_trackingcode",
            RpcMethod::SettingsGet => "settings.get",
            RpcMethod::Ping => "actindo.ping",
            RpcMethod::GetTime => "actindo.get_time",
            RpcMethod::GetConnectorVersion => "actindo.get_connector_version",
        }
    }

    /// Methods that write to the storefront.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            RpcMethod::ProductCreateUpdate
                | RpcMethod::ProductDelete
                | RpcMethod::ProductUpdateStock
                | RpcMethod::CategoryAction
                | RpcMethod::CustomerSetNumber
                | RpcMethod::OrdersSetStatus
                | RpcMethod::OrdersSetStatusInvoice
                | RpcMethod::OrdersSetTrackingCode
        )
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RpcMethod {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        RpcMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| SyncError::validation(format!("Unknown method: '{name}'")))
    }
}

// =============================================================================
// Params
// =============================================================================

/// Positional params. Surplus entries are ignored; missing ones read as
/// `null` and fall back to the accessor's default.
struct Params<'a>(Vec<&'a Value>);

impl<'a> Params<'a> {
    fn new(params: &'a Value) -> Self {
        match params {
            Value::Array(items) => Params(items.iter().collect()),
            Value::Null => Params(Vec::new()),
            single => Params(vec![single]),
        }
    }

    fn value(&self, n: usize) -> &'a Value {
        self.0.get(n).copied().unwrap_or(&Value::Null)
    }

    fn int(&self, n: usize) -> i64 {
        loose_i64(self.value(n))
    }

    fn count(&self, n: usize) -> usize {
        self.int(n).max(0) as usize
    }

    fn text(&self, n: usize) -> String {
        loose_string(self.value(n))
    }

    fn flag(&self, n: usize) -> bool {
        loose_bool(self.value(n))
    }

    /// Boolean param that defaults to `true` when absent.
    fn flag_or_true(&self, n: usize) -> bool {
        match self.value(n) {
            Value::Null => true,
            v => loose_bool(v),
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Serves hub calls against one storefront.
pub struct SyncService {
    gateway: Arc<dyn StorefrontGateway>,
    config: Arc<ConnectorConfig>,
    /// Held for the whole of a call.
    gate: Mutex<()>,
}

impl SyncService {
    pub fn new(gateway: Arc<dyn StorefrontGateway>, config: ConnectorConfig) -> Self {
        SyncService {
            gateway,
            config: Arc::new(config),
            gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Handles one call by wire name. Never fails: errors become faults.
    pub async fn call(&self, method: &str, params: &Value) -> Value {
        match method.parse::<RpcMethod>() {
            Ok(method) => self.call_method(method, params).await,
            Err(err) => {
                warn!(method = %method, "Rejected unknown method");
                err.to_fault()
            }
        }
    }

    /// Handles one parsed call.
    pub async fn call_method(&self, method: RpcMethod, params: &Value) -> Value {
        let _guard = self.gate.lock().await;
        let ctx = RequestContext::new(self.gateway.clone(), self.config.clone());
        debug!(method = %method, write = method.is_write(), "Handling call");

        match dispatch(&ctx, method, &Params::new(params)).await {
            Ok(result) => scrub_nulls(result),
            Err(err) => {
                match err.kind() {
                    ErrorKind::Io | ErrorKind::Config => {
                        error!(method = %method, error = %err, "Call failed")
                    }
                    kind => warn!(method = %method, kind = %kind, error = %err, "Call rejected"),
                }
                err.to_fault()
            }
        }
    }
}

async fn dispatch(ctx: &RequestContext, method: RpcMethod, p: &Params<'_>) -> SyncResult<Value> {
    match method {
        // product.count(categoryID, ordernumber)
        RpcMethod::ProductCount => product::count(ctx, p.int(0)).await,
        // product.create_update(product)
        RpcMethod::ProductCreateUpdate => product::create_update(ctx, p.value(0)).await,
        // product.get(categoryID, ordernumber, language, justList, offset, limit, filters)
        RpcMethod::ProductGet => {
            product::get(
                ctx,
                &p.text(1),
                p.flag(3),
                p.count(4),
                p.count(5),
                p.value(6),
            )
            .await
        }
        RpcMethod::ProductDelete => product::delete(ctx, &p.text(0)).await,
        RpcMethod::ProductUpdateStock => product::update_stock(ctx, p.value(0)).await,

        RpcMethod::CategoryGet => category::get(ctx).await,
        // category.action(action, categoryID, parentID, referenceID, data)
        RpcMethod::CategoryAction => {
            category::action(
                ctx,
                &p.text(0),
                p.int(1),
                p.int(2),
                p.int(3),
                p.value(4),
            )
            .await
        }

        // customers.list(list, filters)
        RpcMethod::CustomersList => customer::list(ctx, p.flag_or_true(0), p.value(1)).await,
        RpcMethod::CustomerGet => customer::get(ctx, p.value(0)).await,
        RpcMethod::CustomersCount => customer::count(ctx).await,
        RpcMethod::CustomerSetNumber => {
            customer::set_customer_number(ctx, p.int(0), &p.text(1)).await
        }

        RpcMethod::OrdersList => order::list(ctx, p.value(0)).await,
        RpcMethod::OrdersListPositions => order::positions(ctx, p.int(0)).await,
        RpcMethod::OrdersCount => order::count(ctx).await,
        // orders.set_status(orderID, status, comment, notifyCustomer, sendComments)
        RpcMethod::OrdersSetStatus => {
            order::set_status(ctx, p.int(0), p.int(1), &p.text(2), p.flag(3)).await
        }
        RpcMethod::OrdersSetStatusInvoice => order::set_status_invoice(ctx, p.value(0)).await,
        RpcMethod::OrdersSetTrackingCode => {
            order::set_tracking_code(ctx, p.int(0), &p.text(1)).await
        }

        RpcMethod::SettingsGet => settings::get(ctx, p.value(0)).await,
        RpcMethod::Ping => Ok(settings::ping()),
        RpcMethod::GetTime => settings::get_time(ctx).await,
        RpcMethod::GetConnectorVersion => Ok(settings::connector_version(ctx)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::shop;
    use actindo_core::CategoryRecord;
    use actindo_store::{MemoryStorefront, OrderState, Snapshot};
    use serde_json::json;

    fn service(snapshot: Snapshot) -> (Arc<MemoryStorefront>, SyncService) {
        let store = Arc::new(MemoryStorefront::new(snapshot));
        let service = SyncService::new(store.clone(), ConnectorConfig::default());
        (store, service)
    }

    #[test]
    fn test_method_names_round_trip() {
        for method in RpcMethod::ALL {
            assert_eq!(method.as_str().parse::<RpcMethod>().unwrap(), method);
        }
        assert_eq!(
            " Orders.Set_TrackingCode ".parse::<RpcMethod>().unwrap(),
            RpcMethod::OrdersSetTrackingCode
        );
        assert!(RpcMethod::OrdersSetStatus.is_write());
        assert!(!RpcMethod::OrdersList.is_write());
    }

    #[tokio::test]
    async fn test_unknown_method_is_a_validation_fault() {
        let (_, service) = service(Snapshot::default());
        let fault = service.call("product.explode", &json!([])).await;

        assert_eq!(fault["ok"], false);
        assert_eq!(fault["kind"], "validation");
        assert_eq!(fault["error"], "Unknown method: 'product.explode'");
    }

    #[tokio::test]
    async fn test_ping_without_params() {
        let (_, service) = service(Snapshot::default());
        let result = service.call("actindo.ping", &Value::Null).await;
        assert_eq!(result, json!({"ok": true, "pong": "pong"}));
    }

    #[tokio::test]
    async fn test_errors_become_faults() {
        let (_, service) = service(Snapshot::default());

        let fault = service.call("orders.list", &json!([{}])).await;
        assert_eq!(fault["kind"], "not_found");
        assert_eq!(fault["error"], "Could not find any orders");

        let fault = service
            .call("product.get", &json!([0, "XYZ", 0, 0, 0, 0, {}]))
            .await;
        assert_eq!(fault["kind"], "validation");
        assert_eq!(fault["error"], "not an article id: XYZ");

        let fault = service.call("product.get", &json!([0, "99"])).await;
        assert_eq!(fault["ok"], false);
        assert_eq!(fault["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_positional_params_are_coerced() {
        let (store, service) = service(Snapshot {
            shops: vec![shop(1, 1, "de_DE", true)],
            categories: vec![
                CategoryRecord { id: 1, parent_id: None, name: "Root".into(), position: 0 },
                CategoryRecord { id: 2, parent_id: Some(1), name: "Alt".into(), position: 0 },
            ],
            order_states: vec![OrderState { id: 3, description: "Versandt".into() }],
            ..Snapshot::default()
        });

        let result = service
            .call(
                "category.action",
                &json!(["textchange", "2", 0, 0, {"description": {"1": {"name": "Neu"}}}, "surplus"]),
            )
            .await;
        assert_eq!(result, json!({"ok": true}));
        let snap = store.snapshot().await;
        assert_eq!(snap.categories.iter().find(|c| c.id == 2).unwrap().name, "Neu");

        let fault = service.call("orders.set_status", &json!(["1", "9"])).await;
        assert_eq!(fault["error"], "could not find order status with id 9");
    }

    #[tokio::test]
    async fn test_nulls_never_leave_the_service() {
        let (_, service) = service(Snapshot {
            shops: vec![shop(1, 1, "de_DE", true)],
            categories: vec![CategoryRecord {
                id: 1,
                parent_id: None,
                name: "Root".into(),
                position: 0,
            }],
            ..Snapshot::default()
        });

        let result = service.call("category.get", &json!([])).await;
        assert_eq!(result["categories"]["1"], json!({}));

        let result = service.call("settings.get", &json!([])).await;
        assert_eq!(result["settings"]["manufacturers"], json!([]));
        assert_eq!(result["settings"]["vpe"], json!({}));
    }

    #[tokio::test]
    async fn test_calls_are_serialized() {
        let (_, service) = service(Snapshot::default());
        let service = Arc::new(service);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.call("customers.count", &json!([])).await })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result["counts"]["count"], 0);
        }
    }
}
