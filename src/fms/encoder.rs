//! Request builders for FMS operations.
//!
//! The order-query endpoint is schema-strict about field presence: every
//! multi-valued filter must be sent, even as an empty array. All order searches
//! therefore start from [`OrderQuery::default`] and override only what the
//! operation needs.

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::FmsConfig;
use crate::dispatch::{EncodedRequest, RequestBody};
use crate::error::{BrokerError, OperationKind, Result};
use crate::identifiers::{normalize_identifiers, require_param};

pub const ACCEPT: &str = "application/json, text/plain, */*";

pub const DEFAULT_PAGE_NUMBER: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10_000;
/// Page size for tracking-number lookups.
pub const LOOKUP_PAGE_SIZE: u32 = 200;

/// Full filter body for `POST shipment-orders/query`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderQuery {
    pub order_nos: Vec<String>,
    pub tracking_nos: Vec<String>,
    pub customer_references: Vec<String>,
    pub bols: Vec<String>,
    pub bill_to_accounts: Vec<String>,
    pub master_order_ids: Vec<String>,
    pub status: Vec<String>,
    pub sub_status: Vec<String>,
    pub shipment_types: Vec<String>,
    pub service_levels: Vec<String>,
    pub trips: Vec<String>,
    pub shipper_terminals: Vec<String>,
    pub origin_states: Vec<String>,
    pub origin_zip_codes: Vec<String>,
    pub request_pickup_date: Vec<String>,
    pub pickup_appointment: Vec<String>,
    pub current_locations: Vec<String>,
    pub service_terminals: Vec<String>,
    pub lhs: Vec<String>,
    pub lh_etd_date: Vec<String>,
    pub lh_eta_date: Vec<String>,
    pub consignee_terminals: Vec<String>,
    pub consignee_state: Vec<String>,
    pub consignee_zip_codes: Vec<String>,
    pub desired_delivery_date: Vec<String>,
    pub delivery_appointment: Vec<String>,
    pub delivery_date: Vec<String>,
    pub pickup_complete_date: Vec<String>,
    pub pu_nos: Vec<String>,
    pub po_nos: Vec<String>,
    pub exception: bool,
    pub delayed: bool,
    pub hold: bool,
    pub business_client: String,
    pub record_status: String,
    pub page_number: u32,
    pub page_size: u32,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            order_nos: Vec::new(),
            tracking_nos: Vec::new(),
            customer_references: Vec::new(),
            bols: Vec::new(),
            bill_to_accounts: Vec::new(),
            master_order_ids: Vec::new(),
            status: Vec::new(),
            sub_status: Vec::new(),
            shipment_types: Vec::new(),
            service_levels: Vec::new(),
            trips: Vec::new(),
            shipper_terminals: Vec::new(),
            origin_states: Vec::new(),
            origin_zip_codes: Vec::new(),
            request_pickup_date: Vec::new(),
            pickup_appointment: Vec::new(),
            current_locations: Vec::new(),
            service_terminals: Vec::new(),
            lhs: Vec::new(),
            lh_etd_date: Vec::new(),
            lh_eta_date: Vec::new(),
            consignee_terminals: Vec::new(),
            consignee_state: Vec::new(),
            consignee_zip_codes: Vec::new(),
            desired_delivery_date: Vec::new(),
            delivery_appointment: Vec::new(),
            delivery_date: Vec::new(),
            pickup_complete_date: Vec::new(),
            pu_nos: Vec::new(),
            po_nos: Vec::new(),
            exception: false,
            delayed: false,
            hold: false,
            business_client: String::new(),
            record_status: "0".to_string(),
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl OrderQuery {
    fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| BrokerError::Validation(format!("failed to encode order query: {}", e)))
    }
}

/// Caller parameters for an order search by bill-to account.
#[derive(Debug, Clone, Default)]
pub struct BillToOrderParams {
    pub bill_to: String,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
    /// Restrict to the configured active status codes.
    pub active_only: bool,
}

/// Shape returned for a lookup that had nothing to look up.
pub fn empty_order_result() -> Value {
    json!({ "data": [], "total": 0 })
}

fn headers(config: &FmsConfig, json_body: bool) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("accept", ACCEPT.to_string()),
        ("company-id", config.company_id.clone()),
        ("fms-client", config.client_id.clone()),
    ];
    if json_body {
        headers.push(("Content-Type", "application/json".to_string()));
    }
    headers
}

fn order_query_request(config: &FmsConfig, operation: OperationKind, body: Value) -> EncodedRequest {
    EncodedRequest {
        operation,
        method: Method::POST,
        path: config.orders_path.clone(),
        query: Vec::new(),
        headers: headers(config, true),
        body: RequestBody::Json(body),
    }
}

/// `GET search-business-client?<key>=<code>`. No Content-Type header.
pub fn bill_to_search(config: &FmsConfig, code: Option<&str>) -> Result<EncodedRequest> {
    let code = require_param(code, "Bill-To code")?;
    Ok(EncodedRequest {
        operation: OperationKind::BillToSearch,
        method: Method::GET,
        path: config.bill_to_path.clone(),
        query: vec![(config.bill_to_query_key.clone(), code)],
        headers: headers(config, false),
        body: RequestBody::Empty,
    })
}

/// Caller-supplied filter body, overlaid on the full default schema.
pub fn order_search(config: &FmsConfig, body: Option<&Value>) -> Result<EncodedRequest> {
    let overrides = match body {
        Some(Value::Object(map)) => map,
        _ => {
            return Err(BrokerError::Validation(
                "missing body for order search".to_string(),
            ))
        }
    };

    let mut merged = match OrderQuery::default().to_value()? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }

    Ok(order_query_request(
        config,
        OperationKind::OrderSearch,
        Value::Object(merged),
    ))
}

pub fn order_search_by_bill_to(
    config: &FmsConfig,
    params: &BillToOrderParams,
) -> Result<EncodedRequest> {
    let bill_to = require_param(Some(params.bill_to.as_str()), "billToCode")?;
    let mut query = OrderQuery {
        bill_to_accounts: vec![bill_to],
        page_number: params.page_number.unwrap_or(DEFAULT_PAGE_NUMBER),
        page_size: params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        ..OrderQuery::default()
    };
    if params.active_only {
        query.status = config.active_status_codes.clone();
    }

    Ok(order_query_request(
        config,
        OperationKind::OrderSearchByBillTo,
        query.to_value()?,
    ))
}

/// Order search by tracking numbers. `None` when nothing is left after
/// normalization, in which case no call should be made.
pub fn multi_identifier_lookup<S: AsRef<str>>(
    config: &FmsConfig,
    identifiers: &[S],
) -> Result<Option<EncodedRequest>> {
    let tracking_nos = normalize_identifiers(identifiers.iter());
    if tracking_nos.is_empty() {
        return Ok(None);
    }

    let query = OrderQuery {
        page_size: LOOKUP_PAGE_SIZE.max(tracking_nos.len() as u32),
        tracking_nos,
        ..OrderQuery::default()
    };

    Ok(Some(order_query_request(
        config,
        OperationKind::MultiIdentifierLookup,
        query.to_value()?,
    )))
}

/// Single tracking-number search used for proof-of-delivery checks.
pub fn pod_check(config: &FmsConfig, pro: Option<&str>) -> Result<EncodedRequest> {
    let pro = require_param(pro, "pro")?;
    let query = OrderQuery {
        tracking_nos: vec![pro],
        page_size: LOOKUP_PAGE_SIZE,
        ..OrderQuery::default()
    };

    Ok(order_query_request(
        config,
        OperationKind::OrderSearch,
        query.to_value()?,
    ))
}

/// `GET <files_path><orderNo>`.
pub fn file_lookup(config: &FmsConfig, order_no: Option<&str>) -> Result<EncodedRequest> {
    let order_no = require_param(order_no, "orderNo")?;
    Ok(EncodedRequest {
        operation: OperationKind::FileLookup,
        method: Method::GET,
        path: format!("{}{}", config.files_path, urlencoding::encode(&order_no)),
        query: Vec::new(),
        headers: headers(config, false),
        body: RequestBody::Empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_FIELDS: &[&str] = &[
        "order_nos",
        "tracking_nos",
        "customer_references",
        "bols",
        "bill_to_accounts",
        "master_order_ids",
        "status",
        "sub_status",
        "shipment_types",
        "service_levels",
        "trips",
        "shipper_terminals",
        "origin_states",
        "origin_zip_codes",
        "request_pickup_date",
        "pickup_appointment",
        "current_locations",
        "service_terminals",
        "lhs",
        "lh_etd_date",
        "lh_eta_date",
        "consignee_terminals",
        "consignee_state",
        "consignee_zip_codes",
        "desired_delivery_date",
        "delivery_appointment",
        "delivery_date",
        "pickup_complete_date",
        "pu_nos",
        "po_nos",
    ];

    fn json_body(request: &EncodedRequest) -> &Value {
        match &request.body {
            RequestBody::Json(value) => value,
            other => panic!("expected JSON body, got {:?}", other),
        }
    }

    #[test]
    fn test_order_search_by_bill_to_defaults() {
        let config = FmsConfig::default();
        let params = BillToOrderParams {
            bill_to: "ACME123".to_string(),
            ..Default::default()
        };
        let request = order_search_by_bill_to(&config, &params).unwrap();
        let body = json_body(&request);

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/fms-platform-order/shipment-orders/query");
        assert_eq!(body["bill_to_accounts"], json!(["ACME123"]));
        assert_eq!(body["page_number"], json!(1));
        assert_eq!(body["page_size"], json!(10000));
        for field in LIST_FIELDS.iter().filter(|f| **f != "bill_to_accounts") {
            assert_eq!(body[*field], json!([]), "field {} should be an empty array", field);
        }
        assert_eq!(body["exception"], json!(false));
        assert_eq!(body["delayed"], json!(false));
        assert_eq!(body["hold"], json!(false));
        assert_eq!(body["business_client"], json!(""));
        assert_eq!(body["record_status"], json!("0"));
        assert_eq!(body.as_object().unwrap().len(), LIST_FIELDS.len() + 7);
    }

    #[test]
    fn test_order_search_by_bill_to_overrides_and_active() {
        let config = FmsConfig::default();
        let params = BillToOrderParams {
            bill_to: " ACME123 ".to_string(),
            page_number: Some(3),
            page_size: Some(50),
            active_only: true,
        };
        let request = order_search_by_bill_to(&config, &params).unwrap();
        let body = json_body(&request);

        assert_eq!(body["bill_to_accounts"], json!(["ACME123"]));
        assert_eq!(body["page_number"], json!(3));
        assert_eq!(body["page_size"], json!(50));
        assert_eq!(body["status"], json!(config.active_status_codes));
    }

    #[test]
    fn test_order_search_by_bill_to_requires_code() {
        let params = BillToOrderParams {
            bill_to: "   ".to_string(),
            ..Default::default()
        };
        let err = order_search_by_bill_to(&FmsConfig::default(), &params).unwrap_err();
        assert!(matches!(err, BrokerError::Validation(_)));
    }

    #[test]
    fn test_order_search_overlays_caller_body() {
        let config = FmsConfig::default();
        let caller = json!({"order_nos": ["SO-1"], "page_size": 25});
        let request = order_search(&config, Some(&caller)).unwrap();
        let body = json_body(&request);

        assert_eq!(body["order_nos"], json!(["SO-1"]));
        assert_eq!(body["page_size"], json!(25));
        // Fields the caller left out are still present
        assert_eq!(body["tracking_nos"], json!([]));
        assert_eq!(body["po_nos"], json!([]));
        assert_eq!(body["record_status"], json!("0"));
    }

    #[test]
    fn test_order_search_rejects_non_object() {
        let config = FmsConfig::default();
        assert!(order_search(&config, None).is_err());
        assert!(order_search(&config, Some(&json!(["x"]))).is_err());
    }

    #[test]
    fn test_multi_identifier_lookup_normalizes() {
        let config = FmsConfig::default();
        let request = multi_identifier_lookup(&config, &["  ", "A1", "a1", "A1"])
            .unwrap()
            .unwrap();
        let body = json_body(&request);

        assert_eq!(request.operation, OperationKind::MultiIdentifierLookup);
        assert_eq!(body["tracking_nos"], json!(["A1"]));
        assert_eq!(body["page_size"], json!(200));
        assert_eq!(body["bill_to_accounts"], json!([]));
    }

    #[test]
    fn test_multi_identifier_lookup_empty() {
        let config = FmsConfig::default();
        let none: [&str; 0] = [];
        assert!(multi_identifier_lookup(&config, &none).unwrap().is_none());
        assert!(multi_identifier_lookup(&config, &[" ", ""]).unwrap().is_none());
    }

    #[test]
    fn test_pod_check() {
        let request = pod_check(&FmsConfig::default(), Some(" 12345 ")).unwrap();
        let body = json_body(&request);
        assert_eq!(body["tracking_nos"], json!(["12345"]));
        assert_eq!(body["page_size"], json!(200));
        assert_eq!(body["order_nos"], json!([]));
    }

    #[test]
    fn test_bill_to_search_headers_and_query() {
        let config = FmsConfig::default();
        let request = bill_to_search(&config, Some("ACME")).unwrap();

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.query, vec![("Code".to_string(), "ACME".to_string())]);
        assert_eq!(request.header("accept"), Some(ACCEPT));
        assert_eq!(request.header("company-id"), Some("SBFH"));
        assert_eq!(request.header("fms-client"), Some("FMS_WEB"));
        assert_eq!(request.header("Content-Type"), None);
        assert_eq!(request.body, RequestBody::Empty);
    }

    #[test]
    fn test_bill_to_search_query_key_is_configurable() {
        let config = FmsConfig {
            bill_to_query_key: "code".to_string(),
            ..FmsConfig::default()
        };
        let request = bill_to_search(&config, Some("ACME")).unwrap();
        assert_eq!(request.query[0].0, "code");
    }

    #[test]
    fn test_file_lookup_path() {
        let config = FmsConfig::default();
        let request = file_lookup(&config, Some("SO 100/2")).unwrap();
        assert_eq!(
            request.path,
            "/fms-platform-order/shipper/order-file/SO%20100%2F2"
        );

        let legacy = FmsConfig {
            files_path: "/files/".to_string(),
            ..FmsConfig::default()
        };
        assert_eq!(file_lookup(&legacy, Some("SO1")).unwrap().path, "/files/SO1");
        assert!(file_lookup(&legacy, Some("")).is_err());
    }
}
