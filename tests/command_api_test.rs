// Integration tests for POST /api/fms, POST /api/tms and GET /api/health

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use freight_broker::api::{create_router, AppState};
use freight_broker::config::{FmsConfig, HttpConfig, TmsConfig};
use freight_broker::fms::FmsClient;
use freight_broker::tms::TmsClient;
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app(fms_url: &str, tms_url: &str) -> Router {
    let http = HttpConfig::default();
    let fms = FmsClient::new(
        FmsConfig {
            base_url: fms_url.to_string(),
            account: Some("ops".to_string()),
            password: Some("s3cret".to_string()),
            ..FmsConfig::default()
        },
        &http,
    )
    .unwrap();
    let tms = TmsClient::new(
        TmsConfig {
            base_url: tms_url.to_string(),
            username: Some("dispatch".to_string()),
            password: Some("pw".to_string()),
            ..TmsConfig::default()
        },
        &http,
    )
    .unwrap();

    create_router(AppState {
        fms: Arc::new(fms),
        tms: Arc::new(tms),
    })
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

/// Missing required parameters are rejected with 400 and no upstream traffic.
#[tokio::test]
async fn test_missing_parameters_return_400() {
    let mut server = Server::new_async().await;
    let any = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let app = create_test_app(&server.url(), &server.url());

    let (status, body) = post(
        app.clone(),
        "/api/fms",
        json!({"action": "searchBillTo", "payload": {"code": "   "}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Bill-To code"));

    let (status, _) = post(
        app.clone(),
        "/api/fms",
        json!({"action": "searchOrdersRaw", "payload": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(
        app,
        "/api/tms",
        json!({"action": "traceByBillTo", "payload": {"billTo": ""}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("billTo"));

    any.assert_async().await;
}

#[tokio::test]
async fn test_unknown_action_returns_400() {
    let app = create_test_app("http://127.0.0.1:9", "http://127.0.0.1:9");

    let (status, body) = post(app.clone(), "/api/fms", json!({"action": "dropTables"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown action");

    let (status, body) = post(app, "/api/tms", json!({"payload": {}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown TMS action");
}

#[tokio::test]
async fn test_get_on_command_route_is_405() {
    let app = create_test_app("http://127.0.0.1:9", "http://127.0.0.1:9");

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/fms")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_health_reports_empty_cache() {
    let app = create_test_app("http://127.0.0.1:9", "http://127.0.0.1:9");

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "ok");
    assert_eq!(health["fms"]["cached"], false);
    assert_eq!(health["tms"]["cached"], false);
    assert!(health["fms"]["issuedAt"].is_null());
}

/// FMS login then order search; the cached session is reported by health.
#[tokio::test]
async fn test_fms_command_end_to_end() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/fms-platform-user/Auth/Login")
        .with_status(200)
        .with_body(r#"{"data":{"token":"tok-1"}}"#)
        .expect(1)
        .create_async()
        .await;
    let orders = server
        .mock("POST", "/fms-platform-order/shipment-orders/query")
        .match_header("fms-token", "tok-1")
        .match_body(Matcher::PartialJson(json!({
            "bill_to_accounts": ["ACME"],
            "page_size": 50,
            "status": ["10", "20", "30", "40", "50"]
        })))
        .with_status(200)
        .with_body(r#"{"code":200,"data":{"total":1}}"#)
        .expect(1)
        .create_async()
        .await;
    let app = create_test_app(&server.url(), "http://127.0.0.1:9");

    let (status, body) = post(
        app.clone(),
        "/api/fms",
        json!({
            "action": "searchOrdersByBillTo",
            "payload": {"billToCode": " ACME ", "page_size": "50", "activeOnly": true}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"code": 200, "data": {"total": 1}}));

    let (_, health) = {
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice::<Value>(&body).unwrap())
    };
    assert_eq!(health["fms"]["cached"], true);
    assert!(health["fms"]["issuedAt"].is_string());

    login.assert_async().await;
    orders.assert_async().await;
}

#[tokio::test]
async fn test_fms_login_action() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/fms-platform-user/Auth/Login")
        .with_status(200)
        .with_body(r#"{"token":"tok-9"}"#)
        .create_async()
        .await;
    let app = create_test_app(&server.url(), "http://127.0.0.1:9");

    let (status, body) = post(app, "/api/fms", json!({"action": "login"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], "tok-9");
    assert!(body.get("authorization").is_none());
    assert!(body["issuedAt"].is_string());
}

/// TMS trace responses are flattened to `{data: [...]}`.
#[tokio::test]
async fn test_tms_trace_is_normalized() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/write/check_login.php")
        .with_status(200)
        .with_header("set-cookie", "PHPSESSID=abc; path=/")
        .with_body(r#"{"UserID":"42","UserToken":"tok-1"}"#)
        .create_async()
        .await;
    let _group = server
        .mock("POST", "/write_new/write_change_user_group.php")
        .with_status(200)
        .create_async()
        .await;
    let trace = server
        .mock("POST", "/write_new/get_tms_trace.php")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("input_filter_pro".into(), "P1\nP2".into()),
            Matcher::UrlEncoded("UserID".into(), "42".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"rows":[{"pro":"P1"},{"pro":"P2"}],"total":2}"#)
        .expect(1)
        .create_async()
        .await;
    let app = create_test_app("http://127.0.0.1:9", &server.url());

    let (status, body) = post(
        app,
        "/api/tms",
        json!({"action": "lookupPros", "payload": {"pros": ["P1", " p1", "P2"]}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": [{"pro": "P1"}, {"pro": "P2"}]}));
    trace.assert_async().await;
}

#[tokio::test]
async fn test_tms_login_failure_returns_502() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/write/check_login.php")
        .with_status(403)
        .create_async()
        .await;
    let app = create_test_app("http://127.0.0.1:9", &server.url());

    let (status, body) = post(app, "/api/tms", json!({"action": "login"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("TMS authentication failed"));
}

#[tokio::test]
async fn test_missing_credentials_return_500() {
    let http = HttpConfig::default();
    let app = create_router(AppState {
        fms: Arc::new(FmsClient::new(FmsConfig::default(), &http).unwrap()),
        tms: Arc::new(TmsClient::new(TmsConfig::default(), &http).unwrap()),
    });

    let (status, body) = post(
        app,
        "/api/fms",
        json!({"action": "files", "payload": {"orderNo": "SO-1"}}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("FMS_USER"));
}
