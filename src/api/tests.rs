//! Unit tests for command parameter parsing and error mapping

use super::*;
use crate::error::OperationKind;
use serde_json::json;

#[test]
fn test_text_param_accepts_strings_and_numbers() {
    let payload = json!({"code": " ACME ", "orderNo": 1001, "flag": true});
    assert_eq!(text_param(&payload, "code"), Some(" ACME ".to_string()));
    assert_eq!(text_param(&payload, "orderNo"), Some("1001".to_string()));
    assert_eq!(text_param(&payload, "flag"), None);
    assert_eq!(text_param(&payload, "missing"), None);
    assert_eq!(text_param(&Value::Null, "code"), None);
}

#[test]
fn test_number_param() {
    let payload = json!({"a": 25, "b": "7", "c": "", "d": null, "e": "x", "f": 0, "g": -3});
    assert_eq!(number_param(&payload, "a").unwrap(), Some(25));
    assert_eq!(number_param(&payload, "b").unwrap(), Some(7));
    assert_eq!(number_param(&payload, "c").unwrap(), None);
    assert_eq!(number_param(&payload, "d").unwrap(), None);
    assert_eq!(number_param(&payload, "missing").unwrap(), None);
    assert!(number_param(&payload, "e").is_err());
    assert!(number_param(&payload, "f").is_err());
    assert!(number_param(&payload, "g").is_err());
}

#[test]
fn test_flag_param() {
    let payload = json!({"a": true, "b": "true", "c": 1, "d": "no", "e": false});
    assert!(flag_param(&payload, "a"));
    assert!(flag_param(&payload, "b"));
    assert!(flag_param(&payload, "c"));
    assert!(!flag_param(&payload, "d"));
    assert!(!flag_param(&payload, "e"));
    assert!(!flag_param(&payload, "missing"));
}

#[test]
fn test_list_param() {
    let payload = json!({"arr": ["P1", 2, null, "P3"], "text": "P1, P2\nP3"});
    assert_eq!(list_param(&payload, "arr"), vec!["P1", "2", "P3"]);
    let split = list_param(&payload, "text");
    assert!(split.contains(&"P1".to_string()));
    assert!(split.contains(&"P2".to_string()));
    assert!(split.contains(&"P3".to_string()));
    assert!(list_param(&payload, "missing").is_empty());
}

#[test]
fn test_error_status_mapping() {
    let cases = vec![
        (
            BrokerError::Validation("missing code".to_string()),
            StatusCode::BAD_REQUEST,
        ),
        (
            BrokerError::Configuration("FMS_USER is not set".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            BrokerError::authentication(Service::Tms, "group switch failed"),
            StatusCode::BAD_GATEWAY,
        ),
        (
            BrokerError::Upstream {
                service: Service::Fms,
                operation: OperationKind::OrderSearch,
                status: Some(500),
                body: "boom".to_string(),
            },
            StatusCode::BAD_GATEWAY,
        ),
    ];

    for (error, expected) in cases {
        let response = AppError::from(error).into_response();
        assert_eq!(response.status(), expected);
    }
}
