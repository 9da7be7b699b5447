use super::*;
use serde_json::json;

#[test]
fn test_error_code_wire_names() {
    assert_eq!(
        serde_json::to_value(ErrorCode::UpstreamUnavailable).unwrap(),
        json!("UPSTREAM_UNAVAILABLE")
    );
    assert_eq!(
        serde_json::to_value(ErrorCode::CircuitBreakerOpen).unwrap(),
        json!("CIRCUIT_BREAKER_OPEN")
    );
    let parsed: ErrorCode = serde_json::from_value(json!("SERVICE_NOT_CONFIGURED")).unwrap();
    assert_eq!(parsed, ErrorCode::ServiceNotConfigured);
    assert_eq!(ErrorCode::NotFound.to_string(), "NOT_FOUND");
}

#[test]
fn test_only_transient_codes_are_retryable() {
    assert!(ErrorCode::UpstreamUnavailable.retryable());
    assert!(ErrorCode::RateLimited.retryable());

    assert!(!ErrorCode::BadRequest.retryable());
    assert!(!ErrorCode::NotFound.retryable());
    assert!(!ErrorCode::CircuitBreakerOpen.retryable());
    assert!(!ErrorCode::ServiceNotConfigured.retryable());
    assert!(!ErrorCode::InternalError.retryable());
}

#[test]
fn test_payload_shape() {
    let payload = ClassifiedError::new(ErrorCode::RateLimited, "slow down")
        .with_retry_after(30)
        .with_details(json!({ "resource": "sec" }))
        .into_payload();

    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(
        value,
        json!({
            "error": {
                "code": "RATE_LIMITED",
                "message": "slow down",
                "details": { "resource": "sec" },
                "retry_after": 30
            }
        })
    );
}

#[test]
fn test_payload_omits_absent_optionals() {
    let value =
        serde_json::to_value(ClassifiedError::new(ErrorCode::NotFound, "gone").into_payload())
            .unwrap();
    let inner = value["error"].as_object().unwrap();
    assert_eq!(inner.len(), 2);
    assert!(inner.contains_key("code"));
    assert!(inner.contains_key("message"));
}

#[test]
fn test_circuit_open_rounds_retry_after_up() {
    let err = ClassifiedError::circuit_open("trials", Duration::from_millis(1500));
    assert_eq!(err.code, ErrorCode::CircuitBreakerOpen);
    assert_eq!(err.retry_after, Some(2));
    assert!(err.message.contains("trials"));
}

#[test]
fn test_rate_limited_never_advertises_zero() {
    let err = ClassifiedError::rate_limited("pricing", Duration::ZERO);
    assert_eq!(err.retry_after, Some(1));
}

#[test]
fn test_user_friendly_messages() {
    let err = ClassifiedError::new(ErrorCode::RateLimited, "Rate limit exceeded.")
        .with_retry_after(12);
    assert!(err.user_message().contains("12 seconds"));
    assert!(err.suggestion().unwrap().contains("Back off"));
    assert_eq!(
        err.docs_url().unwrap(),
        "https://docs.toolmesh.dev/errors/rate-limited"
    );

    let custom = ClassifiedError::new(ErrorCode::NotFound, "missing")
        .with_docs_url("https://example.test/404");
    assert_eq!(custom.docs_url().unwrap(), "https://example.test/404");
}

#[test]
fn test_config_error_suggestion_counts_critical_issues() {
    let error = Error::Config(ConfigValidationError {
        service: "pricing".to_string(),
        issues: vec![
            crate::ConfigIssue::new("url", "missing"),
            crate::ConfigIssue::warning("api_key", "unset"),
        ],
    });

    assert!(error.user_message().contains("pricing"));
    assert!(error.suggestion().unwrap().contains("1 critical"));
}
