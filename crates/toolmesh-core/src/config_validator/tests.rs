use super::*;
use serde_json::json;

struct PricingConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_ms: u64,
}

impl ValidateConfig for PricingConfig {
    fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = IssueCollector::new();
        issues.require_url("base_url", self.base_url.as_deref());
        issues.require_positive("timeout_ms", self.timeout_ms);
        issues.recommend(
            "api_key",
            self.api_key.as_deref(),
            "unset; requests will be unauthenticated",
        );
        issues.finish()
    }
}

fn complete() -> PricingConfig {
    PricingConfig {
        base_url: Some("https://pricing.example.test".to_string()),
        api_key: Some("k".to_string()),
        timeout_ms: 5000,
    }
}

fn missing_url() -> PricingConfig {
    PricingConfig {
        base_url: None,
        ..complete()
    }
}

#[test]
fn test_issue_defaults_to_critical() {
    let issue: ConfigIssue = serde_json::from_value(json!({
        "field": "base_url",
        "message": "is required"
    }))
    .unwrap();
    assert!(issue.critical);

    assert!(ConfigIssue::new("a", "b").critical);
    assert!(!ConfigIssue::warning("a", "b").critical);
}

#[test]
fn test_valid_config_is_ready_in_both_modes() {
    assert_eq!(resolve("pricing", &complete(), true).unwrap(), Resolution::Ready);
    assert_eq!(resolve("pricing", &complete(), false).unwrap(), Resolution::Ready);
}

#[test]
fn test_warnings_never_block() {
    let config = PricingConfig {
        api_key: None,
        ..complete()
    };
    assert_eq!(config.validate().len(), 1);
    assert!(resolve("pricing", &config, true).unwrap().is_ready());
}

#[test]
fn test_fail_fast_raises_with_all_issues() {
    let config = PricingConfig {
        api_key: None,
        ..missing_url()
    };
    let err = resolve("pricing", &config, true).unwrap_err();

    assert_eq!(err.service, "pricing");
    assert_eq!(err.issues.len(), 2);
    assert_eq!(err.critical_count(), 1);
    assert!(err.to_string().contains("base_url"));
}

#[test]
fn test_fail_soft_returns_payload() {
    let resolution = resolve("pricing", &missing_url(), false).unwrap();
    assert!(!resolution.is_ready());

    let payload = resolution.payload().unwrap();
    assert_eq!(payload.error_code, "SERVICE_NOT_CONFIGURED");
    assert_eq!(
        serde_json::to_value(payload).unwrap(),
        json!({
            "error_code": "SERVICE_NOT_CONFIGURED",
            "message": "Service configuration is incomplete or invalid.",
            "issues": [
                { "field": "base_url", "message": "is required", "critical": true }
            ]
        })
    );
}

#[test]
fn test_require_url_rejects_non_http() {
    let mut issues = IssueCollector::new();
    issues.require_url("url", Some("ftp://files"));
    issues.require_url("blank", Some("   "));
    issues.require_url("ok", Some("http://localhost:8080"));

    let issues = issues.finish();
    assert_eq!(issues.len(), 2);
    assert!(issues[0].message.contains("ftp://files"));
    assert_eq!(issues[1].field, "blank");
}

#[test]
fn test_extend_nested_prefixes_fields() {
    let mut issues = IssueCollector::new();
    issues.extend_nested("retry", vec![ConfigIssue::new("max_attempts", "zero")]);
    assert_eq!(issues.finish()[0].field, "retry.max_attempts");
}

#[test]
fn test_gate_short_circuits_with_exact_payload() {
    let gate = ServiceGate::new("pricing", &missing_url(), false).unwrap();
    assert!(!gate.is_ready());
    assert_eq!(gate.service(), "pricing");

    let expected = resolve("pricing", &missing_url(), false).unwrap();
    assert_eq!(gate.check().unwrap_err(), *expected.payload().unwrap());

    let ready = ServiceGate::new("pricing", &complete(), false).unwrap();
    assert!(ready.check().is_ok());
}

#[test]
fn test_gate_fail_fast_propagates() {
    assert!(ServiceGate::new("pricing", &missing_url(), true).is_err());
}

#[test]
fn test_require_at_most() {
    let mut issues = IssueCollector::new();
    issues.require_at_most("ttl_secs", 10, 10);
    issues.require_at_most("timeout_ms", 11, 10);
    let issues = issues.finish();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "timeout_ms");
    assert_eq!(issues[0].message, "must be at most 10, got 11");
    assert!(issues[0].critical);
}
