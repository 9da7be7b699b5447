use super::*;

#[test]
fn test_defaults() {
    let settings = ResilienceSettings::default();
    assert_eq!(settings.circuit_breaker.failure_threshold, 5);
    assert_eq!(settings.circuit_breaker.success_threshold, 2);
    assert_eq!(settings.circuit_breaker.timeout_secs, 30);
    assert_eq!(settings.rate_limit.max_requests, 60);
    assert!(!settings.rate_limit.wait);
    assert_eq!(settings.retry.max_attempts, 3);
    assert!(settings.retry.jitter);
    assert!(settings.validate().is_empty());
}

#[test]
fn test_partial_json_fills_defaults() {
    let settings: ResilienceSettings = serde_json::from_str(
        r#"{
            "circuit_breaker": { "failure_threshold": 3 },
            "overrides": { "sec": { "retry": { "max_attempts": 1 } } }
        }"#,
    )
    .unwrap();

    assert_eq!(settings.circuit_breaker.failure_threshold, 3);
    assert_eq!(settings.circuit_breaker.timeout_secs, 30);
    assert_eq!(settings.retry, RetrySettings::default());

    let sec = &settings.overrides["sec"];
    assert!(sec.circuit_breaker.is_none());
    assert_eq!(sec.retry.as_ref().unwrap().max_attempts, 1);
    assert_eq!(sec.retry.as_ref().unwrap().base_delay_ms, 200);
}

#[test]
fn test_conversions() {
    let breaker = CircuitBreakerConfig::from(&BreakerSettings {
        failure_threshold: 4,
        success_threshold: 1,
        timeout_secs: 12,
    });
    assert_eq!(breaker.failure_threshold, 4);
    assert_eq!(breaker.timeout, Duration::from_secs(12));

    let limit = RateLimitConfig::from(&RateLimitSettings {
        max_requests: 10,
        window_secs: 1,
        wait: true,
    });
    assert_eq!(limit, RateLimitConfig::per_second(10));

    let retry = RetryPolicy::from(&RetrySettings {
        max_attempts: 5,
        base_delay_ms: 50,
        max_delay_ms: 500,
        jitter: false,
    });
    assert_eq!(retry.max_attempts, 5);
    assert_eq!(retry.base_delay, Duration::from_millis(50));
    assert_eq!(retry.max_delay, Duration::from_millis(500));
    assert!(!retry.jitter);
}

#[test]
fn test_zero_values_are_critical() {
    let mut settings = ResilienceSettings::default();
    settings.circuit_breaker.failure_threshold = 0;
    settings.rate_limit.window_secs = 0;

    let issues = settings.validate();
    assert_eq!(issues.len(), 2);
    assert!(issues.iter().all(|i| i.critical));
    assert_eq!(issues[0].field, "circuit_breaker.failure_threshold");
    assert_eq!(issues[1].field, "rate_limit.window_secs");
}

#[test]
fn test_base_above_max_is_a_warning() {
    let retry = RetrySettings {
        base_delay_ms: 20_000,
        ..RetrySettings::default()
    };
    let issues = retry.validate();
    assert_eq!(issues.len(), 1);
    assert!(!issues[0].critical);
}

#[test]
fn test_override_issues_are_prefixed() {
    let mut settings = ResilienceSettings::default();
    settings.overrides.insert(
        "trials".to_string(),
        DependencyOverrides {
            rate_limit: Some(RateLimitSettings {
                max_requests: 0,
                ..RateLimitSettings::default()
            }),
            ..DependencyOverrides::default()
        },
    );

    let issues = settings.validate();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "overrides.trials.rate_limit.max_requests");
}

#[test]
fn test_oversized_durations_are_critical() {
    let mut settings = ResilienceSettings::default();
    settings.circuit_breaker.timeout_secs = u64::MAX;
    settings.rate_limit.window_secs = MAX_WINDOW_SECS + 1;
    settings.retry.max_delay_ms = u64::MAX;
    settings.retry.base_delay_ms = 100;

    let issues = settings.validate();
    let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
    assert_eq!(
        fields,
        vec![
            "circuit_breaker.timeout_secs",
            "rate_limit.window_secs",
            "retry.max_delay_ms"
        ]
    );
    assert!(issues.iter().all(|i| i.critical));

    settings.rate_limit.window_secs = MAX_WINDOW_SECS;
    settings.circuit_breaker.timeout_secs = MAX_WINDOW_SECS;
    settings.retry.max_delay_ms = MAX_DELAY_MS;
    assert!(settings.validate().is_empty());
}
