use super::*;

#[test]
fn test_new_generates_distinct_ids() {
    let a = TraceContext::new();
    let b = TraceContext::new();
    assert_ne!(a.trace_id(), b.trace_id());
    assert_ne!(a.correlation_id(), b.correlation_id());
    assert_ne!(a.trace_id(), a.correlation_id());
}

#[test]
fn test_headers_roundtrip_through_extraction() {
    let ctx = TraceContext::from_parts("trace-1", "corr-1");
    let headers = ctx.headers();
    assert_eq!(headers[0], ("X-Trace-Id", "trace-1".to_string()));
    assert_eq!(headers[1], ("X-Correlation-Id", "corr-1".to_string()));

    assert_eq!(TraceContext::from_headers(headers), ctx);
}

#[test]
fn test_from_headers_is_case_insensitive() {
    let ctx = TraceContext::from_headers([
        ("x-trace-id", "abc"),
        ("content-type", "application/json"),
        ("X-CORRELATION-ID", "def"),
    ]);
    assert_eq!(ctx.trace_id(), "abc");
    assert_eq!(ctx.correlation_id(), "def");
}

#[test]
fn test_from_headers_generates_missing_ids() {
    let ctx = TraceContext::from_headers([("X-Trace-Id", "abc"), ("X-Correlation-Id", "  ")]);
    assert_eq!(ctx.trace_id(), "abc");
    assert!(!ctx.correlation_id().trim().is_empty());

    let empty: [(&str, &str); 0] = [];
    let fresh = TraceContext::from_headers(empty);
    assert!(Uuid::parse_str(fresh.trace_id()).is_ok());
    assert!(Uuid::parse_str(fresh.correlation_id()).is_ok());
}

#[tokio::test]
async fn test_scope_sets_current() {
    assert!(TraceContext::current().is_none());

    let ctx = TraceContext::from_parts("t", "c");
    let seen = ctx
        .clone()
        .scope(async { TraceContext::current() })
        .await;
    assert_eq!(seen, Some(ctx));
    assert!(TraceContext::current().is_none());
}

#[tokio::test]
async fn test_scope_does_not_leak_into_spawned_tasks() {
    let ctx = TraceContext::from_parts("t", "c");
    let inner = ctx
        .scope(async { tokio::spawn(async { TraceContext::current() }).await.unwrap() })
        .await;
    assert!(inner.is_none());
}

#[tokio::test]
async fn test_current_or_new_inside_scope() {
    let ctx = TraceContext::from_parts("t", "c");
    let got = ctx.clone().scope(async { TraceContext::current_or_new() }).await;
    assert_eq!(got, ctx);
    assert_ne!(TraceContext::current_or_new(), ctx);
}

#[test]
fn test_display() {
    assert_eq!(TraceContext::from_parts("t", "c").to_string(), "t/c");
}
