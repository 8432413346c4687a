use axum::{Json, Router, http::StatusCode, routing::get};
use raven_admin::lookup::{
    CaLookup, HttpCaLookup, LOOKUP_TIMEOUT, LookupError, MockCaLookup, extract_validity,
    normalize_ca_code,
};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;

/// Starts a stand-in for the upstream CA service and returns its base URL.
async fn spawn_upstream() -> String {
    let router = Router::new()
        .route(
            "/ca/12345",
            get(|| async { Json(json!([{ "numero": "12345", "validade": "2030-01-31" }])) }),
        )
        .route("/ca/10000", get(|| async { Json(json!([])) }))
        .route(
            "/ca/20000",
            get(|| async { Json(json!([{ "numero": "20000", "validade": null }])) }),
        )
        .route(
            "/ca/30000",
            get(|| async { Json(json!({ "validade": "2030-01-31" })) }),
        )
        .route(
            "/ca/60000",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!([{ "numero": "60000", "validade": "2030-01-31" }]))
            }),
        )
        .route(
            "/ca/50000",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
        );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}/ca/", port)
}

// --- Normalization & Payload ---

#[test]
fn test_normalize_keeps_only_digits() {
    assert_eq!(normalize_ca_code("12.345-6"), "123456");
    assert_eq!(normalize_ca_code(" CA 0042 "), "0042");
    assert_eq!(normalize_ca_code("abc"), "");
    assert_eq!(normalize_ca_code(""), "");
}

#[test]
fn test_extract_validity_reads_first_record() {
    let payload = json!([{ "validade": "2029-12-01" }, { "validade": "2001-01-01" }]);
    assert_eq!(extract_validity(&payload).unwrap(), "2029-12-01");
}

#[test]
fn test_extract_validity_missing_or_blank_is_not_found() {
    for payload in [json!([]), json!([{}]), json!([{ "validade": "  " }])] {
        assert!(
            matches!(extract_validity(&payload), Err(LookupError::NotFound)),
            "{}",
            payload
        );
    }
}

#[test]
fn test_extract_validity_non_array_is_unavailable() {
    let payload = json!({ "validade": "2030-01-31" });
    assert!(matches!(
        extract_validity(&payload),
        Err(LookupError::Unavailable(_))
    ));
}

// --- HTTP Client ---

#[tokio::test]
async fn test_http_lookup_found() {
    let lookup = HttpCaLookup::new(&spawn_upstream().await).unwrap();
    assert_eq!(lookup.validity("12345").await.unwrap(), "2030-01-31");
}

#[tokio::test]
async fn test_http_lookup_not_found_cases() {
    let lookup = HttpCaLookup::new(&spawn_upstream().await).unwrap();

    // Upstream 404, empty array, null validity.
    for code in ["99999", "10000", "20000"] {
        assert!(
            matches!(lookup.validity(code).await, Err(LookupError::NotFound)),
            "{}",
            code
        );
    }
}

#[tokio::test]
async fn test_http_lookup_unavailable_cases() {
    let lookup = HttpCaLookup::new(&spawn_upstream().await).unwrap();

    for code in ["30000", "50000"] {
        assert!(
            matches!(lookup.validity(code).await, Err(LookupError::Unavailable(_))),
            "{}",
            code
        );
    }
}

#[tokio::test]
async fn test_http_lookup_slow_upstream_times_out() {
    let base_url = spawn_upstream().await;
    let lookup = HttpCaLookup::with_timeout(&base_url, Duration::from_millis(200)).unwrap();

    assert!(matches!(
        lookup.validity("60000").await,
        Err(LookupError::Unavailable(_))
    ));
    // The same record arrives once the client waits long enough.
    let patient = HttpCaLookup::with_timeout(&base_url, Duration::from_secs(4)).unwrap();
    assert_eq!(patient.validity("60000").await.unwrap(), "2030-01-31");
}

#[test]
fn test_default_timeout_is_five_seconds() {
    assert_eq!(LOOKUP_TIMEOUT, Duration::from_secs(5));
}

#[tokio::test]
async fn test_http_lookup_unreachable_upstream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let lookup = HttpCaLookup::new(&format!("http://127.0.0.1:{}/ca", port)).unwrap();
    assert!(matches!(
        lookup.validity("12345").await,
        Err(LookupError::Unavailable(_))
    ));
}

// --- Mock ---

#[tokio::test]
async fn test_mock_records_requested_codes() {
    let lookup = MockCaLookup::with("123", "2031-05-05");

    assert_eq!(lookup.validity("123").await.unwrap(), "2031-05-05");
    assert!(matches!(lookup.validity("456").await, Err(LookupError::NotFound)));
    assert_eq!(lookup.requested(), vec!["123".to_string(), "456".to_string()]);

    let failing = MockCaLookup::failing();
    assert!(matches!(
        failing.validity("123").await,
        Err(LookupError::Unavailable(_))
    ));
}
