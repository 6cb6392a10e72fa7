//! Integration tests for `SearchClient` using wiremock HTTP mocks.

use std::sync::Arc;
use std::time::Duration;

use compintel_client::{ClientError, RetryPolicy, SearchClient, SearchParams, SearchProvider};
use compintel_core::memory::MemoryCreditLedger;
use compintel_core::{utc_today, CreditLedger};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str, max_attempts: u32) -> SearchClient {
    SearchClient::new(
        "tvly-test-key",
        base_url,
        Duration::from_secs(5),
        Duration::from_secs(10),
        RetryPolicy::new(max_attempts, 0),
    )
    .expect("client construction should not fail")
}

fn params() -> SearchParams {
    SearchParams {
        query: "\"Wireless Mouse X200\" price".to_string(),
        depth: "advanced".to_string(),
        max_results: 5,
        include_images: false,
    }
}

fn search_body() -> serde_json::Value {
    serde_json::json!({
        "results": [
            {"url": "https://shop-a.example/x200", "title": "X200 at A", "content": "$29.99", "score": 0.91},
            {"url": "https://shop-b.example/p/1", "title": "X200 at B", "content": "€27", "score": 0.80}
        ],
        "usage": {"credits": 2}
    })
}

#[tokio::test]
async fn search_sends_contract_body_and_parses_hits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("authorization", "Bearer tvly-test-key"))
        .and(body_partial_json(serde_json::json!({
            "query": "\"Wireless Mouse X200\" price",
            "search_depth": "advanced",
            "max_results": 5,
            "include_raw_content": false,
            "include_answer": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_client(&server.uri(), 3)
        .search(&params())
        .await
        .expect("search should succeed");

    assert_eq!(outcome.hits.len(), 2);
    assert_eq!(outcome.hits[0].url, "https://shop-a.example/x200");
    assert_eq!(outcome.hits[0].snippet, "$29.99");
    assert_eq!(outcome.credits, Some(2.0));
}

#[tokio::test]
async fn successful_calls_record_credits_for_today() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .mount(&server)
        .await;

    let ledger = Arc::new(MemoryCreditLedger::new());
    let client = test_client(&server.uri(), 1).with_ledger(ledger.clone());
    client.search(&params()).await.expect("first search");
    client.search(&params()).await.expect("second search");

    let total = ledger.total(utc_today()).await.expect("ledger total");
    assert!((total - 4.0).abs() < f64::EPSILON, "got {total}");
}

#[tokio::test]
async fn two_server_errors_then_success_consumes_three_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_client(&server.uri(), 3)
        .search(&params())
        .await
        .expect("third attempt should succeed");
    assert_eq!(outcome.hits.len(), 2);

    let received = server.received_requests().await.expect("recording enabled");
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn rate_limited_responses_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .mount(&server)
        .await;

    let result = test_client(&server.uri(), 2).search(&params()).await;
    assert!(result.is_ok(), "expected Ok after 429 retry, got: {result:?}");
}

#[tokio::test]
async fn exhausting_retries_reports_last_cause() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 3)
        .search(&params())
        .await
        .expect_err("all attempts fail");

    let ClientError::RetriesExhausted { attempts, last } = err else {
        panic!("expected RetriesExhausted, got {err:?}");
    };
    assert_eq!(attempts, 3);
    assert!(matches!(*last, ClientError::Status { status: 503, .. }));
}

#[tokio::test]
async fn unauthorized_is_permanent_and_carries_parsed_detail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"detail": {"error": "Unauthorized: missing or invalid API key."}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 3)
        .search(&params())
        .await
        .expect_err("401 must fail");

    match err {
        ClientError::Status { status, detail, .. } => {
            assert_eq!(status, 401);
            assert_eq!(detail, "Unauthorized: missing or invalid API key.");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 3)
        .search(&params())
        .await
        .expect_err("malformed body must fail");
    assert!(matches!(err, ClientError::Deserialize { .. }));
}

#[tokio::test]
async fn extract_batches_urls_and_partitions_results() {
    let server = MockServer::start().await;
    let urls = vec![
        "https://shop-a.example/x200".to_string(),
        "https://shop-b.example/p/1".to_string(),
        "https://shop-c.example/mouse".to_string(),
    ];

    Mock::given(method("POST"))
        .and(path("/extract"))
        .and(body_partial_json(serde_json::json!({
            "urls": urls,
            "extract_depth": "advanced"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {"url": "https://shop-a.example/x200", "raw_content": "Price: $29.99", "images": ["https://shop-a.example/x200.jpg"]},
                {"url": "https://shop-b.example/p/1", "raw_content": "   "}
            ],
            "failed_results": [
                {"url": "https://shop-c.example/mouse", "error": "timeout"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_client(&server.uri(), 3)
        .extract(&urls, "advanced")
        .await
        .expect("extract should succeed");

    assert_eq!(outcome.pages.len(), 1);
    assert_eq!(outcome.pages[0].url, "https://shop-a.example/x200");
    assert_eq!(outcome.pages[0].images.len(), 1);

    let failed: Vec<&str> = outcome.failed.iter().map(|f| f.url.as_str()).collect();
    assert_eq!(
        failed,
        vec!["https://shop-c.example/mouse", "https://shop-b.example/p/1"]
    );
    assert_eq!(outcome.failed[0].reason, "timeout");
}

#[tokio::test]
async fn extract_with_no_urls_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = test_client(&server.uri(), 3)
        .extract(&[], "basic")
        .await
        .expect("empty extract is a no-op");
    assert!(outcome.pages.is_empty());
    assert!(outcome.failed.is_empty());
}
