//! Integration tests for `ExchangeRateClient` using wiremock HTTP mocks.

use std::time::Duration;

use compintel_client::{ClientError, ExchangeRateClient, RateSource, RetryPolicy};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> ExchangeRateClient {
    ExchangeRateClient::new(base_url, Duration::from_secs(5), RetryPolicy::new(2, 0))
        .expect("client construction should not fail")
}

#[tokio::test]
async fn fetches_all_missing_codes_in_one_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/latest"))
        .and(query_param("from", "USD"))
        .and(query_param("to", "EUR,GBP"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "amount": 1.0,
            "base": "USD",
            "date": "2026-01-02",
            "rates": {"EUR": 0.92, "GBP": 0.79}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rates = test_client(&server.uri())
        .fetch_rates("USD", &["EUR".to_string(), "gbp".to_string()])
        .await
        .expect("rates should parse");

    assert_eq!(rates.len(), 2);
    assert!((rates["EUR"] - 0.92).abs() < f64::EPSILON);
    assert!((rates["GBP"] - 0.79).abs() < f64::EPSILON);
}

#[tokio::test]
async fn base_currency_and_empty_requests_skip_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let rates = test_client(&server.uri())
        .fetch_rates("USD", &["USD".to_string(), String::new()])
        .await
        .expect("no-op lookup");
    assert!(rates.is_empty());
}

#[tokio::test]
async fn unknown_currency_is_a_permanent_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "not found"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .fetch_rates("USD", &["XXX".to_string()])
        .await
        .expect_err("404 must fail");
    assert!(matches!(err, ClientError::Status { status: 404, .. }));
}
