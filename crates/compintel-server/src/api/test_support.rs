//! In-memory pipeline and canned providers for router tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use compintel_client::{
    ClientError, ExtractOutcome, ExtractionFailure, ExtractionRequest, RateSource, RawPage,
    SearchOutcome, SearchParams, SearchProvider, StructuredExtractionService,
};
use compintel_core::memory::{
    MemoryCacheStore, MemoryCreditLedger, MemoryReportStore, MemorySubjectCatalog,
};
use compintel_core::{PipelineSettings, SearchHit, Subject};
use compintel_pipeline::{Pipeline, PipelineDeps};
use serde_json::{json, Value};

use super::{build_app, default_rate_limit_state, AppState};
use crate::middleware::AuthState;

pub(super) fn url(n: usize) -> String {
    format!("https://store-{n}.example/item/x200")
}

struct CannedSearch;

#[async_trait]
impl SearchProvider for CannedSearch {
    async fn search(&self, _params: &SearchParams) -> Result<SearchOutcome, ClientError> {
        Ok(SearchOutcome {
            hits: (1..=2)
                .map(|n| SearchHit {
                    url: url(n),
                    title: format!("X200 at store {n}"),
                    snippet: "Wireless Mouse X200".to_string(),
                    score: None,
                })
                .collect(),
            credits: None,
        })
    }

    async fn extract(&self, urls: &[String], _depth: &str) -> Result<ExtractOutcome, ClientError> {
        Ok(ExtractOutcome {
            pages: urls
                .iter()
                .map(|u| RawPage {
                    url: u.clone(),
                    raw_content: "<h1>Wireless Mouse X200</h1><p>Price: $19.99</p><p>In stock</p>"
                        .to_string(),
                    images: Vec::new(),
                })
                .collect(),
            failed: Vec::new(),
            credits: None,
        })
    }
}

struct NoRates;

#[async_trait]
impl RateSource for NoRates {
    async fn fetch_rates(
        &self,
        _base: &str,
        _codes: &[String],
    ) -> Result<BTreeMap<String, f64>, ClientError> {
        Ok(BTreeMap::new())
    }
}

/// Answers with a USD profile for whichever URL the content names.
struct EchoExtraction;

#[async_trait]
impl StructuredExtractionService for EchoExtraction {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<Value, ExtractionFailure> {
        let source = request
            .content
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Source URL: "))
            .unwrap_or_default();
        Ok(json!({
            "name": "Wireless Mouse X200",
            "current_price": 19.99,
            "currency": "USD",
            "url": source,
            "availability": "In stock"
        }))
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineDeps {
        reports: Arc::new(MemoryReportStore::new()),
        subjects: Arc::new(MemorySubjectCatalog::new([Subject {
            id: "sku-x200".to_string(),
            title: "Wireless Mouse X200".to_string(),
            category: None,
            brand: Some("Acme".to_string()),
        }])),
        cache: Arc::new(MemoryCacheStore::new()),
        ledger: Arc::new(MemoryCreditLedger::new()),
        config: Arc::new(PipelineSettings::default()),
        search: Arc::new(CannedSearch),
        rates: Arc::new(NoRates),
        extraction: Arc::new(EchoExtraction),
    })
}

fn state() -> AppState {
    AppState {
        pipeline: Arc::new(pipeline()),
        pool: None,
    }
}

pub(super) fn app() -> Router {
    let auth = AuthState::from_keys("", true).expect("auth");
    build_app(state(), auth, default_rate_limit_state())
}

pub(super) fn app_with_auth(key: &str) -> Router {
    let auth = AuthState::from_keys(key, false).expect("auth");
    build_app(state(), auth, default_rate_limit_state())
}

pub(super) fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub(super) async fn read_json(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&body).expect("json parse")
}
