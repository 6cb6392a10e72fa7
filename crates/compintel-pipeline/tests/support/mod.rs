//! Fakes and fixtures shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use compintel_client::{
    ClientError, ExtractOutcome, ExtractionFailure, ExtractionRequest, FailedPage, RateSource,
    RawPage, SearchOutcome, SearchParams, SearchProvider, StructuredExtractionService,
};
use compintel_core::memory::{
    MemoryCacheStore, MemoryCreditLedger, MemoryReportStore, MemorySubjectCatalog,
};
use compintel_core::{PipelineSettings, ReportStore, SearchHit, Subject};
use compintel_pipeline::{Pipeline, PipelineDeps};
use serde_json::{json, Value};
use uuid::Uuid;

pub const SUBJECT_ID: &str = "sku-x200";

pub fn subject() -> Subject {
    Subject {
        id: SUBJECT_ID.to_string(),
        title: "Wireless Mouse X200".to_string(),
        category: Some("Computer Accessories".to_string()),
        brand: Some("Acme".to_string()),
    }
}

pub fn url(n: usize) -> String {
    format!("https://shop-{n}.example/products/x200")
}

pub fn hits(count: usize) -> Vec<SearchHit> {
    (1..=count)
        .map(|n| SearchHit {
            url: url(n),
            title: format!("X200 at shop {n}"),
            snippet: "Wireless Mouse X200 in stock".to_string(),
            score: Some(0.9),
        })
        .collect()
}

pub fn page(url: &str, price: &str) -> RawPage {
    RawPage {
        url: url.to_string(),
        raw_content: format!(
            "<html><body><nav>[Home](/)</nav><h1>Acme Wireless Mouse X200</h1>\
             <p>Price: {price}</p><p>In stock, ships today</p></body></html>"
        ),
        images: Vec::new(),
    }
}

fn server_error() -> ClientError {
    ClientError::Status {
        service: "search",
        status: 503,
        detail: "upstream unavailable".to_string(),
    }
}

pub struct FakeSearch {
    pub hits: Mutex<Vec<SearchHit>>,
    pub extract: Mutex<ExtractOutcome>,
    pub fail_search: Mutex<bool>,
    pub fail_extract: Mutex<bool>,
    pub search_calls: AtomicUsize,
    pub extract_calls: AtomicUsize,
    pub last_extract_urls: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new(hits: Vec<SearchHit>, extract: ExtractOutcome) -> Self {
        Self {
            hits: Mutex::new(hits),
            extract: Mutex::new(extract),
            fail_search: Mutex::new(false),
            fail_extract: Mutex::new(false),
            search_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
            last_extract_urls: Mutex::new(Vec::new()),
        }
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, _params: &SearchParams) -> Result<SearchOutcome, ClientError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_search.lock().unwrap() {
            return Err(ClientError::RetriesExhausted {
                attempts: 3,
                last: Box::new(server_error()),
            });
        }
        Ok(SearchOutcome {
            hits: self.hits.lock().unwrap().clone(),
            credits: Some(1.0),
        })
    }

    async fn extract(&self, urls: &[String], _depth: &str) -> Result<ExtractOutcome, ClientError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_extract_urls.lock().unwrap() = urls.to_vec();
        if *self.fail_extract.lock().unwrap() {
            return Err(server_error());
        }
        Ok(self.extract.lock().unwrap().clone())
    }
}

/// Rate source answering from a fixed table and recording each request.
pub struct FakeRates {
    pub table: BTreeMap<String, f64>,
    pub requests: Mutex<Vec<Vec<String>>>,
}

impl FakeRates {
    pub fn new(table: &[(&str, f64)]) -> Self {
        Self {
            table: table.iter().map(|(c, r)| ((*c).to_string(), *r)).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RateSource for FakeRates {
    async fn fetch_rates(
        &self,
        _base: &str,
        codes: &[String],
    ) -> Result<BTreeMap<String, f64>, ClientError> {
        self.requests.lock().unwrap().push(codes.to_vec());
        Ok(codes
            .iter()
            .filter_map(|c| self.table.get(c).map(|r| (c.clone(), *r)))
            .collect())
    }
}

/// Extraction service keyed by the `Source URL:` line of the request.
/// URLs without a canned answer fail validation.
pub struct FakeExtraction {
    pub answers: Mutex<HashMap<String, Value>>,
    pub calls: AtomicUsize,
    /// When set, the next call cancels this report before answering.
    pub cancel_during_call: Mutex<Option<(Pipeline, Uuid)>>,
}

impl FakeExtraction {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            cancel_during_call: Mutex::new(None),
        }
    }

    pub fn answer(&self, url: &str, value: Value) {
        self.answers.lock().unwrap().insert(url.to_string(), value);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuredExtractionService for FakeExtraction {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<Value, ExtractionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let cancel = self.cancel_during_call.lock().unwrap().take();
        if let Some((pipeline, report_id)) = cancel {
            pipeline
                .cancel(report_id)
                .await
                .expect("cancel during extraction");
        }
        let url = source_url(request.content).unwrap_or_default();
        let answer = self.answers.lock().unwrap().get(&url).cloned();
        match answer {
            Some(value) => {
                (request.schema.validate)(&value).map_err(|errors| {
                    ExtractionFailure::ValidationExhausted {
                        attempts: 3,
                        errors,
                    }
                })?;
                Ok(value)
            }
            None => Err(ExtractionFailure::ValidationExhausted {
                attempts: 3,
                errors: vec!["current_price must be a positive number".to_string()],
            }),
        }
    }
}

fn source_url(content: &str) -> Option<String> {
    content
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("Source URL: "))
        .map(str::to_string)
}

pub fn profile_json(url: &str, price: f64, currency: &str) -> Value {
    json!({
        "name": "Acme Wireless Mouse X200",
        "current_price": price,
        "currency": currency,
        "url": url,
        "availability": "In stock",
        "features": ["Wireless", "Silent clicks"]
    })
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub reports: Arc<MemoryReportStore>,
    pub cache: Arc<MemoryCacheStore>,
    pub ledger: Arc<MemoryCreditLedger>,
    pub search: Arc<FakeSearch>,
    pub rates: Arc<FakeRates>,
    pub ai: Arc<FakeExtraction>,
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        store_currency: "USD".to_string(),
        cooldown: Duration::from_secs(3_600),
        ..PipelineSettings::default()
    }
}

/// Five search hits; shops 1 and 2 extract, shop 3 fails.
pub fn default_extract() -> ExtractOutcome {
    ExtractOutcome {
        pages: vec![page(&url(1), "$24.99"), page(&url(2), "€22,00")],
        failed: vec![FailedPage {
            url: url(3),
            reason: "timeout while fetching page".to_string(),
        }],
        credits: Some(1.0),
    }
}

pub fn harness(settings: PipelineSettings) -> Harness {
    harness_with(settings, default_extract(), &[("EUR", 0.92)])
}

pub fn harness_with(
    settings: PipelineSettings,
    extract: ExtractOutcome,
    rates: &[(&str, f64)],
) -> Harness {
    harness_wrapping(settings, extract, rates, |reports| reports as Arc<dyn ReportStore>)
}

/// Like [`harness_with`], but the pipeline talks to the store returned by
/// `wrap`; `Harness::reports` still points at the underlying memory store.
pub fn harness_wrapping(
    settings: PipelineSettings,
    extract: ExtractOutcome,
    rates: &[(&str, f64)],
    wrap: impl FnOnce(Arc<MemoryReportStore>) -> Arc<dyn ReportStore>,
) -> Harness {
    let reports = Arc::new(MemoryReportStore::new());
    let cache = Arc::new(MemoryCacheStore::new());
    let ledger = Arc::new(MemoryCreditLedger::new());
    let search = Arc::new(FakeSearch::new(hits(5), extract));
    let rates = Arc::new(FakeRates::new(rates));
    let ai = Arc::new(FakeExtraction::new());

    let pipeline = Pipeline::new(PipelineDeps {
        reports: wrap(reports.clone()),
        subjects: Arc::new(MemorySubjectCatalog::new([subject()])),
        cache: cache.clone(),
        ledger: ledger.clone(),
        config: Arc::new(settings),
        search: search.clone(),
        rates: rates.clone(),
        extraction: ai.clone(),
    });

    Harness {
        pipeline,
        reports,
        cache,
        ledger,
        search,
        rates,
        ai,
    }
}
