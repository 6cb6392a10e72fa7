//! Wire and result types for the search, extract, and rate APIs.

use std::collections::BTreeMap;

use compintel_core::SearchHit;
use serde::{Deserialize, Serialize};

/// Parameters for one search call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub depth: String,
    pub max_results: u32,
    pub include_images: bool,
}

/// Parsed search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// Cost units reported by the provider, if any.
    #[serde(default)]
    pub credits: Option<f64>,
}

/// Raw extracted page body, before sanitizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPage {
    pub url: String,
    pub raw_content: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPage {
    pub url: String,
    pub reason: String,
}

/// Parsed batch-extract response. URLs the provider neither returned nor
/// listed as failed are absent from both lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractOutcome {
    pub pages: Vec<RawPage>,
    pub failed: Vec<FailedPage>,
    #[serde(default)]
    pub credits: Option<f64>,
}

// ---------------------------------------------------------------------------
// Search / extract wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct SearchRequestBody<'a> {
    pub query: &'a str,
    pub search_depth: &'a str,
    pub max_results: u32,
    pub include_images: bool,
    pub include_raw_content: bool,
    pub include_answer: bool,
    pub include_usage: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponseBody {
    #[serde(default)]
    pub results: Vec<SearchResultItem>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResultItem {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Usage {
    #[serde(default)]
    pub credits: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExtractRequestBody<'a> {
    pub urls: &'a [String],
    pub extract_depth: &'a str,
    pub include_images: bool,
    pub include_usage: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractResponseBody {
    #[serde(default)]
    pub results: Vec<ExtractResultItem>,
    #[serde(default)]
    pub failed_results: Vec<ExtractFailureItem>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractResultItem {
    pub url: String,
    #[serde(default)]
    pub raw_content: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractFailureItem {
    pub url: String,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Exchange rates
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct RatesResponseBody {
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
}

// ---------------------------------------------------------------------------
// Chat completions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionBody {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}
