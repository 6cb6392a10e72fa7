//! Seams between the pipeline and the outside world.
//!
//! The pipeline only ever sees these traits; the concrete clients in this
//! crate implement them, and tests substitute fakes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ClientError;
use crate::types::{ExtractOutcome, SearchOutcome, SearchParams};

/// Web search plus batch page extraction.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<SearchOutcome, ClientError>;

    /// Extracts every URL in one round trip.
    async fn extract(&self, urls: &[String], depth: &str) -> Result<ExtractOutcome, ClientError>;
}

/// Exchange-rate lookup. Rates are quoted as units of each code per one unit
/// of `base`.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetches rates for every code in one call. Codes the source does not
    /// know are absent from the result.
    async fn fetch_rates(
        &self,
        base: &str,
        codes: &[String],
    ) -> Result<BTreeMap<String, f64>, ClientError>;
}

/// Validation hook run against every model output. Returns the list of
/// problems, which is sent back to the model on the next attempt.
pub type Validator = fn(&serde_json::Value) -> Result<(), Vec<String>>;

/// Target shape for one structured extraction.
#[derive(Clone)]
pub struct SchemaDescriptor {
    pub name: String,
    pub json_schema: serde_json::Value,
    pub validate: Validator,
}

impl std::fmt::Debug for SchemaDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One structured-extraction call.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// System instructions describing the task.
    pub instructions: &'a str,
    pub content: &'a str,
    pub schema: &'a SchemaDescriptor,
}

#[derive(Debug, Error)]
pub enum ExtractionFailure {
    #[error(transparent)]
    Service(#[from] ClientError),

    #[error("output failed validation after {attempts} attempts: {}", .errors.join("; "))]
    ValidationExhausted { attempts: u32, errors: Vec<String> },
}

impl ExtractionFailure {
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            ExtractionFailure::Service(e) => e.summary(),
            other => compintel_core::redact_secrets(&other.to_string()),
        }
    }
}

/// Turns unstructured text into a value that passed the schema's validator.
#[async_trait]
pub trait StructuredExtractionService: Send + Sync {
    async fn extract(
        &self,
        request: ExtractionRequest<'_>,
    ) -> Result<serde_json::Value, ExtractionFailure>;
}
