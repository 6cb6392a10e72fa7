//! Outbound API clients with bounded retry, failure classification, and
//! credit accounting.

pub mod ai;
pub mod error;
mod http;
pub mod provider;
pub mod rates;
pub mod retry;
pub mod search;
pub mod types;

pub use ai::OpenAiExtractionService;
pub use error::ClientError;
pub use provider::{
    ExtractionFailure, ExtractionRequest, RateSource, SchemaDescriptor, SearchProvider,
    StructuredExtractionService, Validator,
};
pub use rates::ExchangeRateClient;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use search::SearchClient;
pub use types::{ExtractOutcome, FailedPage, RawPage, SearchOutcome, SearchParams};
