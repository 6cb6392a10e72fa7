//! Shared domain types, collaborator traits, and configuration for the
//! competitor-intelligence pipeline.

pub mod app_config;
pub mod config;
pub mod memory;
pub mod profile;
pub mod redact;
pub mod report;
pub mod settings;
pub mod store;
pub mod subjects;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use profile::{
    CompetitorProfile, ConversionStatus, FinalReport, ReportSummary, Variation,
};
pub use redact::redact_secrets;
pub use report::{
    AnalysisResult, ErrorDetails, ExtractedPage, Report, ReportPatch, ReportStatus, SearchHit,
};
pub use settings::{ConfigProvider, PipelineSettings};
pub use store::{
    expiry_from, utc_today, CacheEntry, CacheStore, CreateOutcome, CreditLedger, ReportStore, StoreError,
    SubjectCatalog,
};
pub use subjects::{load_subjects, Subject, SubjectsFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read subjects file {path}: {source}")]
    SubjectsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse subjects file: {0}")]
    SubjectsFileParse(#[from] serde_yaml::Error),

    #[error("subjects validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid report status: {0}")]
    InvalidStatus(String),
}
