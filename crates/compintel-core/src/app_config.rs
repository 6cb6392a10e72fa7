use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub search_api_key: Option<String>,
    pub search_api_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub ai_model: String,
    pub ai_max_validation_retries: u32,
    pub exchange_rate_base_url: String,
    pub store_currency: String,
    pub search_depth: String,
    pub extract_depth: String,
    pub max_results: u32,
    pub search_timeout_secs: u64,
    pub extract_timeout_secs: u64,
    pub ai_timeout_secs: u64,
    pub http_max_attempts: u32,
    pub http_backoff_base_ms: u64,
    pub cache_ttl_secs: u64,
    pub rate_cache_ttl_secs: u64,
    pub cooldown_secs: u64,
    pub daily_credit_budget: f64,
    pub content_token_budget: usize,
    pub analysis_max_chars: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("search_api_base_url", &self.search_api_base_url)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("ai_model", &self.ai_model)
            .field("ai_max_validation_retries", &self.ai_max_validation_retries)
            .field("exchange_rate_base_url", &self.exchange_rate_base_url)
            .field("store_currency", &self.store_currency)
            .field("search_depth", &self.search_depth)
            .field("extract_depth", &self.extract_depth)
            .field("max_results", &self.max_results)
            .field("search_timeout_secs", &self.search_timeout_secs)
            .field("extract_timeout_secs", &self.extract_timeout_secs)
            .field("ai_timeout_secs", &self.ai_timeout_secs)
            .field("http_max_attempts", &self.http_max_attempts)
            .field("http_backoff_base_ms", &self.http_backoff_base_ms)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("rate_cache_ttl_secs", &self.rate_cache_ttl_secs)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("daily_credit_budget", &self.daily_credit_budget)
            .field("content_token_budget", &self.content_token_budget)
            .field("analysis_max_chars", &self.analysis_max_chars)
            .finish()
    }
}
