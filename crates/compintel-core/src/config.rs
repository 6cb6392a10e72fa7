use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(var, "must be a non-negative number".to_string()));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("COMPINTEL_ENV", "development"))?;
    let bind_addr = parse_addr("COMPINTEL_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("COMPINTEL_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("COMPINTEL_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("COMPINTEL_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("COMPINTEL_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let search_api_key = optional("SEARCH_API_KEY");
    let search_api_base_url = or_default("SEARCH_API_BASE_URL", "https://api.tavily.com");
    let openai_api_key = optional("OPENAI_API_KEY");
    let openai_base_url = or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
    let ai_model = or_default("COMPINTEL_AI_MODEL", "gpt-4o-mini");
    let ai_max_validation_retries = parse_u32("COMPINTEL_AI_MAX_VALIDATION_RETRIES", "2")?;
    let exchange_rate_base_url =
        or_default("EXCHANGE_RATE_BASE_URL", "https://api.frankfurter.app");

    let store_currency = parse_currency(&or_default("COMPINTEL_STORE_CURRENCY", "USD"))?;
    let search_depth = parse_depth(
        "COMPINTEL_SEARCH_DEPTH",
        &or_default("COMPINTEL_SEARCH_DEPTH", "advanced"),
    )?;
    let extract_depth = parse_depth(
        "COMPINTEL_EXTRACT_DEPTH",
        &or_default("COMPINTEL_EXTRACT_DEPTH", "advanced"),
    )?;
    let max_results = parse_u32("COMPINTEL_MAX_RESULTS", "10")?;

    let search_timeout_secs = parse_u64("COMPINTEL_SEARCH_TIMEOUT_SECS", "30")?;
    let extract_timeout_secs = parse_u64("COMPINTEL_EXTRACT_TIMEOUT_SECS", "120")?;
    let ai_timeout_secs = parse_u64("COMPINTEL_AI_TIMEOUT_SECS", "90")?;
    let http_max_attempts = parse_u32("COMPINTEL_HTTP_MAX_ATTEMPTS", "3")?;
    if http_max_attempts == 0 {
        return Err(invalid(
            "COMPINTEL_HTTP_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }
    let http_backoff_base_ms = parse_u64("COMPINTEL_HTTP_BACKOFF_BASE_MS", "1000")?;

    let cache_ttl_secs = parse_u64("COMPINTEL_CACHE_TTL_SECS", "86400")?;
    let rate_cache_ttl_secs = parse_u64("COMPINTEL_RATE_CACHE_TTL_SECS", "43200")?;
    let cooldown_secs = parse_u64("COMPINTEL_COOLDOWN_SECS", "3600")?;
    let daily_credit_budget = parse_f64("COMPINTEL_DAILY_CREDIT_BUDGET", "0")?;
    let content_token_budget = parse_usize("COMPINTEL_CONTENT_TOKEN_BUDGET", "3000")?;
    let analysis_max_chars = parse_usize("COMPINTEL_ANALYSIS_MAX_CHARS", "12000")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        search_api_key,
        search_api_base_url,
        openai_api_key,
        openai_base_url,
        ai_model,
        ai_max_validation_retries,
        exchange_rate_base_url,
        store_currency,
        search_depth,
        extract_depth,
        max_results,
        search_timeout_secs,
        extract_timeout_secs,
        ai_timeout_secs,
        http_max_attempts,
        http_backoff_base_ms,
        cache_ttl_secs,
        rate_cache_ttl_secs,
        cooldown_secs,
        daily_credit_budget,
        content_token_budget,
        analysis_max_chars,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "COMPINTEL_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Normalise an ISO-4217 currency code to upper case.
fn parse_currency(raw: &str) -> Result<String, ConfigError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::InvalidEnvVar {
            var: "COMPINTEL_STORE_CURRENCY".to_string(),
            reason: format!("'{raw}' is not a 3-letter currency code"),
        });
    }
    Ok(code)
}

fn parse_depth(var: &str, raw: &str) -> Result<String, ConfigError> {
    match raw {
        "basic" | "advanced" => Ok(raw.to_string()),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("depth must be 'basic' or 'advanced', got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
