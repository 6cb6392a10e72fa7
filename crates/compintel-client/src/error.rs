use compintel_core::redact_secrets;
use thiserror::Error;

/// Longest remote error detail kept from a response body.
const MAX_DETAIL_CHARS: usize = 200;

/// Errors returned by the outbound API clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, TLS, or timeout failure from the underlying HTTP client.
    /// The request URL is stripped before the error is stored.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The remote API answered with a non-2xx status. `detail` is the parsed
    /// error field of the body, never the body itself.
    #[error("{service} returned HTTP {status}: {detail}")]
    Status {
        service: &'static str,
        status: u16,
        detail: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Every attempt in the retry budget failed with a transient error.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },

    #[error("{0} is not configured")]
    MissingApiKey(&'static str),

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.without_url())
    }
}

impl ClientError {
    /// `true` for failures worth another attempt: transport errors, HTTP 429,
    /// and HTTP 5xx. Everything else is permanent.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            ClientError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            ClientError::Status { status, .. } => *status == 429 || *status >= 500,
            ClientError::Deserialize { .. }
            | ClientError::RetriesExhausted { .. }
            | ClientError::MissingApiKey(_)
            | ClientError::InvalidConfig(_) => false,
        }
    }

    /// Redacted one-line description safe for status messages and logs.
    #[must_use]
    pub fn summary(&self) -> String {
        redact_secrets(&self.to_string())
    }
}

/// Pulls a human-readable error out of a failed response body.
///
/// Understands the `{"detail": ...}`, `{"error": ...}` and `{"message": ...}`
/// shapes (string or object with `error`/`message`). Non-JSON bodies yield a
/// generic placeholder so raw payloads never reach the operator.
pub(crate) fn error_detail(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|value| {
        ["detail", "error", "message"]
            .iter()
            .find_map(|key| value.get(*key))
            .and_then(|field| match field {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(obj) => obj
                    .get("error")
                    .or_else(|| obj.get("message"))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned),
                _ => None,
            })
    });

    match detail {
        Some(text) if !text.trim().is_empty() => {
            let text = redact_secrets(&text);
            if text.chars().count() > MAX_DETAIL_CHARS {
                let mut cut: String = text.chars().take(MAX_DETAIL_CHARS).collect();
                cut.push('…');
                cut
            } else {
                text
            }
        }
        _ => "no error detail".to_string(),
    }
}
