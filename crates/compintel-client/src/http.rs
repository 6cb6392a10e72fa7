//! Response handling shared by every client.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::error::{error_detail, ClientError};

/// Builds the shared `reqwest::Client`. Per-call timeouts are applied on each
/// request, so only the connect timeout is fixed here.
pub(crate) fn build_http_client() -> Result<Client, ClientError> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("compintel/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Validates `base_url` and strips its trailing slash.
pub(crate) fn normalize_base_url(base_url: &str) -> Result<String, ClientError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ClientError::InvalidConfig(format!(
            "base URL must be http(s): '{trimmed}'"
        )));
    }
    Ok(trimmed.to_string())
}

/// Maps non-2xx responses to [`ClientError::Status`] and decodes the body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    service: &'static str,
) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            service,
            status: status.as_u16(),
            detail: error_detail(&body),
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source| ClientError::Deserialize {
        context: service.to_string(),
        source,
    })
}
