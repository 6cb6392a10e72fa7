//! OpenAI-compatible structured extraction over `/chat/completions`.
//!
//! Each attempt asks for a `json_schema` response, parses the message content,
//! and runs the schema's validator. Rejected output is answered with the list
//! of validation problems and the model tries again, up to
//! `max_validation_retries` extra rounds.

use std::time::Duration;

use async_trait::async_trait;
use compintel_core::AppConfig;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::ClientError;
use crate::http::{build_http_client, normalize_base_url, read_json};
use crate::provider::{ExtractionFailure, ExtractionRequest, StructuredExtractionService};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::types::ChatCompletionBody;

const SERVICE: &str = "structured-extraction";

pub struct OpenAiExtractionService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_validation_retries: u32,
    timeout: Duration,
    policy: RetryPolicy,
}

impl OpenAiExtractionService {
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] for a non-http(s) base URL or
    /// [`ClientError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        max_validation_retries: u32,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client()?,
            api_key: api_key.to_owned(),
            base_url: normalize_base_url(base_url)?,
            model: model.to_owned(),
            max_validation_retries,
            timeout,
            policy,
        })
    }

    /// # Errors
    ///
    /// Returns [`ClientError::MissingApiKey`] when `OPENAI_API_KEY` is unset,
    /// plus any error from [`OpenAiExtractionService::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        let api_key = config
            .openai_api_key
            .as_deref()
            .ok_or(ClientError::MissingApiKey("OPENAI_API_KEY"))?;
        Self::new(
            api_key,
            &config.openai_base_url,
            &config.ai_model,
            config.ai_max_validation_retries,
            Duration::from_secs(config.ai_timeout_secs),
            RetryPolicy::new(config.http_max_attempts, config.http_backoff_base_ms),
        )
    }

    async fn complete(
        &self,
        messages: &[Value],
        request: &ExtractionRequest<'_>,
    ) -> Result<Option<String>, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.1,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema.name,
                    "schema": request.schema.json_schema,
                },
            },
        });

        let response: ChatCompletionBody = retry_with_backoff(self.policy, SERVICE, || {
            let request = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .timeout(self.timeout)
                .json(&body);
            async move { read_json(request.send().await?, SERVICE).await }
        })
        .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

/// Parses and validates one model reply.
fn check_output(
    content: Option<&str>,
    request: &ExtractionRequest<'_>,
) -> Result<Value, Vec<String>> {
    let Some(content) = content.map(str::trim).filter(|c| !c.is_empty()) else {
        return Err(vec!["response was empty".to_string()]);
    };
    let value: Value = serde_json::from_str(content)
        .map_err(|e| vec![format!("response was not valid JSON: {e}")])?;
    (request.schema.validate)(&value)?;
    Ok(value)
}

#[async_trait]
impl StructuredExtractionService for OpenAiExtractionService {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<Value, ExtractionFailure> {
        let mut messages = vec![
            json!({ "role": "system", "content": request.instructions }),
            json!({ "role": "user", "content": request.content }),
        ];
        let max_attempts = self.max_validation_retries.saturating_add(1);
        let mut errors = Vec::new();

        for attempt in 1..=max_attempts {
            let content = self.complete(&messages, &request).await?;
            match check_output(content.as_deref(), &request) {
                Ok(value) => return Ok(value),
                Err(problems) => {
                    tracing::warn!(
                        schema = %request.schema.name,
                        attempt,
                        max_attempts,
                        problems = %problems.join("; "),
                        "structured output failed validation"
                    );
                    messages.push(json!({
                        "role": "assistant",
                        "content": content.unwrap_or_default(),
                    }));
                    messages.push(json!({
                        "role": "user",
                        "content": format!(
                            "Your previous answer did not match the schema. Fix these problems and answer again with JSON only:\n- {}",
                            problems.join("\n- ")
                        ),
                    }));
                    errors = problems;
                }
            }
        }

        Err(ExtractionFailure::ValidationExhausted {
            attempts: max_attempts,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SchemaDescriptor;

    fn needs_name(value: &Value) -> Result<(), Vec<String>> {
        match value.get("name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => Ok(()),
            _ => Err(vec!["name must not be blank".to_string()]),
        }
    }

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor {
            name: "test".to_string(),
            json_schema: json!({ "type": "object" }),
            validate: needs_name,
        }
    }

    #[test]
    fn check_output_accepts_valid_json() {
        let schema = schema();
        let request = ExtractionRequest {
            instructions: "",
            content: "",
            schema: &schema,
        };
        let value = check_output(Some(r#"{"name":"Mouse"}"#), &request).unwrap();
        assert_eq!(value["name"], "Mouse");
    }

    #[test]
    fn check_output_reports_parse_and_validation_problems() {
        let schema = schema();
        let request = ExtractionRequest {
            instructions: "",
            content: "",
            schema: &schema,
        };
        let problems = check_output(Some("not json"), &request).unwrap_err();
        assert!(problems[0].contains("not valid JSON"));
        assert_eq!(
            check_output(Some(r#"{"name":" "}"#), &request).unwrap_err(),
            vec!["name must not be blank".to_string()]
        );
        assert_eq!(
            check_output(None, &request).unwrap_err(),
            vec!["response was empty".to_string()]
        );
    }
}
