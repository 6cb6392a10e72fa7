//! Competitor-profile extraction on top of a [`StructuredExtractionService`].
//!
//! Owns the profile schema and its validator, turns validated JSON into a
//! [`CompetitorProfile`], and applies the domain check: the profile must
//! describe the page it was extracted from, so a returned URL on another host
//! is replaced with the source URL.

use std::sync::Arc;

use compintel_client::{
    ExtractionFailure, ExtractionRequest, SchemaDescriptor, StructuredExtractionService,
};
use compintel_core::{CompetitorProfile, Subject, Variation};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

pub const PROFILE_SCHEMA_NAME: &str = "competitor_profile";

/// JSON schema sent to the model.
#[must_use]
pub fn profile_schema() -> SchemaDescriptor {
    SchemaDescriptor {
        name: PROFILE_SCHEMA_NAME.to_string(),
        json_schema: json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Product name as listed"},
                "current_price": {"type": "number", "exclusiveMinimum": 0},
                "original_price": {"type": ["number", "null"], "description": "Pre-discount price, if shown"},
                "currency": {"type": ["string", "null"], "description": "ISO 4217 code of the listed price"},
                "url": {"type": "string", "description": "Canonical product page URL"},
                "availability": {"type": ["string", "null"]},
                "shipping_info": {"type": ["string", "null"]},
                "seller_name": {"type": ["string", "null"]},
                "rating": {"type": ["number", "null"]},
                "variations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": {"type": "string"},
                            "value": {"type": "string"},
                            "price": {"type": ["number", "null"]},
                            "availability": {"type": ["string", "null"]}
                        },
                        "required": ["type", "value"]
                    }
                },
                "features": {"type": "array", "items": {"type": "string"}},
                "images": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name", "current_price", "url"]
        }),
        validate: validate_profile,
    }
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw.trim()).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
}

/// Field constraints for a competitor profile: non-blank name, positive
/// prices, http(s) URLs, and a three-letter currency code.
///
/// # Errors
///
/// Returns every violated constraint, one message each.
pub fn validate_profile(value: &Value) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let Some(obj) = value.as_object() else {
        return Err(vec!["response must be a JSON object".to_string()]);
    };

    match obj.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => {}
        _ => errors.push("name must be a non-blank string".to_string()),
    }

    match obj.get("current_price").and_then(Value::as_f64) {
        Some(price) if price > 0.0 && price.is_finite() => {}
        _ => errors.push("current_price must be a positive number".to_string()),
    }

    match obj.get("original_price") {
        None | Some(Value::Null) => {}
        Some(v) => match v.as_f64() {
            Some(price) if price > 0.0 && price.is_finite() => {}
            _ => errors.push("original_price must be a positive number or null".to_string()),
        },
    }

    match obj.get("url").and_then(Value::as_str) {
        Some(url) if is_http_url(url) => {}
        _ => errors.push("url must be a well-formed http(s) URL".to_string()),
    }

    match obj.get("currency") {
        None | Some(Value::Null) => {}
        Some(Value::String(code))
            if code.trim().is_empty()
                || (code.trim().len() == 3
                    && code.trim().chars().all(|c| c.is_ascii_alphabetic())) => {}
        Some(_) => errors.push("currency must be a 3-letter ISO 4217 code".to_string()),
    }

    if let Some(images) = obj.get("images").and_then(Value::as_array) {
        for (i, image) in images.iter().enumerate() {
            if !image.as_str().is_some_and(is_http_url) {
                errors.push(format!("images[{i}] must be a well-formed http(s) URL"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[derive(Debug, Deserialize)]
struct ProfileDraft {
    name: String,
    #[serde(with = "rust_decimal::serde::float")]
    current_price: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    original_price: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
    url: String,
    #[serde(default)]
    availability: Option<String>,
    #[serde(default)]
    shipping_info: Option<String>,
    #[serde(default)]
    seller_name: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    variations: Vec<Variation>,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    images: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Host with any leading `www.` removed, lower-cased.
fn comparable_host(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Builds the profile for `source_url`, replacing an off-domain URL.
///
/// # Errors
///
/// Returns the decode error message when `value` does not fit the profile
/// shape despite passing validation.
pub fn profile_from_value(value: Value, source_url: &str) -> Result<CompetitorProfile, String> {
    let draft: ProfileDraft =
        serde_json::from_value(value).map_err(|e| format!("profile did not decode: {e}"))?;

    let mut url = draft.url.trim().to_string();
    let source_host = comparable_host(source_url);
    if source_host.is_none() || comparable_host(&url) != source_host {
        tracing::warn!(
            source_url,
            returned_url = %url,
            "extracted URL does not match source domain, using source URL"
        );
        url = source_url.to_string();
    }

    let mut profile = CompetitorProfile::new(draft.name.trim(), source_url);
    profile.url = url;
    profile.current_price = Some(draft.current_price);
    profile.original_price = draft.original_price;
    profile.currency = non_blank(draft.currency).map(|c| c.to_ascii_uppercase());
    profile.availability = non_blank(draft.availability);
    profile.shipping_info = non_blank(draft.shipping_info);
    profile.seller_name = non_blank(draft.seller_name);
    profile.rating = draft.rating.filter(|r| r.is_finite() && *r >= 0.0);
    profile.variations = draft.variations;
    profile.features = draft
        .features
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    profile.images = draft.images;
    Ok(profile)
}

fn instructions_for(subject: &Subject) -> String {
    let mut described = format!("\"{}\"", subject.title);
    if let Some(brand) = subject.brand.as_deref() {
        described.push_str(&format!(" by {brand}"));
    }
    if let Some(category) = subject.category.as_deref() {
        described.push_str(&format!(" ({category})"));
    }
    format!(
        "You extract competitor product listings for price comparison against {described}. \
         Read the page text and describe the single product it sells. Use the price currently \
         charged as current_price and a struck-through price as original_price. Report the \
         listed currency as an ISO 4217 code. Use null for anything the page does not state. \
         Answer with JSON only."
    )
}

/// Structured extraction of one competitor page.
#[derive(Clone)]
pub struct ProfileExtractor {
    service: Arc<dyn StructuredExtractionService>,
    schema: SchemaDescriptor,
}

/// A failed profile extraction, already redacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFailure(pub String);

impl ProfileExtractor {
    #[must_use]
    pub fn new(service: Arc<dyn StructuredExtractionService>) -> Self {
        Self {
            service,
            schema: profile_schema(),
        }
    }

    /// # Errors
    ///
    /// Returns a [`ProfileFailure`] when the service fails or exhausts its
    /// validation retries, or when the validated value does not decode.
    pub async fn extract(
        &self,
        subject: &Subject,
        source_url: &str,
        content: &str,
    ) -> Result<CompetitorProfile, ProfileFailure> {
        let instructions = instructions_for(subject);
        let page = format!("Source URL: {source_url}\n\n{content}");
        let value = self
            .service
            .extract(ExtractionRequest {
                instructions: &instructions,
                content: &page,
                schema: &self.schema,
            })
            .await
            .map_err(|e: ExtractionFailure| ProfileFailure(e.summary()))?;

        profile_from_value(value, source_url)
            .map_err(|e| ProfileFailure(compintel_core::redact_secrets(&e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Value {
        json!({
            "name": "Logi X200",
            "current_price": 29.99,
            "original_price": 39.99,
            "currency": "usd",
            "url": "https://www.shop-a.example/x200?ref=1",
            "availability": "In stock",
            "features": [" Bluetooth ", "", "USB-C"],
            "images": ["https://shop-a.example/x.jpg"]
        })
    }

    #[test]
    fn valid_profile_passes() {
        assert!(validate_profile(&valid()).is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let bad = json!({
            "name": "  ",
            "current_price": -1,
            "original_price": 0,
            "currency": "dollars",
            "url": "javascript:alert(1)",
            "images": ["not a url"]
        });
        let errors = validate_profile(&bad).unwrap_err();
        assert_eq!(errors.len(), 6, "{errors:?}");
    }

    #[test]
    fn missing_price_is_rejected() {
        let mut value = valid();
        value.as_object_mut().unwrap().remove("current_price");
        let errors = validate_profile(&value).unwrap_err();
        assert!(errors[0].contains("current_price"));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(validate_profile(&json!([1, 2])).is_err());
    }

    #[test]
    fn same_domain_url_is_kept() {
        let profile =
            profile_from_value(valid(), "https://shop-a.example/products/x200").unwrap();
        assert_eq!(profile.url, "https://www.shop-a.example/x200?ref=1");
        assert_eq!(profile.source_url, "https://shop-a.example/products/x200");
        assert_eq!(profile.currency.as_deref(), Some("USD"));
        assert_eq!(profile.features, vec!["Bluetooth", "USB-C"]);
        assert_eq!(profile.current_price, Some(Decimal::new(2999, 2)));
    }

    #[test]
    fn off_domain_url_is_replaced_with_source() {
        let mut value = valid();
        value["url"] = json!("https://affiliate.example/redirect?to=x200");
        let profile = profile_from_value(value, "https://shop-a.example/p/x200").unwrap();
        assert_eq!(profile.url, "https://shop-a.example/p/x200");
    }

    #[test]
    fn instructions_mention_subject_attributes() {
        let subject = Subject {
            id: "sku-1".to_string(),
            title: "Wireless Mouse X200".to_string(),
            category: Some("Peripherals".to_string()),
            brand: Some("Acme".to_string()),
        };
        let text = instructions_for(&subject);
        assert!(text.contains("\"Wireless Mouse X200\" by Acme (Peripherals)"));
    }
}
