//! Competitor profiles and the finalized report summary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a profile's price was brought into the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    Converted,
    SameCurrency,
    Failed,
}

/// One purchasable variation of a competitor listing (size, colour, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub availability: Option<String>,
}

/// Attributes extracted for one external competitor listing.
///
/// The `converted_*`, `store_currency` and `conversion_status` fields are
/// empty until the report is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub name: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub current_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    pub url: String,
    /// The URL the content was extracted from; the key for idempotent analysis.
    pub source_url: String,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub shipping_info: Option<String>,
    #[serde(default)]
    pub seller_name: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub converted_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub converted_original_price: Option<Decimal>,
    #[serde(default)]
    pub store_currency: Option<String>,
    #[serde(default)]
    pub conversion_status: Option<ConversionStatus>,
}

impl CompetitorProfile {
    /// A profile with only the identifying fields populated.
    #[must_use]
    pub fn new(name: &str, source_url: &str) -> Self {
        Self {
            name: name.to_string(),
            current_price: None,
            original_price: None,
            currency: None,
            url: source_url.to_string(),
            source_url: source_url.to_string(),
            availability: None,
            shipping_info: None,
            seller_name: None,
            rating: None,
            variations: Vec::new(),
            features: Vec::new(),
            images: Vec::new(),
            converted_price: None,
            converted_original_price: None,
            store_currency: None,
            conversion_status: None,
        }
    }

    /// `true` when a strike-through price is present.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        self.original_price.is_some()
    }

    /// `true` when the availability text mentions "out" in any case.
    #[must_use]
    pub fn is_out_of_stock(&self) -> bool {
        self.availability
            .as_deref()
            .is_some_and(|a| a.to_lowercase().contains("out"))
    }
}

/// Aggregates over a finalized competitor set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_competitors: usize,
    pub store_currency: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub lowest_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub highest_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub avg_price: Option<Decimal>,
    /// Profiles that contributed to the price statistics.
    pub priced_competitors: usize,
    pub failed_conversions: usize,
    pub common_features: Vec<String>,
    pub key_findings: Vec<String>,
}

/// Persisted outcome of a completed report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub competitors: Vec<CompetitorProfile>,
    pub summary: ReportSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_stock_matches_case_insensitively() {
        let mut profile = CompetitorProfile::new("Mouse", "https://shop.example/m");
        profile.availability = Some("Currently OUT of stock".to_string());
        assert!(profile.is_out_of_stock());
        profile.availability = Some("In stock".to_string());
        assert!(!profile.is_out_of_stock());
        profile.availability = None;
        assert!(!profile.is_out_of_stock());
    }

    #[test]
    fn prices_serialize_as_json_numbers() {
        let mut profile = CompetitorProfile::new("Mouse", "https://shop.example/m");
        profile.current_price = Some(Decimal::new(2999, 2));
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json["current_price"].is_number(), "got {json}");
        assert!(json["original_price"].is_null());
    }

    #[test]
    fn profile_deserializes_with_missing_optional_fields() {
        let profile: CompetitorProfile = serde_json::from_value(serde_json::json!({
            "name": "Mouse",
            "current_price": 19.5,
            "url": "https://shop.example/m",
            "source_url": "https://shop.example/m",
            "variations": [{"type": "color", "value": "black"}]
        }))
        .unwrap();
        assert_eq!(profile.current_price, Some(Decimal::new(195, 1)));
        assert_eq!(profile.variations[0].kind, "color");
        assert!(profile.conversion_status.is_none());
    }
}
