//! Aggregate statistics and findings over a normalized competitor set.

use std::collections::HashMap;

use compintel_core::{CompetitorProfile, ConversionStatus, ReportSummary};
use rust_decimal::{Decimal, RoundingStrategy};

const MAX_COMMON_FEATURES: usize = 10;

pub const NO_DATA_FINDING: &str = "No competitor data found.";

/// Prices that count toward statistics: converted or same-currency, and
/// positive.
fn usable_price(profile: &CompetitorProfile) -> Option<Decimal> {
    if profile.conversion_status == Some(ConversionStatus::Failed) {
        return None;
    }
    profile.converted_price.filter(|p| *p > Decimal::ZERO)
}

/// Feature strings shared by at least two profiles, most frequent first.
/// Equal counts keep first-seen order.
#[must_use]
pub fn common_features(profiles: &[CompetitorProfile]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for profile in profiles {
        let mut seen_here: Vec<String> = Vec::new();
        for feature in &profile.features {
            let normalized = feature.trim().to_lowercase();
            if normalized.is_empty() || seen_here.contains(&normalized) {
                continue;
            }
            seen_here.push(normalized.clone());
            let count = counts.entry(normalized.clone()).or_insert(0);
            if *count == 0 {
                order.push(normalized);
            }
            *count += 1;
        }
    }

    let count_of = |f: &String| counts.get(f).copied().unwrap_or(0);
    let mut shared: Vec<String> = order.into_iter().filter(|f| count_of(f) >= 2).collect();
    // stable sort keeps first-seen order within equal counts
    shared.sort_by_key(|f| std::cmp::Reverse(count_of(f)));
    shared.truncate(MAX_COMMON_FEATURES);
    shared
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}

/// Builds the summary for `profiles`, which must already be normalized into
/// `store_currency`.
#[must_use]
pub fn summarize(profiles: &[CompetitorProfile], store_currency: &str) -> ReportSummary {
    let prices: Vec<Decimal> = profiles.iter().filter_map(usable_price).collect();
    let lowest = prices.iter().min().copied();
    let highest = prices.iter().max().copied();
    let avg = if prices.is_empty() {
        None
    } else {
        let total: Decimal = prices.iter().sum();
        Some(
            (total / Decimal::from(prices.len()))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    };

    let failed_conversions = profiles
        .iter()
        .filter(|p| p.conversion_status == Some(ConversionStatus::Failed))
        .count();

    let mut findings = Vec::new();
    if profiles.is_empty() {
        findings.push(NO_DATA_FINDING.to_string());
    } else {
        match (lowest, highest) {
            (Some(lo), Some(hi)) if lo == hi => findings.push(format!(
                "Competitor price is {lo:.2} {store_currency} across {}.",
                plural(prices.len(), "listing", "listings")
            )),
            (Some(lo), Some(hi)) => findings.push(format!(
                "Competitor prices range from {lo:.2} to {hi:.2} {store_currency} across {}.",
                plural(prices.len(), "listing", "listings")
            )),
            _ => findings.push("No competitor listing had a usable price.".to_string()),
        }
        if failed_conversions > 0 {
            findings.push(format!(
                "{} could not be converted to {store_currency} and {} excluded from price statistics.",
                plural(failed_conversions, "price", "prices"),
                if failed_conversions == 1 { "is" } else { "are" }
            ));
        }
        let discounted = profiles.iter().filter(|p| p.is_discounted()).count();
        if discounted > 0 {
            findings.push(format!(
                "{} currently discounted.",
                plural(discounted, "listing is", "listings are")
            ));
        }
        let out_of_stock = profiles.iter().filter(|p| p.is_out_of_stock()).count();
        if out_of_stock > 0 {
            findings.push(format!(
                "{} out of stock.",
                plural(out_of_stock, "listing is", "listings are")
            ));
        }
        let with_variations = profiles.iter().filter(|p| !p.variations.is_empty()).count();
        if with_variations > 0 {
            findings.push(format!(
                "{} multiple variations.",
                plural(with_variations, "listing offers", "listings offer")
            ));
        }
    }

    ReportSummary {
        total_competitors: profiles.len(),
        store_currency: store_currency.to_string(),
        lowest_price: lowest,
        highest_price: highest,
        avg_price: avg,
        priced_competitors: prices.len(),
        failed_conversions,
        common_features: common_features(profiles),
        key_findings: findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compintel_core::Variation;

    fn profile(price: i64, status: ConversionStatus, features: &[&str]) -> CompetitorProfile {
        let mut p = CompetitorProfile::new("Mouse", "https://shop.example/m");
        p.current_price = Some(Decimal::new(price, 0));
        p.converted_price = Some(Decimal::new(price, 0));
        p.conversion_status = Some(status);
        p.features = features.iter().map(|f| (*f).to_string()).collect();
        p
    }

    #[test]
    fn empty_set_has_single_no_data_finding() {
        let summary = summarize(&[], "USD");
        assert_eq!(summary.total_competitors, 0);
        assert_eq!(summary.key_findings, vec![NO_DATA_FINDING.to_string()]);
        assert!(summary.avg_price.is_none());
    }

    #[test]
    fn failed_conversions_are_excluded_from_stats() {
        let profiles = vec![
            profile(20, ConversionStatus::SameCurrency, &[]),
            profile(40, ConversionStatus::Converted, &[]),
            profile(5000, ConversionStatus::Failed, &[]),
        ];
        let summary = summarize(&profiles, "USD");
        assert_eq!(summary.total_competitors, 3);
        assert_eq!(summary.priced_competitors, 2);
        assert_eq!(summary.failed_conversions, 1);
        assert_eq!(summary.lowest_price, Some(Decimal::new(20, 0)));
        assert_eq!(summary.highest_price, Some(Decimal::new(40, 0)));
        assert_eq!(summary.avg_price, Some(Decimal::new(3000, 2)));
        assert!(summary
            .key_findings
            .iter()
            .any(|f| f.starts_with("1 price could not be converted")));
    }

    #[test]
    fn average_rounds_to_cents() {
        let profiles = vec![
            profile(10, ConversionStatus::SameCurrency, &[]),
            profile(10, ConversionStatus::SameCurrency, &[]),
            profile(11, ConversionStatus::SameCurrency, &[]),
        ];
        assert_eq!(
            summarize(&profiles, "USD").avg_price,
            Some(Decimal::new(1033, 2))
        );
    }

    #[test]
    fn common_features_need_two_profiles_and_sort_by_count() {
        let profiles = vec![
            profile(1, ConversionStatus::SameCurrency, &["Wireless", "USB-C", "usb-c"]),
            profile(1, ConversionStatus::SameCurrency, &[" wireless ", "Silent clicks"]),
            profile(1, ConversionStatus::SameCurrency, &["silent clicks", "Wireless"]),
            profile(1, ConversionStatus::SameCurrency, &["Bluetooth"]),
        ];
        assert_eq!(
            common_features(&profiles),
            vec!["wireless".to_string(), "silent clicks".to_string()]
        );
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let profiles = vec![
            profile(1, ConversionStatus::SameCurrency, &["b", "a"]),
            profile(1, ConversionStatus::SameCurrency, &["a", "b"]),
        ];
        assert_eq!(common_features(&profiles), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn findings_cover_discounts_stock_and_variations() {
        let mut discounted = profile(30, ConversionStatus::SameCurrency, &[]);
        discounted.original_price = Some(Decimal::new(40, 0));
        let mut sold_out = profile(25, ConversionStatus::SameCurrency, &[]);
        sold_out.availability = Some("Out of stock".to_string());
        sold_out.variations = vec![Variation {
            kind: "color".to_string(),
            value: "black".to_string(),
            price: None,
            availability: None,
        }];

        let findings = summarize(&[discounted, sold_out], "USD").key_findings;
        assert_eq!(
            findings,
            vec![
                "Competitor prices range from 25.00 to 30.00 USD across 2 listings.".to_string(),
                "1 listing is currently discounted.".to_string(),
                "1 listing is out of stock.".to_string(),
                "1 listing offers multiple variations.".to_string(),
            ]
        );
    }

    #[test]
    fn unpriced_set_says_so() {
        let mut p = profile(0, ConversionStatus::SameCurrency, &[]);
        p.converted_price = None;
        let summary = summarize(&[p], "USD");
        assert_eq!(summary.priced_competitors, 0);
        assert_eq!(
            summary.key_findings,
            vec!["No competitor listing had a usable price.".to_string()]
        );
    }
}
