//! Normalizer: raw extracted strings -> canonical [`PropertySchema`].

pub mod pearls;

pub use pearls::{normalize, NormalizerMaps};

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

static NUMERIC_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\d\s.,]+").expect("static regex"));
static AREA_WITH_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d\s.,]+)\s*m[²2]?").expect("static regex"));
static TYPOLOGY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[Tt](\d+)").expect("static regex"));

/// Parses a price string into `(amount, currency)`. Decides between the
/// European (`,` decimal) and thousands-separator (`.` decimal)
/// conventions heuristically, since the source markup gives no other hint.
pub fn parse_price(raw: &str, currency_map: &HashMap<String, String>) -> Option<(Decimal, String)> {
    let digits_run = NUMERIC_RUN.find(raw)?.as_str().trim();
    let amount = parse_numeric_run(digits_run)?;
    let currency = resolve_currency(raw, currency_map);
    Some((amount, currency))
}

fn parse_numeric_run(run: &str) -> Option<Decimal> {
    let has_dot = run.contains('.');
    let has_comma = run.contains(',');

    let normalized = if has_dot && has_comma {
        // '.' is the thousands separator, ',' is the decimal point.
        run.replace('.', "").replace(',', ".")
    } else if has_comma {
        let after_last_comma = run.rsplit(',').next().unwrap_or("");
        if after_last_comma.len() == 2 && after_last_comma.chars().all(|c| c.is_ascii_digit()) {
            run.replace(',', ".")
        } else {
            run.replace(',', "")
        }
    } else if has_dot {
        let groups: Vec<&str> = run.split('.').collect();
        let all_thousands = groups.len() > 1 && groups[1..].iter().all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()));
        if all_thousands {
            run.replace('.', "")
        } else {
            run.to_string()
        }
    } else {
        run.to_string()
    };

    let cleaned: String = normalized.chars().filter(|c| !c.is_whitespace()).collect();
    Decimal::from_str(&cleaned).ok()
}

fn resolve_currency(raw: &str, currency_map: &HashMap<String, String>) -> String {
    let lower = raw.to_lowercase();
    for (symbol, code) in currency_map {
        if raw.contains(symbol.as_str()) || lower.contains(symbol.as_str()) {
            return code.clone();
        }
    }
    "EUR".to_string()
}

/// Parses an area string, preferring the `m²`/`m2`-suffixed run;
/// commas are always the decimal point here (areas are never
/// thousands-separated in source markup).
pub fn parse_area(raw: &str) -> Option<f64> {
    let digits = if let Some(caps) = AREA_WITH_UNIT.captures(raw) {
        caps.get(1)?.as_str().trim().to_string()
    } else {
        NUMERIC_RUN.find(raw)?.as_str().trim().to_string()
    };
    let normalized: String = digits.chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = normalized.replace(',', ".");
    // A lone '.' thousands-style group would be wrong here, but areas are
    // never thousands-separated, so a direct parse is sufficient.
    normalized.parse::<f64>().ok()
}

pub fn parse_int(raw: &str) -> Option<i32> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// `None` means "no recognizable value", not "false" — absence of a
/// signal is not evidence of a negative.
pub fn parse_bool(raw: &str) -> Option<bool> {
    let normalized = raw.trim().to_lowercase();
    match normalized.as_str() {
        "yes" | "sim" | "true" | "1" | "✓" | "✔" => Some(true),
        "no" | "não" | "nao" | "false" | "0" => Some(false),
        _ => None,
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
];

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&dt));
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

/// `"T3"` -> `Some(3)`.
pub fn typology_to_bedrooms(typology: &str) -> Option<i32> {
    TYPOLOGY.captures(typology)?.get(1)?.as_str().parse().ok()
}

/// `price / area`, rounded to 2 decimals, only when both are present and
/// `area > 0`.
pub fn calculate_price_per_m2(price: Decimal, area: f64) -> Option<Decimal> {
    if area <= 0.0 {
        return None;
    }
    let area_decimal = Decimal::try_from(area).ok()?;
    if area_decimal.is_zero() {
        return None;
    }
    Some((price / area_decimal).round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eur_map() -> HashMap<String, String> {
        crate::config_cache::default_currency_map()
    }

    #[test]
    fn parses_european_thousands_with_decimal_comma() {
        let (amount, currency) = parse_price("250.000,50 €", &eur_map()).unwrap();
        assert_eq!(amount, Decimal::from_str("250000.50").unwrap());
        assert_eq!(currency, "EUR");
    }

    #[test]
    fn comma_only_two_digits_is_decimal() {
        let (amount, _) = parse_price("1234,50", &eur_map()).unwrap();
        assert_eq!(amount, Decimal::from_str("1234.50").unwrap());
    }

    #[test]
    fn comma_only_non_two_digits_is_thousands() {
        let (amount, _) = parse_price("1,234", &eur_map()).unwrap();
        assert_eq!(amount, Decimal::from_str("1234").unwrap());
    }

    #[test]
    fn dot_only_all_three_digit_groups_is_thousands() {
        let (amount, _) = parse_price("1.234.567", &eur_map()).unwrap();
        assert_eq!(amount, Decimal::from_str("1234567").unwrap());
    }

    #[test]
    fn dot_only_non_three_digit_group_is_decimal() {
        let (amount, _) = parse_price("1234.5", &eur_map()).unwrap();
        assert_eq!(amount, Decimal::from_str("1234.5").unwrap());
    }

    #[test]
    fn parses_area_with_m2_suffix() {
        assert_eq!(parse_area("85,5 m²"), Some(85.5));
        assert_eq!(parse_area("120 m2"), Some(120.0));
    }

    #[test]
    fn parses_bare_numeric_area_without_unit() {
        assert_eq!(parse_area("64"), Some(64.0));
    }

    #[test]
    fn parse_bool_distinguishes_absent_from_false() {
        assert_eq!(parse_bool("Sim"), Some(true));
        assert_eq!(parse_bool("Não"), Some(false));
        assert_eq!(parse_bool("n/a"), None);
    }

    #[test]
    fn typology_extracts_bedroom_count() {
        assert_eq!(typology_to_bedrooms("T3"), Some(3));
        assert_eq!(typology_to_bedrooms("Duplex T0+1"), Some(0));
    }

    #[test]
    fn price_per_m2_requires_positive_area() {
        let price = Decimal::from_str("200000").unwrap();
        assert_eq!(calculate_price_per_m2(price, 100.0), Some(Decimal::from_str("2000").unwrap()));
        assert_eq!(calculate_price_per_m2(price, 0.0), None);
    }

    #[test]
    fn parse_date_tries_known_formats() {
        assert!(parse_date("2024-05-01").is_some());
        assert!(parse_date("01/05/2024").is_some());
        assert!(parse_date("not a date").is_none());
    }

    proptest! {
        /// Any bare positive integer with a currency suffix round-trips to
        /// itself: no thousands/decimal ambiguity arises without a '.' or ','.
        #[test]
        fn bare_integer_with_currency_suffix_roundtrips(n in 1i64..1_000_000_000) {
            let raw = format!("{n} €");
            let (amount, currency) = parse_price(&raw, &eur_map()).unwrap();
            prop_assert_eq!(amount, Decimal::from(n));
            prop_assert_eq!(currency, "EUR");
        }

        /// A `whole,frac` price with a two-digit fractional part is always
        /// read as decimal cents, regardless of the whole part's magnitude.
        #[test]
        fn comma_two_digit_fraction_is_always_decimal(whole in 1i64..1_000_000, frac in 0u8..100) {
            let raw = format!("{whole},{frac:02}");
            let (amount, _) = parse_price(&raw, &eur_map()).unwrap();
            let expected = Decimal::from_str(&format!("{whole}.{frac:02}")).unwrap();
            prop_assert_eq!(amount, expected);
        }

        /// An `m²`-suffixed area string parses to the same value regardless
        /// of surrounding whitespace, and always prefers the suffixed run
        /// over any other digits earlier in the string.
        #[test]
        fn m2_suffixed_area_ignores_leading_noise(prefix_digits in 1i64..9999, whole in 1i64..10_000, frac in 0u8..100) {
            let raw = format!("ref {prefix_digits} - {whole},{frac:02} m²");
            let parsed = parse_area(&raw).unwrap();
            let expected = format!("{whole}.{frac:02}").parse::<f64>().unwrap();
            prop_assert!((parsed - expected).abs() < 1e-9);
        }

        /// `parse_int` extracts only the digit characters, ignoring any
        /// non-digit noise surrounding them, and never panics.
        #[test]
        fn parse_int_extracts_digits_from_noisy_input(n in 0u32..1_000_000) {
            let raw = format!(" ref-{n} rooms ");
            prop_assert_eq!(parse_int(&raw), Some(n as i32));
        }
    }
}
