//! Country and currency resolution.
//!
//! Providers identify an event's region inconsistently: some send a
//! currency code in the `country` field, some send a country code and no
//! currency, some send both. Resolution is driven by one declarative table.

/// Currency used when nothing resolves.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Country code used when no region can be reconstructed.
pub const UNKNOWN_REGION: &str = "GL";

/// Country code to currency code.
const REGIONS: &[(&str, &str)] = &[
    ("US", "USD"),
    ("EU", "EUR"),
    ("GB", "GBP"),
    ("JP", "JPY"),
    ("AU", "AUD"),
    ("CA", "CAD"),
    ("CH", "CHF"),
    ("CN", "CNY"),
    ("NZ", "NZD"),
    ("RU", "RUB"),
    ("BR", "BRL"),
    ("IN", "INR"),
    ("KR", "KRW"),
    ("MX", "MXN"),
    ("ZA", "ZAR"),
    ("SE", "SEK"),
    ("NO", "NOK"),
    ("DK", "DKK"),
    ("TR", "TRY"),
    ("PL", "PLN"),
];

/// Resolved region of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Two-letter country code or [`UNKNOWN_REGION`].
    pub country: String,
    /// Three-letter currency code.
    pub currency: String,
}

/// Currency for a two-letter country code.
#[must_use]
pub fn currency_for_country(country: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(country))
        .map(|(_, currency)| *currency)
}

/// Country code for a three-letter currency code.
#[must_use]
pub fn country_for_currency(currency: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(_, code)| code.eq_ignore_ascii_case(currency))
        .map(|(country, _)| *country)
}

fn as_code(value: Option<&str>, len: usize) -> Option<String> {
    let value = value?.trim();
    (value.len() == len && value.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| value.to_ascii_uppercase())
}

/// Resolve country and currency from raw provider fields.
///
/// Currency: explicit 3-letter currency, else a 3-letter code in the
/// country field, else the table lookup of a 2-letter country, else USD.
/// Country: explicit 2-letter code, else reverse lookup of the currency,
/// else [`UNKNOWN_REGION`].
#[must_use]
pub fn resolve(country: Option<&str>, currency: Option<&str>) -> Region {
    let country_code = as_code(country, 2);
    let currency_in_country = as_code(country, 3);

    let currency = as_code(currency, 3)
        .or(currency_in_country)
        .or_else(|| {
            country_code
                .as_deref()
                .and_then(currency_for_country)
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let country = country_code
        .or_else(|| country_for_currency(&currency).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_REGION.to_string());

    Region { country, currency }
}
