use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const NO_TITLE: &str = "No title";
pub const NO_URL: &str = "No URL";
pub const NO_DETAILS: &str = "No details";

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid regex");
}

/// Records are deduplicated by a natural key within one writer.
pub trait Keyed {
    fn natural_key(&self) -> &str;
}

/// Listing candidate as the extractor saw it, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// Detail page fields as the extractor saw them, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetail {
    pub title: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRecord {
    pub title: String,
    pub price: f64,
    pub rating: f64,
    pub review_count: u64,
    pub details: String,
}

impl SearchRecord {
    pub fn validate(raw: RawListing) -> Self {
        Self {
            title: text_or(raw.title.as_deref(), NO_TITLE),
            url: text_or(raw.url.as_deref(), NO_URL),
        }
    }
}

impl DetailRecord {
    pub fn validate(raw: RawDetail) -> Self {
        Self {
            title: text_or(raw.title.as_deref(), NO_TITLE),
            price: parse_price(raw.price.as_deref().unwrap_or_default()),
            rating: parse_rating(raw.rating.as_deref().unwrap_or_default()),
            review_count: parse_review_count(raw.review_count.as_deref().unwrap_or_default()),
            details: text_or(raw.details.as_deref(), NO_DETAILS),
        }
    }
}

impl Keyed for SearchRecord {
    fn natural_key(&self) -> &str { &self.title }
}

impl Keyed for DetailRecord {
    fn natural_key(&self) -> &str { &self.title }
}

fn text_or(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

fn first_number(text: &str) -> Option<f64> {
    let m = NUMBER.find(text)?;
    m.as_str().replace(',', "").parse::<f64>().ok()
}

/// First decimal number in the text, thousands separators dropped. `"$1,299.00"` -> 1299.0.
pub fn parse_price(text: &str) -> f64 {
    first_number(text).filter(|p| p.is_finite()).unwrap_or(0.0)
}

/// `"4.5 out of 5 stars"` -> 4.5.
pub fn parse_rating(text: &str) -> f64 {
    first_number(text).filter(|r| r.is_finite()).unwrap_or(0.0)
}

/// Digits of the second-to-last whitespace token: `"(123 reviews)"` -> 123.
pub fn parse_review_count(text: &str) -> u64 {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let token = match tokens.len() {
        0 => return 0,
        1 => tokens[0],
        n => tokens[n - 2],
    };
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}
