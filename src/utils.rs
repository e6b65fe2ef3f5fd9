// Utility functions
use crate::model::ParserError;
use regex::Regex;

const SQFT_PER_SQM: f64 = 10.7639;

pub fn compile_regex(raw: &str) -> Result<Regex, ParserError> {
    Regex::new(raw).map_err(|e| ParserError::HtmlParseError(format!("regex `{}`: {}", raw, e)))
}

/// Reads prices and floor areas out of free text.
pub struct NumberParser {
    price_digits: Regex,
    area: Regex,
}

impl NumberParser {
    pub fn new() -> Result<Self, ParserError> {
        Ok(Self {
            price_digits: compile_regex(r"£?\s*(\d[\d,]*)")?,
            area: compile_regex(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(sq\.?\s*ft|sq\.?\s*m|m²)?")?,
        })
    }

    /// Strips the currency symbol and thousands separators: "£250,000" -> "250000".
    /// Returns `None` when the text carries no digits ("POA", "Offers invited").
    pub fn normalize_price(&self, text: &str) -> Option<String> {
        let caps = self.price_digits.captures(text)?;
        let digits = caps.get(1)?.as_str().replace(',', "");
        if digits.is_empty() { None } else { Some(digits) }
    }

    /// Parses a price string to a whole number of pounds.
    pub fn parse_price(&self, text: &str) -> Option<u64> {
        self.normalize_price(text)?.parse().ok()
    }

    /// Floor area in square feet from "1000sq. ft", "1,020 sq ft" or "95 m²".
    pub fn parse_area_sqft(&self, text: &str) -> Option<f64> {
        let caps = self.area.captures(text)?;
        let value: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
        let metric = caps
            .get(2)
            .map(|unit| !unit.as_str().to_lowercase().contains("ft"))
            .unwrap_or(false);
        let sqft = if metric { value * SQFT_PER_SQM } else { value };
        if sqft > 0.0 { Some(sqft) } else { None }
    }
}

/// Collapses runs of whitespace and trims.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns site-relative and protocol-relative links into absolute ones.
pub fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), href)
    } else {
        href.to_string()
    }
}

/// Lowercase slug as used by portal search paths: "Milton Keynes" -> "milton-keynes".
pub fn to_kebab_case(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Drops punctuation so "St. Albans," becomes "St Albans".
pub fn strip_punctuation(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    clean_text(&kept)
}

/// Formats an integer with thousands separators: 1234567 -> "1,234,567".
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_price() {
        let numbers = NumberParser::new().unwrap();
        assert_eq!(numbers.normalize_price("£250,000").as_deref(), Some("250000"));
        assert_eq!(numbers.normalize_price("Guide price £1,250,000").as_deref(), Some("1250000"));
        assert_eq!(numbers.normalize_price("POA"), None);
        assert_eq!(numbers.parse_price("£1,250"), Some(1250));
    }

    #[test]
    fn test_parse_area() {
        let numbers = NumberParser::new().unwrap();
        assert_eq!(numbers.parse_area_sqft("1000sq. ft"), Some(1000.0));
        assert_eq!(numbers.parse_area_sqft("1,020 sq ft"), Some(1020.0));
        let metric = numbers.parse_area_sqft("100 m²").unwrap();
        assert!((metric - 1076.39).abs() < 0.01);
        assert_eq!(numbers.parse_area_sqft("0 sq ft"), None);
        assert_eq!(numbers.parse_area_sqft("spacious"), None);
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        assert!(matches!(compile_regex(r"(\d+"), Err(ParserError::HtmlParseError(_))));
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("https://www.rightmove.co.uk", "/properties/1"),
            "https://www.rightmove.co.uk/properties/1"
        );
        assert_eq!(absolutize("https://x", "//media.example/a.jpg"), "https://media.example/a.jpg");
        assert_eq!(absolutize("https://x", "https://y/z"), "https://y/z");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(300), "300");
        assert_eq!(group_thousands(3000), "3,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_slug_helpers() {
        assert_eq!(to_kebab_case("  Milton Keynes "), "milton-keynes");
        assert_eq!(strip_punctuation("St. Albans,"), "St Albans");
    }
}
