use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Pure price-text parsing, isolated from the scraping code.
///
/// Supported formats: `$99.99`, `€89,99`, `1,234.56`, `1.234,56`, `99.99 USD`.
/// The core only ever consumes the resulting decimal; the raw text is kept on
/// the observation for diagnostics.
pub struct PriceParser {
    strip_regex: Regex,
    currency_symbols: Vec<(&'static str, &'static str)>,
}

impl Default for PriceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceParser {
    pub fn new() -> Self {
        // Longer symbols first so "US$" wins over "$"
        let currency_symbols = vec![
            ("US$", "USD"),
            ("USD$", "USD"),
            ("A$", "AUD"),
            ("C$", "CAD"),
            ("$", "USD"),
            ("£", "GBP"),
            ("€", "EUR"),
            ("¥", "JPY"),
            ("₹", "INR"),
        ];

        PriceParser {
            strip_regex: Regex::new(r"[^\d.,]").expect("static regex"),
            currency_symbols,
        }
    }

    /// Extract a numeric price from raw text, or none if unparseable.
    pub fn parse(&self, text: &str) -> Option<Decimal> {
        let cleaned = self.strip_regex.replace_all(text.trim(), "").to_string();
        if cleaned.is_empty() {
            return None;
        }

        let normalized = Self::normalize_separators(&cleaned)?;
        Decimal::from_str(&normalized).ok()
    }

    /// Map an explicit currency symbol in the text to an ISO code, falling
    /// back to the supplied default.
    pub fn currency(&self, text: &str, default_currency: &str) -> String {
        for (symbol, code) in &self.currency_symbols {
            if text.contains(symbol) {
                return (*code).to_string();
            }
        }
        default_currency.to_string()
    }

    /// Resolve thousands separators vs decimal commas.
    fn normalize_separators(cleaned: &str) -> Option<String> {
        let has_comma = cleaned.contains(',');
        let has_dot = cleaned.contains('.');

        let normalized = if has_comma && has_dot {
            let last_comma = cleaned.rfind(',')?;
            let last_dot = cleaned.rfind('.')?;
            if last_comma > last_dot {
                // European: 1.234,56
                cleaned.replace('.', "").replace(',', ".")
            } else {
                // US: 1,234.56
                cleaned.replace(',', "")
            }
        } else if has_comma {
            let parts: Vec<&str> = cleaned.split(',').collect();
            if parts.len() == 2 && parts[1].len() == 2 {
                // Likely European decimal: 99,99
                cleaned.replace(',', ".")
            } else {
                // Likely US thousands: 1,234
                cleaned.replace(',', "")
            }
        } else {
            cleaned.to_string()
        };

        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[rstest]
    #[case("$99.99", "99.99")]
    #[case("€89,99", "89.99")]
    #[case("99.99 USD", "99.99")]
    #[case("$1,234.56", "1234.56")]
    #[case("1.234,56", "1234.56")]
    #[case("1,234", "1234")]
    #[case("  £45.00  ", "45.00")]
    #[case("¥1200", "1200")]
    #[case("Price: $19.99", "19.99")]
    fn test_parse_supported_formats(#[case] raw: &str, #[case] expected: &str) {
        let parser = PriceParser::new();
        assert_eq!(parser.parse(raw), Some(dec(expected)));
    }

    #[rstest]
    #[case("")]
    #[case("not a price")]
    #[case("Call for price")]
    #[case("$")]
    fn test_parse_failures(#[case] raw: &str) {
        let parser = PriceParser::new();
        assert_eq!(parser.parse(raw), None);
    }

    #[test]
    fn test_zero_price_parses() {
        // A valid zero price must be distinguishable from a parse failure
        let parser = PriceParser::new();
        assert_eq!(parser.parse("$0.00"), Some(dec("0.00")));
    }

    #[test]
    fn test_currency_extraction() {
        let parser = PriceParser::new();
        assert_eq!(parser.currency("$19.99", "USD"), "USD");
        assert_eq!(parser.currency("€50.00", "USD"), "EUR");
        assert_eq!(parser.currency("£9.99", "USD"), "GBP");
        assert_eq!(parser.currency("19.99", "AUD"), "AUD");
    }

    #[test]
    fn test_currency_longest_symbol_wins() {
        let parser = PriceParser::new();
        assert_eq!(parser.currency("US$25.99", "EUR"), "USD");
        assert_eq!(parser.currency("A$25.99", "USD"), "AUD");
    }
}
