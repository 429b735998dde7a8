use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Strips the localized price labels and currency decoration from a quote
/// card and normalizes the Italian number format.
/// Examples: "Prezzo Scontato\n1.234,56 €" -> "1234.56", "890,00 €" -> "890.00"
pub fn normalize_price_text(text: &str) -> String {
    // The label regexes are static patterns, compile cannot fail.
    let labels = Regex::new(r"(?i)Prezzo\s+(Scontato|ufficiale)\s*").unwrap();
    let cleaned = labels.replace_all(text, "");

    cleaned
        .replace('.', "")
        .replace(',', ".")
        .replace('€', "")
        .trim()
        .to_string()
}

pub fn parse_eur_price(text: &str) -> Result<Decimal, String> {
    if text.trim().is_empty() {
        return Err("empty price text".to_string());
    }

    let normalized = normalize_price_text(text);

    Decimal::from_str(&normalized)
        .map_err(|e| format!("price could not be parsed from '{}': {}", text, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_italian_format() {
        assert_eq!(parse_eur_price("1.234,56 €").unwrap(), dec("1234.56"));
        assert_eq!(parse_eur_price("890,00 €").unwrap(), dec("890.00"));
        assert_eq!(parse_eur_price("12.345,00 €").unwrap(), dec("12345.00"));
    }

    #[test]
    fn test_parse_strips_labels() {
        assert_eq!(
            parse_eur_price("Prezzo Scontato\n1.234,56 €").unwrap(),
            dec("1234.56")
        );
        assert_eq!(
            parse_eur_price("Prezzo ufficiale 456,78 €").unwrap(),
            dec("456.78")
        );
    }

    #[test]
    fn test_parse_plain_number() {
        assert_eq!(parse_eur_price("456,78").unwrap(), dec("456.78"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_eur_price("").is_err());
        assert!(parse_eur_price("gratis").is_err());
    }
}
