use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered conversion corridor: source currency -> target currency.
///
/// Codes are normalized to uppercase at construction. The caller layer owns
/// the source != target rule, so the pair itself does not enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    from: String,
    to: String,
}

impl CurrencyPair {
    /// Build a pair from raw codes, rejecting anything that is not exactly
    /// three ASCII letters.
    pub fn new(from: &str, to: &str) -> Option<Self> {
        let from = normalize_code(from)?;
        let to = normalize_code(to)?;
        Some(Self { from, to })
    }

    pub fn from_code(&self) -> &str {
        &self.from
    }

    pub fn to_code(&self) -> &str {
        &self.to
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_normalizes_case() {
        let pair = CurrencyPair::new("eur", "Usd").unwrap();
        assert_eq!(pair.from_code(), "EUR");
        assert_eq!(pair.to_code(), "USD");
        assert_eq!(pair.to_string(), "EUR/USD");
    }

    #[test]
    fn test_pair_rejects_bad_codes() {
        assert!(CurrencyPair::new("EURO", "USD").is_none());
        assert!(CurrencyPair::new("EU", "USD").is_none());
        assert!(CurrencyPair::new("EUR", "US1").is_none());
        assert!(CurrencyPair::new("", "USD").is_none());
    }

    #[test]
    fn test_pair_trims_whitespace() {
        let pair = CurrencyPair::new(" gbp ", "inr").unwrap();
        assert_eq!(pair.to_string(), "GBP/INR");
    }

    #[test]
    fn test_same_currency_is_allowed_here() {
        // The comparison layer rejects from == to before calling us.
        assert!(CurrencyPair::new("EUR", "EUR").is_some());
    }
}
