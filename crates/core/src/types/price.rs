//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored as [`rust_decimal::Decimal`] in the currency's standard
//! unit. All comparisons (notably the validator's price-tolerance check) are
//! decimal arithmetic - never floats.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A unit-price snapshot with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Absolute difference between two prices in the same currency.
    ///
    /// Returns `None` when the currencies differ; callers must treat a
    /// currency switch as a material change rather than a numeric delta.
    #[must_use]
    pub fn abs_delta(&self, other: &Self) -> Option<Decimal> {
        (self.currency_code == other.currency_code).then(|| (self.amount - other.amount).abs())
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} {:?}", self.amount, self.currency_code)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(cents: i64) -> Price {
        Price::new(Decimal::new(cents, 2), CurrencyCode::USD)
    }

    #[test]
    fn test_abs_delta_same_currency() {
        let old = usd(19_99);
        let new = usd(17_49);
        assert_eq!(old.abs_delta(&new), Some(Decimal::new(2_50, 2)));
        assert_eq!(new.abs_delta(&old), Some(Decimal::new(2_50, 2)));
    }

    #[test]
    fn test_abs_delta_currency_mismatch() {
        let dollars = usd(10_00);
        let euros = Price::new(Decimal::new(10_00, 2), CurrencyCode::EUR);
        assert_eq!(dollars.abs_delta(&euros), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(usd(19_99).to_string(), "19.99 USD");
    }
}
