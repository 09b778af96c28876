//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(default)]
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

    /// Create a USD price from an amount in dollars.
    #[must_use]
    pub const fn usd(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::USD)
    }

    /// A zero price in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Multiply by an item count, keeping the currency.
    ///
    /// Saturates at [`Decimal::MAX`].
    #[must_use]
    pub fn times(self, count: u32) -> Self {
        Self::new(
            self.amount.saturating_mul(Decimal::from(count)),
            self.currency_code,
        )
    }

    /// Add another amount in the same currency, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self::new(self.amount.saturating_add(other.amount), self.currency_code)
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!(
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
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

impl CurrencyCode {
    /// Currency symbol used for display.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_cents() {
        let price = Price::usd(Decimal::new(35, 1));
        assert_eq!(price.display(), "$3.50");
    }

    #[test]
    fn test_times() {
        let price = Price::new(Decimal::new(250, 2), CurrencyCode::GBP);
        let total = price.times(3);
        assert_eq!(total.amount, Decimal::new(750, 2));
        assert_eq!(total.currency_code, CurrencyCode::GBP);
        assert_eq!(total.display(), "£7.50");
    }

    #[test]
    fn test_times_saturates_instead_of_overflowing() {
        let price = Price::usd(Decimal::MAX);
        assert_eq!(price.times(u32::MAX).amount, Decimal::MAX);
        assert_eq!(price.times(1).amount, Decimal::MAX);
    }

    #[test]
    fn test_saturating_add() {
        let big = Price::usd(Decimal::MAX);
        assert_eq!(big.saturating_add(big).amount, Decimal::MAX);
        assert_eq!(
            Price::usd(Decimal::new(150, 2))
                .saturating_add(Price::usd(Decimal::new(25, 2)))
                .display(),
            "$1.75"
        );
    }
}
