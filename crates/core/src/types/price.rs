//! Type-safe price representation using decimal arithmetic.
//!
//! Amounts are stored as `NUMERIC(10,2)` and handled as [`Decimal`] so that
//! cart, order, and refund totals never accumulate floating-point error.
//! Conversion to the payment provider's integer minor units happens only at
//! the API boundary via [`Price::to_minor_units`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors converting between decimal amounts and minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The amount does not fit in an `i64` number of cents.
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
    /// Negative amounts cannot be charged or refunded.
    #[error("amount {0} must not be negative")]
    Negative(Decimal),
}

/// A price with currency information.
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

    /// Create a price from an integer amount of minor units (cents).
    #[must_use]
    pub fn from_minor_units(cents: i64, currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(cents, 2),
            currency_code,
        }
    }

    /// Amount in minor units, rounded half away from zero to two decimals.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative amounts and
    /// [`PriceError::OutOfRange`] if the result overflows `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative(self.amount));
        }
        let cents = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            * Decimal::ONE_HUNDRED;
        cents.to_i64().ok_or(PriceError::OutOfRange(self.amount))
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

/// Currencies accepted by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "marketplace.currency_code"))]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
}

str_enum!(CurrencyCode, "currency", {
    USD => "USD",
    EUR => "EUR",
});

impl CurrencyCode {
    /// Currency symbol used in display strings.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD => "$",
            Self::EUR => "€",
        }
    }

    /// Lower-case code as expected by Stripe.
    #[must_use]
    pub const fn stripe_code(&self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_to_minor_units_rounds_half_away_from_zero() {
        let price = Price::new(dec("49.995"), CurrencyCode::USD);
        assert_eq!(price.to_minor_units().unwrap(), 5000);

        let price = Price::new(dec("120.00"), CurrencyCode::EUR);
        assert_eq!(price.to_minor_units().unwrap(), 12_000);
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        let price = Price::new(dec("-1.00"), CurrencyCode::USD);
        assert!(matches!(price.to_minor_units(), Err(PriceError::Negative(_))));
    }

    #[test]
    fn test_from_minor_units() {
        let price = Price::from_minor_units(2599, CurrencyCode::USD);
        assert_eq!(price.amount, dec("25.99"));
    }

    #[test]
    fn test_display_and_codes() {
        assert_eq!(Price::new(dec("5"), CurrencyCode::EUR).display(), "€5.00");
        assert_eq!(CurrencyCode::USD.stripe_code(), "usd");
        assert_eq!("EUR".parse::<CurrencyCode>().unwrap(), CurrencyCode::EUR);
        assert!("GBP".parse::<CurrencyCode>().is_err());
    }
}
