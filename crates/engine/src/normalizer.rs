//! Currency normalization.
//!
//! Converts an `(original_amount, currency, exchange_rate)` triple into the
//! canonical amount of a trip, expressed in minor units of its base currency.
//! Pure, no I/O.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, Money, ResultEngine};

/// An amount as entered by a member, possibly in a foreign currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignAmount {
    /// Major units of `currency` (e.g. `12.50`).
    pub original_amount: Decimal,
    pub currency: Currency,
    /// Base-currency units per one unit of `currency`. Optional only when
    /// `currency` is the base currency.
    pub exchange_rate: Option<Decimal>,
}

impl ForeignAmount {
    #[must_use]
    pub fn new(original_amount: Decimal, currency: Currency) -> Self {
        Self {
            original_amount,
            currency,
            exchange_rate: None,
        }
    }

    #[must_use]
    pub fn exchange_rate(mut self, rate: Decimal) -> Self {
        self.exchange_rate = Some(rate);
        self
    }
}

/// Result of normalization: the value-at-entry triple plus the canonical
/// amount derived from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizedAmount {
    pub amount: Money,
    pub original_amount: Decimal,
    pub currency: Currency,
    pub exchange_rate: Decimal,
}

/// Normalizes `input` into minor units of `base`.
///
/// Fails fast on the first invalid field: `original_amount`, then `currency`
/// (implicitly valid once typed), then `exchange_rate`, then the converted
/// amount itself when it rounds to zero.
pub fn normalize(input: ForeignAmount, base: Currency) -> ResultEngine<NormalizedAmount> {
    if input.original_amount <= Decimal::ZERO {
        return Err(EngineError::Validation(
            "original_amount: must be > 0".to_string(),
        ));
    }

    let exchange_rate = match input.exchange_rate {
        Some(rate) if rate <= Decimal::ZERO => {
            return Err(EngineError::Validation(
                "exchange_rate: must be > 0".to_string(),
            ));
        }
        Some(rate) => rate,
        None if input.currency == base => Decimal::ONE,
        None => {
            return Err(EngineError::Validation(format!(
                "exchange_rate: required for {} in a {} trip",
                input.currency.code(),
                base.code()
            )));
        }
    };

    let converted = input
        .original_amount
        .checked_mul(exchange_rate)
        .ok_or_else(|| EngineError::Validation("original_amount: too large".to_string()))?;
    let amount = Money::from_major(converted, base)?;
    if !amount.is_positive() {
        return Err(EngineError::Validation(format!(
            "original_amount: rounds to zero in {}",
            base.code()
        )));
    }

    Ok(NormalizedAmount {
        amount,
        original_amount: input.original_amount.normalize(),
        currency: input.currency,
        exchange_rate: exchange_rate.normalize(),
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn base_currency_defaults_rate_to_one() {
        let out = normalize(ForeignAmount::new(d("90"), Currency::Eur), Currency::Eur).unwrap();
        assert_eq!(out.amount, Money::new(9000));
        assert_eq!(out.exchange_rate, Decimal::ONE);
    }

    #[test]
    fn foreign_amount_is_multiplied_by_rate() {
        let input = ForeignAmount::new(d("12.50"), Currency::Usd).exchange_rate(d("0.92"));
        let out = normalize(input, Currency::Eur).unwrap();
        assert_eq!(out.amount, Money::new(1150));
        assert_eq!(out.original_amount * out.exchange_rate, d("11.5"));
    }

    #[test]
    fn zero_decimal_base_currency() {
        let input = ForeignAmount::new(d("10"), Currency::Eur).exchange_rate(d("161.37"));
        let out = normalize(input, Currency::Jpy).unwrap();
        assert_eq!(out.amount, Money::new(1614));
    }

    #[test]
    fn foreign_currency_requires_rate() {
        let err = normalize(ForeignAmount::new(d("10"), Currency::Gbp), Currency::Eur).unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation("exchange_rate: required for GBP in a EUR trip".to_string())
        );
    }

    #[test]
    fn rejects_non_positive_inputs() {
        assert!(normalize(ForeignAmount::new(d("0"), Currency::Eur), Currency::Eur).is_err());
        assert!(normalize(ForeignAmount::new(d("-3"), Currency::Eur), Currency::Eur).is_err());
        let zero_rate = ForeignAmount::new(d("3"), Currency::Usd).exchange_rate(Decimal::ZERO);
        assert_eq!(
            normalize(zero_rate, Currency::Eur).unwrap_err(),
            EngineError::Validation("exchange_rate: must be > 0".to_string())
        );
    }

    #[test]
    fn amount_first_is_reported_first() {
        let input = ForeignAmount::new(d("-1"), Currency::Usd).exchange_rate(d("-1"));
        assert_eq!(
            normalize(input, Currency::Eur).unwrap_err(),
            EngineError::Validation("original_amount: must be > 0".to_string())
        );
    }

    #[test]
    fn rejects_amounts_rounding_to_zero() {
        let input = ForeignAmount::new(d("0.001"), Currency::Eur);
        assert!(normalize(input, Currency::Eur).is_err());
    }
}
