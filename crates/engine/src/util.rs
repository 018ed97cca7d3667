//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API, except
//! [`parse_expense_date`] which the HTTP layer uses on raw input. They
//! centralize validation and mapping logic so the engine enforces consistent
//! invariants.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};
use unicode_normalization::UnicodeNormalization;

use crate::{Currency, EngineError, ResultEngine};

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultEngine<Currency> {
    Currency::try_from(value).map_err(|_| {
        EngineError::InvariantViolation(format!("invalid stored currency: {value}"))
    })
}

/// Parse a decimal stored as text in the DB.
pub(crate) fn model_decimal(value: &str, label: &str) -> ResultEngine<Decimal> {
    Decimal::from_str(value)
        .map_err(|_| EngineError::InvariantViolation(format!("invalid stored {label}: {value}")))
}

/// Parse a decimal from user input, reporting `field` on failure.
pub fn parse_decimal(value: &str, field: &str) -> ResultEngine<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|_| EngineError::Validation(format!("{field}: not a decimal number")))
}

/// Parse an expense date (`YYYY-MM-DD`).
pub fn parse_expense_date(value: &str) -> ResultEngine<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| EngineError::Validation("date: expected YYYY-MM-DD".to_string()))
}

pub(crate) fn normalize_required_text(value: &str, field: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{field}: must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// NFKC + lowercase, restricted to `[a-z0-9._-]`, 3..=32 chars.
pub(crate) fn normalize_username(value: &str) -> ResultEngine<String> {
    let normalized: String = value.trim().nfkc().collect::<String>().to_lowercase();
    if !(3..=32).contains(&normalized.chars().count()) {
        return Err(EngineError::Validation(
            "username: must be 3 to 32 characters".to_string(),
        ));
    }
    if !normalized
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
    {
        return Err(EngineError::Validation(
            "username: only letters, digits, '.', '_' and '-' are allowed".to_string(),
        ));
    }
    if normalized.starts_with(crate::VIRTUAL_USERNAME_PREFIX) {
        return Err(EngineError::Validation(
            "username: prefix is reserved".to_string(),
        ));
    }
    Ok(normalized)
}

pub(crate) fn normalize_email(value: Option<&str>) -> ResultEngine<Option<String>> {
    let Some(email) = normalize_optional_text(value) else {
        return Ok(None);
    };
    let email = email.to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(EngineError::Validation("email: malformed address".to_string()));
    }
    Ok(Some(email))
}

/// `true` when the store rejected a write because of a unique constraint.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_are_strict() {
        assert_eq!(
            parse_expense_date("2025-07-14").unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 14).unwrap()
        );
        assert_eq!(
            parse_expense_date("14/07/2025").unwrap_err(),
            EngineError::Validation("date: expected YYYY-MM-DD".to_string())
        );
        assert!(parse_expense_date("2025-02-30").is_err());
    }

    #[test]
    fn usernames_are_normalized() {
        assert_eq!(normalize_username("  Alice ").unwrap(), "alice");
        assert_eq!(normalize_username("ＢＯＢ_1").unwrap(), "bob_1");
        assert!(normalize_username("al").is_err());
        assert!(normalize_username("with space").is_err());
        assert!(normalize_username("v-abc123").is_err());
    }

    #[test]
    fn emails_are_lowercased() {
        assert_eq!(
            normalize_email(Some(" Bob@Example.COM ")).unwrap(),
            Some("bob@example.com".to_string())
        );
        assert_eq!(normalize_email(Some("   ")).unwrap(), None);
        assert!(normalize_email(Some("nope")).is_err());
    }
}
