//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when an input has a bad shape or range. The message
//!   names the first failing field.
//! - [`KeyNotFound`] thrown when a trip, expense or member is absent.
//! - [`Forbidden`] thrown when the actor is not a member, or not an admin
//!   where one is required.
//! - [`ExistingKey`] thrown on conflicts (duplicate membership, username or
//!   email collision, member still referenced by the ledger).
//! - [`InvariantViolation`] thrown when the settlement cannot exhaust the
//!   balances, which means the ledger is corrupted upstream.
//! - [`GenerationExhausted`] thrown when code or handle generation runs out of
//!   attempts.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`InvariantViolation`]: EngineError::InvariantViolation
//!  [`GenerationExhausted`]: EngineError::GenerationExhausted
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Ledger invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Generation exhausted: {0}")]
    GenerationExhausted(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvariantViolation(a), Self::InvariantViolation(b)) => a == b,
            (Self::GenerationExhausted(a), Self::GenerationExhausted(b)) => a == b,
            (Self::InvalidCredentials, Self::InvalidCredentials) => true,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
