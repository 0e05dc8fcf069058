//! Errors the domain layer can return.

use sea_orm::DbErr;
use thiserror::Error;

/// Domain errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("\"{0}\" not found")]
    KeyNotFound(String),
    #[error("\"{0}\" already present")]
    ExistingKey(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid kind: {0}")]
    InvalidKind(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidKind(a), Self::InvalidKind(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
