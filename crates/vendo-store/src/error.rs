//! # Store Error Type
//!
//! The operation-boundary error: everything a store operation can surface
//! to its caller. Business precondition violations and database failures
//! arrive through their own types and are wrapped here unchanged, so the
//! caller can still match on the concrete cause.

use thiserror::Error;

use vendo_core::{CoreError, ValidationError};
use vendo_db::{DbError, LedgerError};

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<LedgerError> for StoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Core(e) => StoreError::Core(e),
            LedgerError::Db(e) => StoreError::Db(e),
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::Core(CoreError::Validation(err))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
