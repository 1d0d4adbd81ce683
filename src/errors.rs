use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::period::PeriodKey;

pub type EngineResult<T> = Result<T, EngineError>;

/// Error type covering validation, ledger, and storage failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Explicit shares do not sum to the charge amount. Rejected, never
    /// auto-corrected.
    #[error("allocation mismatch: shares sum to {actual}, charge amount is {expected}")]
    AllocationMismatch { expected: Decimal, actual: Decimal },

    /// Member weights do not sum to the building's fixed total.
    #[error("invalid weight configuration: weights sum to {actual}, expected {expected}")]
    InvalidWeightConfiguration { expected: u32, actual: u32 },

    /// The backing store could not be reached or read. Callers must surface
    /// this instead of falling back to cached balances.
    #[error("ledger store unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("period {0} has not ended yet")]
    PeriodNotEnded(PeriodKey),

    #[error("no balance snapshot recorded for period {0}")]
    PeriodNotFound(PeriodKey),

    #[error("period {0} is closed; reopen it before recording entries")]
    PeriodClosed(PeriodKey),

    #[error("member not found: {0}")]
    MemberNotFound(Uuid),

    #[error("charge not found: {0}")]
    ChargeNotFound(Uuid),

    #[error("charge {0} is already cancelled")]
    ChargeAlreadyCancelled(Uuid),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
