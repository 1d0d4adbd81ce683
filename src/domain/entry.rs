use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable, signed record of a single member's charge, payment, or
/// reversal. Entries are append-only; they are never edited or deleted, only
/// superseded by reversal entries referencing the same origin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub member_id: Uuid,
    /// Signed amount: positive increases the member's balance (payments,
    /// charge reversals), negative is a charge share.
    pub amount: Decimal,
    pub kind: EntryKind,
    pub origin: EntryOrigin,
    /// Accounting date; decides which period the entry falls into.
    pub date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    /// Diagnostic snapshot of the cached balance around the write. Never
    /// authoritative; replay of the entries is.
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntryKind {
    Charge,
    Payment,
    Reversal,
}

/// Reference back to the charge or payment record that produced the entry.
/// Used for idempotency checks and orphan detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryOrigin {
    pub record_id: Uuid,
    pub record_kind: RecordKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordKind {
    Charge,
    Payment,
}

impl EntryOrigin {
    pub fn charge(record_id: Uuid) -> Self {
        Self {
            record_id,
            record_kind: RecordKind::Charge,
        }
    }

    pub fn payment(record_id: Uuid) -> Self {
        Self {
            record_id,
            record_kind: RecordKind::Payment,
        }
    }
}
