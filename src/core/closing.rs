//! Period closing workflow.
//!
//! Each period moves Open -> Closed. Closing computes the period's net
//! result from the ledger, writes the snapshot, and seeds the next period's
//! carry-in. Re-closing an already-closed period is a no-op returning the
//! existing snapshot, which makes retries safe without external
//! deduplication.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::building::Building;
use crate::domain::entry::{EntryKind, RecordKind};
use crate::domain::period::{PeriodBalance, PeriodKey};
use crate::errors::{EngineError, EngineResult};

pub struct ClosingService;

impl ClosingService {
    /// Closes `period`, seeding the next period's `previous_obligations`
    /// with the computed carry-forward.
    ///
    /// `reference` is the caller's notion of today; the period must have
    /// ended before it unless `force` is set. A period with no activity
    /// still propagates the prior carry-forward unchanged: a quiet month is
    /// not a reset point, and neither is a year boundary.
    pub fn close_period(
        building: &mut Building,
        period: PeriodKey,
        reference: NaiveDate,
        force: bool,
    ) -> EngineResult<PeriodBalance> {
        if let Some(snapshot) = building.period(period) {
            if snapshot.closed {
                return Ok(snapshot.clone());
            }
        }
        if !force && reference <= period.end_date() {
            return Err(EngineError::PeriodNotEnded(period));
        }
        // A stale carry-in means the predecessor was reopened after seeding
        // this period. Its value must not be trusted until the predecessor
        // closes again and reseeds it.
        let carry_in_stale = building
            .period(period)
            .map(|snapshot| snapshot.carry_in_stale)
            .unwrap_or(false);
        let prev_closed = building
            .period(period.prev())
            .map(|snapshot| snapshot.closed)
            .unwrap_or(false);
        if carry_in_stale && !prev_closed {
            return Err(EngineError::InvalidOperation(format!(
                "carry-in for period {period} is stale; close period {} first",
                period.prev()
            )));
        }

        // Totals come from the ledger, not from the incrementally maintained
        // counters; the snapshot is a projection and the log wins.
        let (total_charges, total_payments) = period_totals(building, period);
        let previous_obligations = match building.period(period.prev()) {
            Some(prev) if prev.closed => prev.carry_forward,
            _ => building
                .period(period)
                .map(|snapshot| snapshot.previous_obligations)
                .unwrap_or(Decimal::ZERO),
        };

        let net_result = total_payments - (previous_obligations + total_charges);
        let carry_forward = if net_result < Decimal::ZERO {
            -net_result
        } else {
            Decimal::ZERO
        };

        let snapshot = building.ensure_period(period);
        snapshot.total_charges = total_charges;
        snapshot.total_payments = total_payments;
        snapshot.previous_obligations = previous_obligations;
        snapshot.carry_forward = carry_forward;
        snapshot.closed = true;
        snapshot.carry_in_stale = false;
        snapshot.closed_at = Some(Utc::now());
        let result = snapshot.clone();

        let next_key = period.next();
        let next_closed = building
            .period(next_key)
            .map(|snapshot| snapshot.closed)
            .unwrap_or(false);
        if next_closed {
            // The closed follower keeps an out-of-date carry-in; mark it so
            // the mismatch cannot be mistaken for a fresh value.
            if let Some(next) = building.period_mut(next_key) {
                next.carry_in_stale = true;
            }
            tracing::warn!(
                period = %period,
                next = %next_key,
                "next period already closed; carry-in marked stale, reopen it to reseed"
            );
        } else {
            let next = building.ensure_period(next_key);
            next.previous_obligations = carry_forward;
            next.carry_in_stale = false;
        }
        building.touch();
        tracing::info!(
            period = %period,
            carry_forward = %carry_forward,
            "period closed"
        );
        Ok(result)
    }

    /// Administrative Closed -> Open transition. The following period's
    /// carry-in is marked stale (not erased) and gets recomputed on the next
    /// close.
    pub fn reopen_period(building: &mut Building, period: PeriodKey) -> EngineResult<()> {
        let snapshot = building
            .period_mut(period)
            .ok_or(EngineError::PeriodNotFound(period))?;
        if !snapshot.closed {
            return Err(EngineError::InvalidOperation(format!(
                "period {period} is not closed"
            )));
        }
        snapshot.closed = false;
        snapshot.closed_at = None;
        if let Some(next) = building.period_mut(period.next()) {
            next.carry_in_stale = true;
        }
        building.touch();
        tracing::warn!(period = %period, "period reopened");
        Ok(())
    }
}

/// Sums charge magnitudes and payments for entries dated in the period.
/// Reversals count against the side they reverse.
fn period_totals(building: &Building, period: PeriodKey) -> (Decimal, Decimal) {
    let mut charges = Decimal::ZERO;
    let mut payments = Decimal::ZERO;
    for entry in building.entries.iter().filter(|e| period.contains(e.date)) {
        match entry.kind {
            EntryKind::Charge => charges += -entry.amount,
            EntryKind::Payment => payments += entry.amount,
            EntryKind::Reversal => match entry.origin.record_kind {
                RecordKind::Charge => charges += -entry.amount,
                RecordKind::Payment => payments += entry.amount,
            },
        }
    }
    (charges, payments)
}
