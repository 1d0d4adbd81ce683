//! Computes member positions by replaying the ledger.
//!
//! The ledger entries are the source of truth here; period snapshots and
//! cached balances are never consulted. Reversal entries carry the opposite
//! sign of what they reverse, so a plain sum is already net of reversals.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::building::Building;
use crate::domain::period::PeriodKey;
use crate::errors::{EngineError, EngineResult};

/// A member's position split into prior-period and current-period amounts.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberPosition {
    pub member_id: Uuid,
    pub period: PeriodKey,
    /// Net of all entries dated before the period start.
    pub historical: Decimal,
    /// Net of entries dated within the period.
    pub current_period: Decimal,
}

impl MemberPosition {
    /// What the member owes right now: the negative part of the combined
    /// position, reported as a positive figure.
    pub fn amount_owed(&self) -> Decimal {
        let net = self.historical + self.current_period;
        if net < Decimal::ZERO {
            -net
        } else {
            Decimal::ZERO
        }
    }
}

pub struct BalanceService;

impl BalanceService {
    /// Net balance from all entries dated strictly before the start of
    /// `period`. Everything from prior periods, nothing from the period
    /// itself.
    pub fn historical_balance(
        building: &Building,
        member_id: Uuid,
        period: PeriodKey,
    ) -> EngineResult<Decimal> {
        ensure_member(building, member_id)?;
        let cutoff = period.start_date();
        Ok(building
            .entries_for_member(member_id)
            .filter(|entry| entry.date < cutoff)
            .map(|entry| entry.amount)
            .sum())
    }

    /// Net of entries whose date falls within `period` only.
    pub fn period_obligation(
        building: &Building,
        member_id: Uuid,
        period: PeriodKey,
    ) -> EngineResult<Decimal> {
        ensure_member(building, member_id)?;
        Ok(building
            .entries_for_member(member_id)
            .filter(|entry| period.contains(entry.date))
            .map(|entry| entry.amount)
            .sum())
    }

    pub fn position(
        building: &Building,
        member_id: Uuid,
        period: PeriodKey,
    ) -> EngineResult<MemberPosition> {
        Ok(MemberPosition {
            member_id,
            period,
            historical: Self::historical_balance(building, member_id, period)?,
            current_period: Self::period_obligation(building, member_id, period)?,
        })
    }

    /// Full replay over every entry. Used by the auditor to reconcile the
    /// cached balance.
    pub fn replayed_balance(building: &Building, member_id: Uuid) -> EngineResult<Decimal> {
        ensure_member(building, member_id)?;
        Ok(building
            .entries_for_member(member_id)
            .map(|entry| entry.amount)
            .sum())
    }

    /// Whether any member of the building still carries prior-period debt.
    pub fn any_member_in_debt(building: &Building, period: PeriodKey) -> EngineResult<bool> {
        for member in &building.members {
            if Self::historical_balance(building, member.id, period)? < Decimal::ZERO {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn ensure_member(building: &Building, member_id: Uuid) -> EngineResult<()> {
    if building.member(member_id).is_none() {
        return Err(EngineError::MemberNotFound(member_id));
    }
    Ok(())
}
