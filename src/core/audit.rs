//! Reconciles cached balances against the ledger.
//!
//! The cached balance is a read-side projection of the append-only log.
//! Divergence is reported, never silently fixed; repairing requires the
//! explicit [`AuditService::repair`] call, which logs every correction and
//! leaves the ledger itself untouched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::balance::BalanceService;
use crate::domain::building::Building;
use crate::domain::entry::{EntryOrigin, RecordKind};
use crate::errors::EngineResult;

#[derive(Debug, Clone, PartialEq)]
pub enum Divergence {
    /// Cached balance disagrees with a full ledger replay.
    CachedBalance {
        member_id: Uuid,
        cached: Decimal,
        computed: Decimal,
    },
    /// An entry references a charge or payment record that no longer
    /// exists. The engine refuses hard deletes, so these only arrive via
    /// externally produced snapshots.
    OrphanedEntry { entry_id: Uuid, origin: EntryOrigin },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub member_id: Uuid,
    pub old_balance: Decimal,
    pub new_balance: Decimal,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairReport {
    pub corrections: Vec<Correction>,
}

pub struct AuditService;

impl AuditService {
    /// Compares every member's cached balance against a full replay and
    /// scans for orphaned entries. `epsilon` is normally zero; currency
    /// arithmetic here is exact.
    pub fn audit(building: &Building, epsilon: Decimal) -> EngineResult<Vec<Divergence>> {
        let mut divergences = Vec::new();
        for member in &building.members {
            let computed = BalanceService::replayed_balance(building, member.id)?;
            if (member.cached_balance - computed).abs() > epsilon {
                tracing::warn!(
                    member = %member.id,
                    cached = %member.cached_balance,
                    computed = %computed,
                    "balance divergence detected"
                );
                divergences.push(Divergence::CachedBalance {
                    member_id: member.id,
                    cached: member.cached_balance,
                    computed,
                });
            }
        }
        for entry in &building.entries {
            let exists = match entry.origin.record_kind {
                RecordKind::Charge => building.charge(entry.origin.record_id).is_some(),
                RecordKind::Payment => building.payment(entry.origin.record_id).is_some(),
            };
            if !exists {
                divergences.push(Divergence::OrphanedEntry {
                    entry_id: entry.id,
                    origin: entry.origin,
                });
            }
        }
        Ok(divergences)
    }

    /// Overwrites diverged cached balances with the replayed values and
    /// returns the corrections made. Never mutates ledger entries.
    pub fn repair(building: &mut Building, epsilon: Decimal) -> EngineResult<RepairReport> {
        let mut report = RepairReport::default();
        let divergences = Self::audit(building, epsilon)?;
        for divergence in divergences {
            let Divergence::CachedBalance {
                member_id,
                cached,
                computed,
            } = divergence
            else {
                continue;
            };
            if let Some(member) = building.member_mut(member_id) {
                member.cached_balance = computed;
            }
            let correction = Correction {
                member_id,
                old_balance: cached,
                new_balance: computed,
                reason: "cached balance diverged from ledger replay".into(),
                at: Utc::now(),
            };
            tracing::warn!(
                member = %member_id,
                old = %cached,
                new = %computed,
                "cached balance repaired"
            );
            report.corrections.push(correction);
        }
        if !report.corrections.is_empty() {
            building.touch();
        }
        Ok(report)
    }
}
