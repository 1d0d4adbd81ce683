//! Splits charges across members and materializes ledger entries.
//!
//! All strategies guarantee that the generated entry magnitudes sum exactly
//! to the charge amount. Rounding works on integer cents: shares are floored
//! and the leftover cents are handed out one by one in a deterministic order.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::building::Building;
use crate::domain::charge::{Charge, DistributionStrategy, ExplicitShare};
use crate::domain::entry::{EntryKind, EntryOrigin};
use crate::domain::period::PeriodKey;
use crate::errors::{EngineError, EngineResult};
use crate::money;

/// A ledger entry waiting to be applied. Drafts for one operation are
/// validated as a whole before any of them touches the aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub member_id: Uuid,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub origin: EntryOrigin,
    pub date: NaiveDate,
}

pub struct AllocationService;

impl AllocationService {
    /// Computes per-member drafts for a charge without mutating anything.
    pub fn allocate(building: &Building, charge: &Charge) -> EngineResult<Vec<EntryDraft>> {
        building.validate_weights()?;
        Self::validate_amount(charge.amount)?;
        if building.members.is_empty() {
            return Err(EngineError::InvalidOperation(
                "cannot allocate a charge in a building with no members".into(),
            ));
        }

        let total_cents = money::to_cents(charge.amount)
            .ok_or_else(|| EngineError::InvalidAmount(charge.amount.to_string()))?;

        let shares = match &charge.strategy {
            DistributionStrategy::EqualShare => equal_shares(building, total_cents),
            DistributionStrategy::ByWeight => weighted_shares(building, total_cents),
            DistributionStrategy::ExplicitSubset(shares) => {
                explicit_shares(building, charge.amount, shares)?
            }
        };

        let origin = EntryOrigin::charge(charge.id);
        Ok(shares
            .into_iter()
            .filter(|(_, cents)| *cents != 0)
            .map(|(member_id, cents)| EntryDraft {
                member_id,
                amount: -money::from_cents(cents),
                kind: EntryKind::Charge,
                origin,
                date: charge.effective_date,
            })
            .collect())
    }

    /// Records a charge and its ledger entries in one atomic step: every
    /// check runs before the first mutation, so a failure leaves the
    /// aggregate untouched.
    pub fn issue_charge(building: &mut Building, mut charge: Charge) -> EngineResult<Uuid> {
        if charge.issued {
            return Err(EngineError::InvalidOperation(format!(
                "charge {} is already issued",
                charge.id
            )));
        }
        let drafts = Self::allocate(building, &charge)?;
        ensure_periods_open(building, &drafts)?;

        charge.issued = true;
        let charge_id = building.add_charge(charge);
        apply_drafts(building, &drafts)?;
        tracing::info!(charge = %charge_id, entries = drafts.len(), "charge issued");
        Ok(charge_id)
    }

    /// Reverses a previously issued charge. Emits one reversal entry per
    /// original charge entry, mirroring the stored shares; the original
    /// entries are never deleted.
    pub fn cancel_charge(building: &mut Building, charge_id: Uuid) -> EngineResult<()> {
        let charge = building
            .charge(charge_id)
            .ok_or(EngineError::ChargeNotFound(charge_id))?;
        if charge.cancelled {
            return Err(EngineError::ChargeAlreadyCancelled(charge_id));
        }
        if !charge.issued {
            return Err(EngineError::InvalidOperation(format!(
                "charge {charge_id} has no ledger entries to reverse"
            )));
        }

        let origin = EntryOrigin::charge(charge_id);
        let drafts: Vec<EntryDraft> = building
            .entries_for_origin(charge_id)
            .filter(|entry| entry.kind == EntryKind::Charge)
            .map(|entry| EntryDraft {
                member_id: entry.member_id,
                amount: -entry.amount,
                kind: EntryKind::Reversal,
                origin,
                date: entry.date,
            })
            .collect();
        ensure_periods_open(building, &drafts)?;

        apply_drafts(building, &drafts)?;
        if let Some(charge) = building.charge_mut(charge_id) {
            charge.cancelled = true;
        }
        tracing::info!(charge = %charge_id, entries = drafts.len(), "charge cancelled");
        Ok(())
    }

    pub fn validate_amount(amount: Decimal) -> EngineResult<()> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "{amount} is not a positive amount"
            )));
        }
        if !money::is_cent_precise(amount) {
            return Err(EngineError::InvalidAmount(format!(
                "{amount} has sub-cent precision"
            )));
        }
        Ok(())
    }
}

/// Applies validated drafts to the aggregate. Callers run
/// [`ensure_periods_open`] first so this cannot fail halfway through.
pub(crate) fn apply_drafts(building: &mut Building, drafts: &[EntryDraft]) -> EngineResult<()> {
    for draft in drafts {
        building.apply_entry(
            draft.member_id,
            draft.amount,
            draft.kind,
            draft.origin,
            draft.date,
        )?;
    }
    Ok(())
}

pub(crate) fn ensure_periods_open(building: &Building, drafts: &[EntryDraft]) -> EngineResult<()> {
    for draft in drafts {
        let key = PeriodKey::from_date(draft.date);
        if building.period(key).is_some_and(|snapshot| snapshot.closed) {
            return Err(EngineError::PeriodClosed(key));
        }
        if building.member(draft.member_id).is_none() {
            return Err(EngineError::MemberNotFound(draft.member_id));
        }
    }
    Ok(())
}

/// Even split. Floor shares, then hand leftover cents to members in
/// ascending id order.
fn equal_shares(building: &Building, total_cents: i64) -> Vec<(Uuid, i64)> {
    let mut ids: Vec<Uuid> = building.members.iter().map(|member| member.id).collect();
    ids.sort();
    let count = ids.len() as i64;
    let base = total_cents.div_euclid(count);
    let leftover = total_cents.rem_euclid(count);
    ids.into_iter()
        .enumerate()
        .map(|(index, id)| {
            let extra = if (index as i64) < leftover { 1 } else { 0 };
            (id, base + extra)
        })
        .collect()
}

/// Weighted split using the largest-remainder method: floor each
/// proportional share, then give leftover cents to members in order of
/// descending fractional remainder, ties broken by ascending member id.
fn weighted_shares(building: &Building, total_cents: i64) -> Vec<(Uuid, i64)> {
    let weight_total = building.weight_total as i128;
    let mut rows: Vec<(Uuid, i64, i128)> = building
        .members
        .iter()
        .map(|member| {
            let product = total_cents as i128 * member.weight_mills as i128;
            let base = (product.div_euclid(weight_total)) as i64;
            let remainder = product.rem_euclid(weight_total);
            (member.id, base, remainder)
        })
        .collect();

    let assigned: i64 = rows.iter().map(|(_, base, _)| base).sum();
    let mut leftover = total_cents - assigned;
    rows.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
    for row in rows.iter_mut() {
        if leftover == 0 {
            break;
        }
        row.1 += 1;
        leftover -= 1;
    }

    rows.sort_by_key(|(id, _, _)| *id);
    rows.into_iter().map(|(id, cents, _)| (id, cents)).collect()
}

/// Caller-supplied shares. The sum must match the charge amount exactly;
/// nothing is corrected implicitly.
fn explicit_shares(
    building: &Building,
    amount: Decimal,
    shares: &[ExplicitShare],
) -> EngineResult<Vec<(Uuid, i64)>> {
    let mut result = Vec::with_capacity(shares.len());
    let mut actual = Decimal::ZERO;
    for share in shares {
        if building.member(share.member_id).is_none() {
            return Err(EngineError::MemberNotFound(share.member_id));
        }
        let cents = money::to_cents(share.amount)
            .filter(|cents| *cents >= 0)
            .ok_or_else(|| EngineError::InvalidAmount(share.amount.to_string()))?;
        actual += share.amount;
        result.push((share.member_id, cents));
    }
    if actual != amount {
        return Err(EngineError::AllocationMismatch {
            expected: amount,
            actual,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::charge::ChargeCategory;
    use crate::domain::member::Member;

    fn weighted_building() -> (Building, Vec<Uuid>) {
        let mut building = Building::new("Test");
        let mut ids = vec![
            building.add_member(Member::new("Apt 1", 200)),
            building.add_member(Member::new("Apt 2", 300)),
            building.add_member(Member::new("Apt 3", 500)),
        ];
        ids.sort();
        // Re-read weights in id order for assertions.
        (building, ids)
    }

    fn charge(amount: Decimal, strategy: DistributionStrategy) -> Charge {
        Charge::new(
            amount,
            ChargeCategory::Utilities,
            strategy,
            NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        )
    }

    fn share_for(building: &Building, drafts: &[EntryDraft], weight: u32) -> Decimal {
        let member = building
            .members
            .iter()
            .find(|member| member.weight_mills == weight)
            .expect("member with weight");
        drafts
            .iter()
            .find(|draft| draft.member_id == member.id)
            .map(|draft| -draft.amount)
            .unwrap_or(Decimal::ZERO)
    }

    #[test]
    fn by_weight_exact_division() {
        let (building, _) = weighted_building();
        let charge = charge(Decimal::new(10000, 2), DistributionStrategy::ByWeight);
        let drafts = AllocationService::allocate(&building, &charge).expect("allocates");
        assert_eq!(share_for(&building, &drafts, 200), Decimal::new(2000, 2));
        assert_eq!(share_for(&building, &drafts, 300), Decimal::new(3000, 2));
        assert_eq!(share_for(&building, &drafts, 500), Decimal::new(5000, 2));
    }

    #[test]
    fn by_weight_extra_cent_goes_to_largest_remainder() {
        let (building, _) = weighted_building();
        let charge = charge(Decimal::new(10001, 2), DistributionStrategy::ByWeight);
        let drafts = AllocationService::allocate(&building, &charge).expect("allocates");
        // Remainders are 200, 300, 500 mills; the 500-weight member wins the
        // leftover cent.
        assert_eq!(share_for(&building, &drafts, 200), Decimal::new(2000, 2));
        assert_eq!(share_for(&building, &drafts, 300), Decimal::new(3000, 2));
        assert_eq!(share_for(&building, &drafts, 500), Decimal::new(5001, 2));
        let total: Decimal = drafts.iter().map(|draft| -draft.amount).sum();
        assert_eq!(total, Decimal::new(10001, 2));
    }

    #[test]
    fn by_weight_single_member_holds_all_weight() {
        let mut building = Building::new("Test");
        building.add_member(Member::new("Apt 1", 1000));
        let charge = charge(Decimal::new(12345, 2), DistributionStrategy::ByWeight);
        let drafts = AllocationService::allocate(&building, &charge).expect("allocates");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].amount, Decimal::new(-12345, 2));
    }

    #[test]
    fn equal_share_distributes_leftover_by_member_id() {
        let (building, ids) = weighted_building();
        let charge = charge(Decimal::new(10000, 2), DistributionStrategy::EqualShare);
        let drafts = AllocationService::allocate(&building, &charge).expect("allocates");
        let share = |id: Uuid| {
            drafts
                .iter()
                .find(|draft| draft.member_id == id)
                .map(|draft| -draft.amount)
                .unwrap()
        };
        // 100.00 / 3 = 33.33 with one leftover cent for the lowest id.
        assert_eq!(share(ids[0]), Decimal::new(3334, 2));
        assert_eq!(share(ids[1]), Decimal::new(3333, 2));
        assert_eq!(share(ids[2]), Decimal::new(3333, 2));
    }

    #[test]
    fn one_cent_across_seven_members_preserves_sum() {
        let mut building = Building::new("Test");
        building.weight_total = 700;
        for index in 0..7 {
            building.add_member(Member::new(format!("Apt {index}"), 100));
        }
        let charge = charge(Decimal::new(1, 2), DistributionStrategy::EqualShare);
        let drafts = AllocationService::allocate(&building, &charge).expect("allocates");
        // Zero shares are not materialized; the single cent lands on one
        // member.
        assert_eq!(drafts.len(), 1);
        let total: Decimal = drafts.iter().map(|draft| -draft.amount).sum();
        assert_eq!(total, Decimal::new(1, 2));
    }

    #[test]
    fn explicit_subset_must_sum_exactly() {
        let (building, ids) = weighted_building();
        let shares = vec![
            ExplicitShare {
                member_id: ids[0],
                amount: Decimal::new(4000, 2),
            },
            ExplicitShare {
                member_id: ids[1],
                amount: Decimal::new(5000, 2),
            },
        ];
        let charge = charge(
            Decimal::new(10000, 2),
            DistributionStrategy::ExplicitSubset(shares),
        );
        let err = AllocationService::allocate(&building, &charge).expect_err("mismatch rejected");
        assert!(matches!(err, EngineError::AllocationMismatch { .. }));
    }

    #[test]
    fn allocation_requires_valid_weights() {
        let mut building = Building::new("Test");
        building.add_member(Member::new("Apt 1", 999));
        let charge = charge(Decimal::new(10000, 2), DistributionStrategy::ByWeight);
        let err = AllocationService::allocate(&building, &charge).expect_err("weights invalid");
        assert!(matches!(err, EngineError::InvalidWeightConfiguration { .. }));
    }

    #[test]
    fn zero_weight_total_fails_before_any_division() {
        let mut building = Building::new("Test");
        building.weight_total = 0;
        building.add_member(Member::new("Apt 1", 0));
        let charge = charge(Decimal::new(10000, 2), DistributionStrategy::ByWeight);
        let err = AllocationService::allocate(&building, &charge).expect_err("zero total rejected");
        assert!(matches!(err, EngineError::InvalidWeightConfiguration { .. }));
    }

    #[test]
    fn cancel_restores_balances_and_keeps_entries() {
        let (mut building, _) = weighted_building();
        let charge_id = AllocationService::issue_charge(
            &mut building,
            charge(Decimal::new(10001, 2), DistributionStrategy::ByWeight),
        )
        .expect("issues");
        assert_eq!(building.entries.len(), 3);

        AllocationService::cancel_charge(&mut building, charge_id).expect("cancels");
        assert_eq!(building.entries.len(), 6);
        for member in &building.members {
            assert_eq!(member.cached_balance, Decimal::ZERO);
        }
        assert!(building.charge(charge_id).unwrap().cancelled);

        let err =
            AllocationService::cancel_charge(&mut building, charge_id).expect_err("double cancel");
        assert!(matches!(err, EngineError::ChargeAlreadyCancelled(_)));
    }

    #[test]
    fn issue_failure_leaves_building_untouched() {
        let (mut building, ids) = weighted_building();
        let bad = charge(
            Decimal::new(10000, 2),
            DistributionStrategy::ExplicitSubset(vec![ExplicitShare {
                member_id: ids[0],
                amount: Decimal::new(9999, 2),
            }]),
        );
        let err = AllocationService::issue_charge(&mut building, bad).expect_err("rejected");
        assert!(matches!(err, EngineError::AllocationMismatch { .. }));
        assert!(building.charges.is_empty());
        assert!(building.entries.is_empty());
    }
}
