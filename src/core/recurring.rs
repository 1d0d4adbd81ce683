//! Emits recurring charges (management fee, reserve-fund contribution) for
//! a period.
//!
//! Emission is keyed by `"{category}:{period}"`, checked with an explicit
//! lookup, so running the scheduler twice for the same period never issues a
//! charge twice. Reserve contributions are additionally gated to the
//! configured collection window and, under `AfterObligationsCleared`, to a
//! debt-free member set; gating is a reported outcome, not an error.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::allocation::AllocationService;
use crate::core::balance::BalanceService;
use crate::domain::building::Building;
use crate::domain::charge::{Charge, ChargeCategory, DistributionStrategy};
use crate::domain::period::PeriodKey;
use crate::errors::EngineResult;

#[derive(Debug, Clone, PartialEq)]
pub enum RecurringOutcome {
    Issued {
        charge_id: Uuid,
        category: ChargeCategory,
    },
    /// A charge with this idempotency key already exists for the period.
    AlreadyIssued {
        charge_id: Uuid,
        category: ChargeCategory,
    },
    /// The gating policy suppressed emission this period.
    Gated {
        category: ChargeCategory,
        reason: GatedReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedReason {
    OutsideCollectionWindow,
    OutstandingMemberDebt,
}

pub struct RecurringService;

impl RecurringService {
    /// Makes sure the period's recurring charges exist, issuing any that are
    /// missing and admitted by policy. Each emission is atomic: a charge is
    /// either fully allocated or not recorded at all.
    pub fn ensure_recurring_charges(
        building: &mut Building,
        period: PeriodKey,
    ) -> EngineResult<Vec<RecurringOutcome>> {
        let Some(policy) = building.reserve_policy.clone() else {
            return Ok(Vec::new());
        };
        let mut outcomes = Vec::new();

        if let Some(fee) = policy.management_fee {
            outcomes.push(Self::ensure_charge(
                building,
                period,
                ChargeCategory::ManagementFee,
                fee,
            )?);
        }

        let category = ChargeCategory::ReserveFund;
        let key = recurring_key(&category, period);
        if let Some(existing) = building.charge_by_recurring_key(&key) {
            outcomes.push(RecurringOutcome::AlreadyIssued {
                charge_id: existing.id,
                category,
            });
            return Ok(outcomes);
        }
        if !policy.window_contains(period) {
            outcomes.push(RecurringOutcome::Gated {
                category,
                reason: GatedReason::OutsideCollectionWindow,
            });
            return Ok(outcomes);
        }
        if policy.priority == crate::domain::policy::ReservePriority::AfterObligationsCleared
            && BalanceService::any_member_in_debt(building, period)?
        {
            // All-or-nothing: one indebted member suppresses the whole
            // building's contribution for the period.
            tracing::info!(period = %period, "reserve contribution gated by outstanding debt");
            outcomes.push(RecurringOutcome::Gated {
                category,
                reason: GatedReason::OutstandingMemberDebt,
            });
            return Ok(outcomes);
        }

        let contribution = crate::money::round_to_cents(
            policy.target_amount / Decimal::from(policy.periods_in_window().max(1)),
        );
        outcomes.push(Self::ensure_charge(building, period, category, contribution)?);
        Ok(outcomes)
    }

    fn ensure_charge(
        building: &mut Building,
        period: PeriodKey,
        category: ChargeCategory,
        amount: Decimal,
    ) -> EngineResult<RecurringOutcome> {
        let key = recurring_key(&category, period);
        if let Some(existing) = building.charge_by_recurring_key(&key) {
            return Ok(RecurringOutcome::AlreadyIssued {
                charge_id: existing.id,
                category,
            });
        }
        let charge = Charge::new(
            amount,
            category.clone(),
            DistributionStrategy::ByWeight,
            period.start_date(),
        )
        .with_recurring_key(key);
        let charge_id = AllocationService::issue_charge(building, charge)?;
        tracing::info!(period = %period, category = category.label(), charge = %charge_id, "recurring charge issued");
        Ok(RecurringOutcome::Issued { charge_id, category })
    }
}

fn recurring_key(category: &ChargeCategory, period: PeriodKey) -> String {
    format!("{}:{}", category.label(), period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entry::{EntryKind, EntryOrigin};
    use crate::domain::member::Member;
    use crate::domain::policy::{ReservePolicy, ReservePriority};
    use chrono::NaiveDate;

    fn building_with_policy(priority: ReservePriority) -> Building {
        let mut building = Building::new("Test");
        building.add_member(Member::new("Apt 1", 200));
        building.add_member(Member::new("Apt 2", 300));
        building.add_member(Member::new("Apt 3", 500));
        building.reserve_policy = Some(ReservePolicy {
            target_amount: Decimal::new(1200000, 2), // 12000.00 over 12 periods
            window_start: PeriodKey::new(2024, 7),
            window_end: PeriodKey::new(2025, 6),
            priority,
            management_fee: Some(Decimal::new(15000, 2)),
        });
        building
    }

    fn issued_categories(outcomes: &[RecurringOutcome]) -> Vec<&ChargeCategory> {
        outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                RecurringOutcome::Issued { category, .. } => Some(category),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn emits_fee_and_contribution_inside_window() {
        let mut building = building_with_policy(ReservePriority::Always);
        let outcomes =
            RecurringService::ensure_recurring_charges(&mut building, PeriodKey::new(2024, 8))
                .unwrap();
        assert_eq!(
            issued_categories(&outcomes),
            vec![&ChargeCategory::ManagementFee, &ChargeCategory::ReserveFund]
        );
        // 12000.00 / 12 = 1000.00 per period, split 200/300/500.
        let reserve = building
            .charges
            .iter()
            .find(|charge| charge.category == ChargeCategory::ReserveFund)
            .unwrap();
        assert_eq!(reserve.amount, Decimal::new(100000, 2));
        assert_eq!(building.entries.len(), 6);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut building = building_with_policy(ReservePriority::Always);
        let period = PeriodKey::new(2024, 8);
        RecurringService::ensure_recurring_charges(&mut building, period).unwrap();
        let second = RecurringService::ensure_recurring_charges(&mut building, period).unwrap();
        assert!(second
            .iter()
            .all(|outcome| matches!(outcome, RecurringOutcome::AlreadyIssued { .. })));
        assert_eq!(building.charges.len(), 2);
    }

    #[test]
    fn contribution_outside_window_is_gated() {
        let mut building = building_with_policy(ReservePriority::Always);
        let outcomes =
            RecurringService::ensure_recurring_charges(&mut building, PeriodKey::new(2024, 3))
                .unwrap();
        assert!(outcomes.contains(&RecurringOutcome::Gated {
            category: ChargeCategory::ReserveFund,
            reason: GatedReason::OutsideCollectionWindow,
        }));
        // The management fee is not window-gated.
        assert_eq!(issued_categories(&outcomes), vec![&ChargeCategory::ManagementFee]);
    }

    #[test]
    fn debt_gates_the_whole_member_set_until_cleared() {
        let mut building = building_with_policy(ReservePriority::AfterObligationsCleared);
        let debtor = building.members[0].id;
        building
            .apply_entry(
                debtor,
                Decimal::new(-5000, 2),
                EntryKind::Charge,
                EntryOrigin::charge(Uuid::new_v4()),
                NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            )
            .unwrap();

        let period = PeriodKey::new(2024, 8);
        let outcomes = RecurringService::ensure_recurring_charges(&mut building, period).unwrap();
        assert!(outcomes.contains(&RecurringOutcome::Gated {
            category: ChargeCategory::ReserveFund,
            reason: GatedReason::OutstandingMemberDebt,
        }));
        assert!(!building
            .charges
            .iter()
            .any(|charge| charge.category == ChargeCategory::ReserveFund));

        // Pay the debt off; the next run emits the contribution.
        building
            .apply_entry(
                debtor,
                Decimal::new(8000, 2),
                EntryKind::Payment,
                EntryOrigin::payment(Uuid::new_v4()),
                NaiveDate::from_ymd_opt(2024, 7, 10).unwrap(),
            )
            .unwrap();
        let outcomes = RecurringService::ensure_recurring_charges(&mut building, period).unwrap();
        assert!(outcomes.iter().any(|outcome| matches!(
            outcome,
            RecurringOutcome::Issued {
                category: ChargeCategory::ReserveFund,
                ..
            }
        )));
    }

    #[test]
    fn no_policy_means_no_recurring_charges() {
        let mut building = Building::new("Test");
        building.add_member(Member::new("Apt 1", 1000));
        let outcomes =
            RecurringService::ensure_recurring_charges(&mut building, PeriodKey::new(2024, 8))
                .unwrap();
        assert!(outcomes.is_empty());
    }
}
