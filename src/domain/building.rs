use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::charge::Charge;
use crate::domain::entry::{EntryKind, EntryOrigin, LedgerEntry, RecordKind};
use crate::domain::member::Member;
use crate::domain::payment::Payment;
use crate::domain::period::{PeriodBalance, PeriodKey};
use crate::domain::policy::ReservePolicy;
use crate::errors::{EngineError, EngineResult};

const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Default fixed total for member weights, in mills.
pub const WEIGHT_TOTAL: u32 = 1000;

/// The member-set aggregate: one co-owned building with its members, origin
/// records, append-only ledger, and per-period snapshots.
///
/// All mutation goes through `&mut` access, which serializes writers per
/// building; distinct buildings are independent values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub id: Uuid,
    pub name: String,
    /// Fixed sum all member weights must reach before any allocation runs.
    pub weight_total: u32,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub charges: Vec<Charge>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
    #[serde(default)]
    pub periods: Vec<PeriodBalance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve_policy: Option<ReservePolicy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "Building::schema_version_default")]
    pub schema_version: u8,
}

impl Building {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            weight_total: WEIGHT_TOTAL,
            members: Vec::new(),
            charges: Vec::new(),
            payments: Vec::new(),
            entries: Vec::new(),
            periods: Vec::new(),
            reserve_policy: None,
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn add_member(&mut self, member: Member) -> Uuid {
        let id = member.id;
        self.members.push(member);
        self.touch();
        id
    }

    pub fn member(&self, id: Uuid) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }

    pub fn member_mut(&mut self, id: Uuid) -> Option<&mut Member> {
        self.members.iter_mut().find(|member| member.id == id)
    }

    /// Checks that member weights sum to the fixed total. Run after any
    /// administrative weight change and before every allocation.
    ///
    /// A zero total is rejected outright: nothing can be divided across a
    /// weightless member set.
    pub fn validate_weights(&self) -> EngineResult<()> {
        let actual: u32 = self.members.iter().map(|member| member.weight_mills).sum();
        if self.weight_total == 0 || actual != self.weight_total {
            return Err(EngineError::InvalidWeightConfiguration {
                expected: self.weight_total,
                actual,
            });
        }
        Ok(())
    }

    pub fn add_charge(&mut self, charge: Charge) -> Uuid {
        let id = charge.id;
        self.charges.push(charge);
        self.touch();
        id
    }

    pub fn charge(&self, id: Uuid) -> Option<&Charge> {
        self.charges.iter().find(|charge| charge.id == id)
    }

    pub fn charge_mut(&mut self, id: Uuid) -> Option<&mut Charge> {
        self.charges.iter_mut().find(|charge| charge.id == id)
    }

    pub fn charge_by_recurring_key(&self, key: &str) -> Option<&Charge> {
        self.charges
            .iter()
            .find(|charge| charge.recurring_key.as_deref() == Some(key) && !charge.cancelled)
    }

    /// Origin records referenced by ledger entries are never hard-deleted.
    /// Deletion requests must go through charge cancellation, which reverses
    /// the entries instead.
    pub fn remove_charge(&mut self, id: Uuid) -> EngineResult<()> {
        if self.charge(id).is_none() {
            return Err(EngineError::ChargeNotFound(id));
        }
        Err(EngineError::InvalidOperation(format!(
            "charge {id} is referenced by the ledger; cancel it instead of deleting"
        )))
    }

    pub fn add_payment(&mut self, payment: Payment) -> Uuid {
        let id = payment.id;
        self.payments.push(payment);
        self.touch();
        id
    }

    pub fn payment(&self, id: Uuid) -> Option<&Payment> {
        self.payments.iter().find(|payment| payment.id == id)
    }

    pub fn period(&self, key: PeriodKey) -> Option<&PeriodBalance> {
        self.periods.iter().find(|snapshot| snapshot.period == key)
    }

    pub fn period_mut(&mut self, key: PeriodKey) -> Option<&mut PeriodBalance> {
        self.periods
            .iter_mut()
            .find(|snapshot| snapshot.period == key)
    }

    /// Fetches the snapshot for a period, creating it lazily the first time
    /// the period is touched.
    pub fn ensure_period(&mut self, key: PeriodKey) -> &mut PeriodBalance {
        if let Some(index) = self
            .periods
            .iter()
            .position(|snapshot| snapshot.period == key)
        {
            return &mut self.periods[index];
        }
        self.periods.push(PeriodBalance::new(key));
        self.periods.sort_by_key(|snapshot| snapshot.period);
        let index = self
            .periods
            .iter()
            .position(|snapshot| snapshot.period == key)
            .expect("snapshot just inserted");
        &mut self.periods[index]
    }

    pub fn entries_for_member(&self, member_id: Uuid) -> impl Iterator<Item = &LedgerEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.member_id == member_id)
    }

    pub fn entries_for_origin(&self, record_id: Uuid) -> impl Iterator<Item = &LedgerEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.origin.record_id == record_id)
    }

    /// Appends one ledger entry and updates the member's cached balance and
    /// the open period snapshot in the same step.
    ///
    /// Fails without side effects when the member is unknown or the target
    /// period has been closed (closed periods require an explicit reopen).
    pub fn apply_entry(
        &mut self,
        member_id: Uuid,
        amount: Decimal,
        kind: EntryKind,
        origin: EntryOrigin,
        date: NaiveDate,
    ) -> EngineResult<Uuid> {
        let period_key = PeriodKey::from_date(date);
        if let Some(snapshot) = self.period(period_key) {
            if snapshot.closed {
                return Err(EngineError::PeriodClosed(period_key));
            }
        }
        let member = self
            .member_mut(member_id)
            .ok_or(EngineError::MemberNotFound(member_id))?;

        let balance_before = member.cached_balance;
        let balance_after = balance_before + amount;
        member.cached_balance = balance_after;
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            member_id,
            amount,
            kind,
            origin,
            date,
            recorded_at: Utc::now(),
            balance_before,
            balance_after,
        };
        let entry_id = entry.id;
        self.entries.push(entry);

        let snapshot = self.ensure_period(period_key);
        match kind {
            // Charges and their reversals both carry the sign of their
            // effect, so the magnitude accumulates as -amount.
            EntryKind::Charge => snapshot.total_charges += -amount,
            EntryKind::Payment => snapshot.total_payments += amount,
            EntryKind::Reversal => match origin.record_kind {
                RecordKind::Charge => snapshot.total_charges += -amount,
                RecordKind::Payment => snapshot.total_payments += amount,
            },
        }
        self.touch();
        Ok(entry_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn building_with_member() -> (Building, Uuid) {
        let mut building = Building::new("Test");
        let member = building.add_member(Member::new("Apt 1", WEIGHT_TOTAL));
        (building, member)
    }

    #[test]
    fn weights_must_sum_to_total() {
        let mut building = Building::new("Test");
        building.add_member(Member::new("Apt 1", 400));
        building.add_member(Member::new("Apt 2", 500));
        let err = building.validate_weights().expect_err("weights short");
        assert!(matches!(
            err,
            EngineError::InvalidWeightConfiguration {
                expected: 1000,
                actual: 900
            }
        ));
        building.add_member(Member::new("Apt 3", 100));
        building.validate_weights().expect("weights complete");
    }

    #[test]
    fn zero_weight_total_is_rejected() {
        let mut building = Building::new("Test");
        building.weight_total = 0;
        building.add_member(Member::new("Apt 1", 0));
        let err = building.validate_weights().expect_err("zero total invalid");
        assert!(matches!(
            err,
            EngineError::InvalidWeightConfiguration {
                expected: 0,
                actual: 0
            }
        ));
    }

    #[test]
    fn apply_entry_updates_cache_and_period() {
        let (mut building, member) = building_with_member();
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        building
            .apply_entry(
                member,
                Decimal::new(-5000, 2),
                EntryKind::Charge,
                EntryOrigin::charge(Uuid::new_v4()),
                date,
            )
            .expect("entry applies");

        assert_eq!(
            building.member(member).unwrap().cached_balance,
            Decimal::new(-5000, 2)
        );
        let snapshot = building.period(PeriodKey::new(2024, 3)).unwrap();
        assert_eq!(snapshot.total_charges, Decimal::new(5000, 2));
        assert_eq!(snapshot.total_payments, Decimal::ZERO);
    }

    #[test]
    fn apply_entry_rejects_closed_period() {
        let (mut building, member) = building_with_member();
        let key = PeriodKey::new(2024, 3);
        building.ensure_period(key).closed = true;
        let err = building
            .apply_entry(
                member,
                Decimal::new(-100, 2),
                EntryKind::Charge,
                EntryOrigin::charge(Uuid::new_v4()),
                key.start_date(),
            )
            .expect_err("closed period rejects entries");
        assert!(matches!(err, EngineError::PeriodClosed(period) if period == key));
        assert!(building.entries.is_empty());
    }

    #[test]
    fn remove_charge_is_refused() {
        let (mut building, _member) = building_with_member();
        let charge = Charge::new(
            Decimal::new(1000, 2),
            crate::domain::charge::ChargeCategory::Utilities,
            crate::domain::charge::DistributionStrategy::EqualShare,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let id = building.add_charge(charge);
        let err = building.remove_charge(id).expect_err("hard delete refused");
        assert!(matches!(err, EngineError::InvalidOperation(_)));
        assert!(building.charge(id).is_some());
    }
}
