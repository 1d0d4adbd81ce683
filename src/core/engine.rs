//! Engine facade over one building.
//!
//! External collaborators (API layers, schedulers, import jobs) go through
//! this type instead of touching the aggregate directly. The engine is a
//! constructed value holding its own state; there is no ambient or global
//! configuration. Mutation requires `&mut self`, which serializes writers
//! per building, while disjoint buildings are independent values that may be
//! driven in parallel.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::allocation::{apply_drafts, ensure_periods_open, AllocationService, EntryDraft};
use crate::core::audit::{AuditService, Divergence, RepairReport};
use crate::core::balance::{BalanceService, MemberPosition};
use crate::core::closing::ClosingService;
use crate::core::recurring::{RecurringOutcome, RecurringService};
use crate::domain::building::Building;
use crate::domain::charge::{Charge, ChargeCategory, DistributionStrategy};
use crate::domain::entry::{EntryKind, EntryOrigin};
use crate::domain::payment::Payment;
use crate::domain::period::{PeriodBalance, PeriodKey};
use crate::errors::{EngineError, EngineResult};
use crate::storage::StorageBackend;

#[derive(Debug)]
pub struct Engine {
    building: Building,
    audit_epsilon: Decimal,
}

impl Engine {
    pub fn new(building: Building) -> Self {
        Self {
            building,
            audit_epsilon: Decimal::ZERO,
        }
    }

    /// Tolerance for audit comparisons. Zero by default; the arithmetic is
    /// exact and drift of any size is a defect.
    pub fn with_audit_epsilon(mut self, epsilon: Decimal) -> Self {
        self.audit_epsilon = epsilon;
        self
    }

    pub fn building(&self) -> &Building {
        &self.building
    }

    pub fn building_mut(&mut self) -> &mut Building {
        &mut self.building
    }

    pub fn into_building(self) -> Building {
        self.building
    }

    pub fn create_charge(
        &mut self,
        amount: Decimal,
        category: ChargeCategory,
        strategy: DistributionStrategy,
        effective_date: NaiveDate,
    ) -> EngineResult<Uuid> {
        let charge = Charge::new(amount, category, strategy, effective_date);
        AllocationService::issue_charge(&mut self.building, charge)
    }

    /// Reverses the charge's ledger entries. Deletion of issued charges is
    /// not offered; history stays intact.
    pub fn cancel_charge(&mut self, charge_id: Uuid) -> EngineResult<()> {
        AllocationService::cancel_charge(&mut self.building, charge_id)
    }

    /// Records money received from a member: one payment record, one ledger
    /// entry, one cached-balance update, applied together.
    pub fn record_payment(
        &mut self,
        member_id: Uuid,
        amount: Decimal,
        date: NaiveDate,
    ) -> EngineResult<Uuid> {
        AllocationService::validate_amount(amount)?;
        let payment = Payment::new(member_id, amount, date);
        let draft = EntryDraft {
            member_id,
            amount,
            kind: EntryKind::Payment,
            origin: EntryOrigin::payment(payment.id),
            date,
        };
        ensure_periods_open(&self.building, std::slice::from_ref(&draft))?;

        let payment_id = self.building.add_payment(payment);
        apply_drafts(&mut self.building, std::slice::from_ref(&draft))?;
        tracing::info!(member = %member_id, payment = %payment_id, "payment recorded");
        Ok(payment_id)
    }

    /// The cached running balance. For the replay-derived figure use
    /// [`Engine::member_position`].
    pub fn member_balance(&self, member_id: Uuid) -> EngineResult<Decimal> {
        self.building
            .member(member_id)
            .map(|member| member.cached_balance)
            .ok_or(EngineError::MemberNotFound(member_id))
    }

    /// Replay-derived position as of a date: historical balance, the
    /// containing period's net, and the amount owed.
    pub fn member_position(&self, member_id: Uuid, as_of: NaiveDate) -> EngineResult<MemberPosition> {
        BalanceService::position(&self.building, member_id, PeriodKey::from_date(as_of))
    }

    pub fn close_period(
        &mut self,
        period: PeriodKey,
        reference: NaiveDate,
        force: bool,
    ) -> EngineResult<PeriodBalance> {
        ClosingService::close_period(&mut self.building, period, reference, force)
    }

    pub fn reopen_period(&mut self, period: PeriodKey) -> EngineResult<()> {
        ClosingService::reopen_period(&mut self.building, period)
    }

    pub fn run_recurring_charges(
        &mut self,
        period: PeriodKey,
    ) -> EngineResult<Vec<RecurringOutcome>> {
        RecurringService::ensure_recurring_charges(&mut self.building, period)
    }

    pub fn run_integrity_audit(&self) -> EngineResult<Vec<Divergence>> {
        AuditService::audit(&self.building, self.audit_epsilon)
    }

    pub fn repair_balances(&mut self) -> EngineResult<RepairReport> {
        AuditService::repair(&mut self.building, self.audit_epsilon)
    }

    /// Persists the building. Storage failures surface as
    /// [`EngineError::LedgerUnavailable`]; the cached state is never
    /// silently treated as durable.
    pub fn save(&self, storage: &dyn StorageBackend, name: &str) -> EngineResult<()> {
        storage
            .save(&self.building, name)
            .map_err(|err| EngineError::LedgerUnavailable(err.to_string()))
    }

    pub fn load(storage: &dyn StorageBackend, name: &str) -> EngineResult<Self> {
        let building = storage
            .load(name)
            .map_err(|err| EngineError::LedgerUnavailable(err.to_string()))?;
        Ok(Self::new(building))
    }
}
