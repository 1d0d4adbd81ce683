use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::period::PeriodKey;

/// Per-building configuration for recurring charges. Read-only input to the
/// recurring-charge scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservePolicy {
    /// Lump sum to collect over the window.
    pub target_amount: Decimal,
    /// First period in which contributions are collected.
    pub window_start: PeriodKey,
    /// Last period in which contributions are collected (inclusive).
    pub window_end: PeriodKey,
    #[serde(default)]
    pub priority: ReservePriority,
    /// Flat monthly management fee split by weight; `None` disables the
    /// management-fee recurring charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_fee: Option<Decimal>,
}

impl ReservePolicy {
    /// Number of periods contributions are spread over.
    pub fn periods_in_window(&self) -> u32 {
        self.window_start.periods_through(self.window_end)
    }

    pub fn window_contains(&self, period: PeriodKey) -> bool {
        self.window_start <= period && period <= self.window_end
    }
}

/// Whether reserve contributions are collected while members still owe
/// ordinary obligations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ReservePriority {
    #[default]
    Always,
    /// Skip the whole building's contribution for a period while any member
    /// carries a negative historical balance.
    AfterObligationsCleared,
}
