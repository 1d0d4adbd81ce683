use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Identifiable;

/// A monetary obligation to be split among the building's members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Charge {
    pub id: Uuid,
    /// Positive, cent-precise amount.
    pub amount: Decimal,
    pub category: ChargeCategory,
    pub strategy: DistributionStrategy,
    pub effective_date: NaiveDate,
    /// Who nominally owes the charge. Informational only; does not affect
    /// the allocation sum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsibility: Option<String>,
    /// Set once the charge has produced ledger entries.
    #[serde(default)]
    pub issued: bool,
    /// Set when the charge has been reversed. The original entries remain.
    #[serde(default)]
    pub cancelled: bool,
    /// Idempotency key for scheduler-issued charges
    /// (`"{category}:{period}"`); manual charges carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Charge {
    pub fn new(
        amount: Decimal,
        category: ChargeCategory,
        strategy: DistributionStrategy,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            category,
            strategy,
            effective_date,
            responsibility: None,
            issued: false,
            cancelled: false,
            recurring_key: None,
            notes: None,
        }
    }

    pub fn with_responsibility(mut self, responsibility: impl Into<String>) -> Self {
        self.responsibility = Some(responsibility.into());
        self
    }

    pub fn with_recurring_key(mut self, key: impl Into<String>) -> Self {
        self.recurring_key = Some(key.into());
        self
    }
}

impl Identifiable for Charge {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Tag used for recurring-charge identity and reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChargeCategory {
    Utilities,
    Maintenance,
    ManagementFee,
    ReserveFund,
    Other(String),
}

impl ChargeCategory {
    /// Stable label used in idempotency keys and logs.
    pub fn label(&self) -> &str {
        match self {
            ChargeCategory::Utilities => "utilities",
            ChargeCategory::Maintenance => "maintenance",
            ChargeCategory::ManagementFee => "management_fee",
            ChargeCategory::ReserveFund => "reserve_fund",
            ChargeCategory::Other(name) => name,
        }
    }
}

/// How a charge is split across members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DistributionStrategy {
    /// Even split; leftover cents go to members in ascending id order.
    EqualShare,
    /// Proportional to member weights, largest-remainder rounding.
    ByWeight,
    /// Caller-supplied shares for a subset of members. Must sum to the
    /// charge amount exactly.
    ExplicitSubset(Vec<ExplicitShare>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplicitShare {
    pub member_id: Uuid,
    pub amount: Decimal,
}
