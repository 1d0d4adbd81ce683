use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Identifiable;

/// Money received from one member. Recording a payment produces exactly one
/// ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub member_id: Uuid,
    /// Positive, cent-precise amount.
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Payment {
    pub fn new(member_id: Uuid, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            amount,
            date,
            notes: None,
        }
    }
}

impl Identifiable for Payment {
    fn id(&self) -> Uuid {
        self.id
    }
}
