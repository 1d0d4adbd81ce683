use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Identifiable;

/// A cost-sharing unit (an apartment) with a fixed proportional weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    /// Proportional weight in mills; all members of a building sum to the
    /// building's fixed weight total.
    pub weight_mills: u32,
    /// Running balance projected from the ledger. Negative means the member
    /// owes money. Mutated only by the engine services; reconciled by the
    /// auditor.
    pub cached_balance: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Member {
    pub fn new(name: impl Into<String>, weight_mills: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            weight_mills,
            cached_balance: Decimal::ZERO,
            notes: None,
        }
    }
}

impl Identifiable for Member {
    fn id(&self) -> Uuid {
        self.id
    }
}
