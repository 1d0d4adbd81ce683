pub mod building;
pub mod charge;
pub mod common;
pub mod entry;
pub mod member;
pub mod payment;
pub mod period;
pub mod policy;

pub use building::{Building, WEIGHT_TOTAL};
pub use charge::{Charge, ChargeCategory, DistributionStrategy, ExplicitShare};
pub use entry::{EntryKind, EntryOrigin, LedgerEntry, RecordKind};
pub use member::Member;
pub use payment::Payment;
pub use period::{PeriodBalance, PeriodKey};
pub use policy::{ReservePolicy, ReservePriority};
