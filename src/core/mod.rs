pub mod allocation;
pub mod audit;
pub mod balance;
pub mod closing;
pub mod engine;
pub mod recurring;

pub use allocation::{AllocationService, EntryDraft};
pub use audit::{AuditService, Correction, Divergence, RepairReport};
pub use balance::{BalanceService, MemberPosition};
pub use closing::ClosingService;
pub use engine::Engine;
pub use recurring::{GatedReason, RecurringOutcome, RecurringService};
