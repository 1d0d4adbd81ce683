#![doc(test(attr(deny(warnings))))]

//! Strata Core allocates shared building costs across apartments and keeps a
//! carry-forward ledger of what each one owes, period after period.
//!
//! The aggregate ([`domain::Building`]) holds the append-only ledger; the
//! services in [`core`] split charges, replay balances, close periods, emit
//! recurring charges, and audit the cached projections against the log.

pub mod core;
pub mod domain;
pub mod errors;
pub mod money;
pub mod storage;
pub mod utils;

pub use self::core::Engine;
pub use self::errors::{EngineError, EngineResult};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Strata Core tracing initialized.");
    });
}
