//! Exact currency arithmetic.
//!
//! Amounts are carried as [`Decimal`] values at currency minor-unit (cent)
//! precision. Allocation works on integer cents so that remainders can be
//! distributed without leaking fractions.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

pub const CENT_SCALE: u32 = 2;

/// Rounds to cent precision, half-up away from zero.
pub fn round_to_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CENT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Whether a value is representable exactly in cents.
pub fn is_cent_precise(value: Decimal) -> bool {
    value == round_to_cents(value)
}

/// Converts a cent-precise value to integer cents. Returns `None` when the
/// value has sub-cent fractions or overflows `i64`.
pub fn to_cents(value: Decimal) -> Option<i64> {
    let scaled = value * Decimal::ONE_HUNDRED;
    if !scaled.fract().is_zero() {
        return None;
    }
    scaled.to_i64()
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, CENT_SCALE)
}
