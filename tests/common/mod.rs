use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use strata_core::domain::{Building, Member};

/// Builds the canonical three-apartment fixture with weights 200/300/500.
/// Member ids are returned in the order the members were added.
pub fn three_member_building() -> (Building, Vec<Uuid>) {
    let mut building = Building::new("Rua Alta 12");
    let ids = vec![
        building.add_member(Member::new("Apt 1", 200)),
        building.add_member(Member::new("Apt 2", 300)),
        building.add_member(Member::new("Apt 3", 500)),
    ];
    (building, ids)
}

pub fn sample_date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}
