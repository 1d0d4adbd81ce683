use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A calendar accounting period (one month).
///
/// The month is validated on every construction path, including
/// deserialization, so downstream date math never sees an out-of-range
/// value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "RawPeriodKey")]
pub struct PeriodKey {
    pub year: i32,
    /// 1-based calendar month.
    pub month: u32,
}

#[derive(Deserialize)]
struct RawPeriodKey {
    year: i32,
    month: u32,
}

impl TryFrom<RawPeriodKey> for PeriodKey {
    type Error = String;

    fn try_from(raw: RawPeriodKey) -> Result<Self, Self::Error> {
        if !(1..=12).contains(&raw.month) {
            return Err(format!("month {} is out of range 1..=12", raw.month));
        }
        Ok(Self {
            year: raw.year,
            month: raw.month,
        })
    }
}

impl PeriodKey {
    /// Panics when `month` is outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Self {
        assert!(
            (1..=12).contains(&month),
            "month {month} is out of range 1..=12"
        );
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following period. Crosses year boundaries without any reset:
    /// December rolls into January of the next year.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    pub fn start_date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("month validated at construction")
    }

    pub fn end_date(self) -> NaiveDate {
        self.next().start_date() - Duration::days(1)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Linear month index, used for window arithmetic.
    fn index(self) -> i32 {
        self.year * 12 + self.month as i32 - 1
    }

    /// Number of periods from `self` through `other`, inclusive.
    /// Zero when `other` precedes `self`.
    pub fn periods_through(self, other: PeriodKey) -> u32 {
        let span = other.index() - self.index() + 1;
        span.max(0) as u32
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Materialized per-period snapshot for the building.
///
/// The snapshot is a cache over the ledger: totals are maintained
/// incrementally while the period is open and recomputed from the entries
/// when the period closes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodBalance {
    pub period: PeriodKey,
    /// Charge magnitudes recorded within the period, net of reversals.
    pub total_charges: Decimal,
    /// Payments recorded within the period.
    pub total_payments: Decimal,
    /// Carry-in from the previous period, seeded when that period closes.
    pub previous_obligations: Decimal,
    /// Carry-out into the next period, computed at close.
    pub carry_forward: Decimal,
    pub closed: bool,
    /// Set when the previous period was reopened after this one had its
    /// carry-in seeded; the value must be recomputed before being trusted.
    #[serde(default)]
    pub carry_in_stale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PeriodBalance {
    pub fn new(period: PeriodKey) -> Self {
        Self {
            period,
            total_charges: Decimal::ZERO,
            total_payments: Decimal::ZERO,
            previous_obligations: Decimal::ZERO,
            carry_forward: Decimal::ZERO,
            closed: false,
            carry_in_stale: false,
            closed_at: None,
        }
    }

    /// Obligations the period must cover: carried-in debt plus the period's
    /// own charges.
    pub fn total_obligations(&self) -> Decimal {
        self.previous_obligations + self.total_charges
    }
}
