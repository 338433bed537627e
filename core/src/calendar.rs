//! Calendar arithmetic for demand windows and the order calendar.
//!
//! Month and year shifts overflow into the following month when the target
//! day does not exist (31 March minus one month is 3 March, 29 February minus
//! one year is 1 March). Window boundaries and month buckets rely on this.

use crate::error::{RopError, RopResult};
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Shift `date` by a signed number of calendar months, overflowing excess days.
pub fn shift_months(date: NaiveDate, months: i32) -> RopResult<NaiveDate> {
    let offset = Duration::days(i64::from(date.day0()));
    let first = date - offset;
    let shifted = if months >= 0 {
        first.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        first.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted
        .map(|d| d + offset)
        .ok_or(RopError::DateOutOfRange { date, months })
}

/// Shift `date` by a signed number of years (12 months each).
pub fn shift_years(date: NaiveDate, years: i32) -> RopResult<NaiveDate> {
    shift_months(date, years.saturating_mul(12))
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// Midnight at the start of `date`.
pub fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Midnight at the start of the day after `date`; exclusive upper bound for "through `date`".
pub fn day_end_exclusive(date: NaiveDate) -> NaiveDateTime {
    day_start(date + Duration::days(1))
}

/// The Monday on or after `date`.
pub fn monday_on_or_after(date: NaiveDate) -> NaiveDate {
    let from_monday = i64::from(date.weekday().num_days_from_monday());
    date + Duration::days((7 - from_monday) % 7)
}

/// Orders go out twice a week: Monday is followed by Thursday,
/// anything else by the next Monday four days later.
pub fn next_order_date(today: NaiveDate) -> NaiveDate {
    let step = if today.weekday() == Weekday::Mon { 3 } else { 4 };
    today + Duration::days(step)
}
