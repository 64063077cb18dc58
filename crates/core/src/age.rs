//! Age derivation from date of birth.

use crate::constants::DATE_INPUT_FORMAT;
use chrono::{Datelike, NaiveDate};

/// Parses a `YYYY-MM-DD` date as typed into the form.
pub fn parse_date_input(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_INPUT_FORMAT).ok()
}

/// Whole calendar years elapsed between `dob` and `today`.
///
/// The year difference is decremented by one when today's month/day precedes the birth
/// month/day. Negative when `dob` is after `today`.
pub fn completed_years(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years
}

/// The value the derived `age` field takes for a given date of birth.
///
/// Returns `None` (empty age) when the computed age is zero or negative.
pub fn derived_age(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    u32::try_from(completed_years(dob, today))
        .ok()
        .filter(|years| *years > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn exactly_n_years_yields_n() {
        let today = date(2026, 10, 19);
        assert_eq!(derived_age(date(1990, 10, 19), today), Some(36));
        assert_eq!(derived_age(date(2025, 10, 19), today), Some(1));
    }

    #[test]
    fn one_day_short_of_n_years_yields_n_minus_one() {
        let today = date(2026, 10, 19);
        assert_eq!(derived_age(date(1990, 10, 20), today), Some(35));
        assert_eq!(derived_age(date(1990, 11, 1), today), Some(35));
    }

    #[test]
    fn under_one_year_is_empty() {
        let today = date(2026, 10, 19);
        assert_eq!(derived_age(date(2026, 1, 1), today), None);
        assert_eq!(derived_age(today, today), None);
        assert_eq!(derived_age(date(2025, 10, 20), today), None);
    }

    #[test]
    fn future_dob_is_empty() {
        let today = date(2026, 10, 19);
        assert_eq!(completed_years(date(2027, 1, 1), today), -1);
        assert_eq!(derived_age(date(2027, 1, 1), today), None);
    }

    #[test]
    fn leap_day_birthdays_count_from_march_in_common_years() {
        let dob = date(2000, 2, 29);
        assert_eq!(derived_age(dob, date(2025, 2, 28)), Some(24));
        assert_eq!(derived_age(dob, date(2025, 3, 1)), Some(25));
        assert_eq!(derived_age(dob, date(2028, 2, 29)), Some(28));
    }

    #[test]
    fn parse_date_input_accepts_iso_dates_only() {
        assert_eq!(parse_date_input(" 1990-05-17 "), Some(date(1990, 5, 17)));
        assert_eq!(parse_date_input("17/05/1990"), None);
        assert_eq!(parse_date_input("1990-02-30"), None);
        assert_eq!(parse_date_input(""), None);
    }
}
