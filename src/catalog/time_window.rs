//! Calendar-month search windows

use chrono::{Datelike, NaiveDate};
use std::fmt;

use crate::error::{ChipError, ChipResult};

/// One calendar month as a half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub year: i32,
    pub month: u32,
    pub start: NaiveDate,
    /// First day of the following month
    pub end: NaiveDate,
}

impl TimeWindow {
    /// Window covering `month` (1-12) of `year` (1000-9999)
    pub fn month(year: i32, month: u32) -> ChipResult<Self> {
        if !(1000..=9999).contains(&year) {
            return Err(ChipError::InvalidInput(format!("Year {} is outside 1000-9999", year)));
        }
        if !(1..=12).contains(&month) {
            return Err(ChipError::InvalidInput(format!("Month {} is outside 1-12", month)));
        }

        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let start = NaiveDate::from_ymd_opt(year, month, 1);
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1);
        match (start, end) {
            (Some(start), Some(end)) => Ok(TimeWindow { year, month, start, end }),
            _ => Err(ChipError::InvalidInput(format!("Invalid month {}-{:02}", year, month))),
        }
    }

    /// The twelve windows of a year, January first
    pub fn year(year: i32) -> ChipResult<Vec<Self>> {
        (1..=12).map(|month| Self::month(year, month)).collect()
    }

    /// ISO 8601 interval in the form STAC `datetime` expects
    pub fn to_stac_interval(&self) -> String {
        format!(
            "{}T00:00:00Z/{}T00:00:00Z",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }

    /// Whether a date falls inside the window
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Number of days covered
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.start.year(), self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_interval() {
        let window = TimeWindow::month(2020, 3).unwrap();
        assert_eq!(window.to_stac_interval(), "2020-03-01T00:00:00Z/2020-04-01T00:00:00Z");
        assert_eq!(window.days(), 31);
        assert_eq!(window.to_string(), "2020-03");
    }

    #[test]
    fn test_december_rolls_year() {
        let window = TimeWindow::month(2019, 12).unwrap();
        assert_eq!(window.to_stac_interval(), "2019-12-01T00:00:00Z/2020-01-01T00:00:00Z");
    }

    #[test]
    fn test_leap_february() {
        assert_eq!(TimeWindow::month(2020, 2).unwrap().days(), 29);
        assert_eq!(TimeWindow::month(2021, 2).unwrap().days(), 28);
    }

    #[test]
    fn test_contains_is_half_open() {
        let window = TimeWindow::month(2021, 6).unwrap();
        assert!(window.contains(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()));
        assert!(window.contains(NaiveDate::from_ymd_opt(2021, 6, 30).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2021, 7, 1).unwrap()));
    }

    #[test]
    fn test_out_of_range() {
        assert!(TimeWindow::month(2020, 0).is_err());
        assert!(TimeWindow::month(2020, 13).is_err());
        assert!(TimeWindow::month(999, 1).is_err());
        assert!(TimeWindow::month(10000, 1).is_err());
        assert_eq!(TimeWindow::year(2022).unwrap().len(), 12);
    }
}
