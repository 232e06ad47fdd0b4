//! Reporting period derivation and validation.

use crate::error::AutomationError;
use chrono::{Datelike, Local, NaiveDate};

/// One reporting month, the unit every portal filter operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterPeriod {
    /// Four-digit year.
    pub year: i32,
    /// Month in `[1, 12]`.
    pub month: u32,
}

impl FilterPeriod {
    /// Creates a period, rejecting months outside `[1, 12]`.
    pub const fn new(year: i32, month: u32) -> Result<Self, AutomationError> {
        if month < 1 || month > 12 {
            return Err(AutomationError::InvalidPeriod { month });
        }
        Ok(Self { year, month })
    }

    /// The calendar month preceding `today`; January rolls back to
    /// December of the previous year.
    pub fn previous_month(today: NaiveDate) -> Self {
        if today.month() == 1 {
            Self {
                year: today.year() - 1,
                month: 12,
            }
        } else {
            Self {
                year: today.year(),
                month: today.month() - 1,
            }
        }
    }

    /// Resolves an optionally supplied year/month pair.
    ///
    /// With neither supplied, defaults to the month before the current
    /// wall-clock date. An explicit month is validated; an explicit year
    /// without a month pairs with the default month of the previous period.
    pub fn resolve(year: Option<i32>, month: Option<u32>) -> Result<Self, AutomationError> {
        let default = Self::previous_month(Local::now().date_naive());
        match (year, month) {
            (None, None) => Ok(default),
            (y, m) => Self::new(y.unwrap_or(default.year), m.unwrap_or(default.month)),
        }
    }

    /// Zero-padded month, e.g. `"03"`.
    pub fn month_padded(&self) -> String {
        format!("{:02}", self.month)
    }

    /// Concatenated `YYYYMM` token used by the analysis dropdowns.
    pub fn token(&self) -> String {
        format!("{}{:02}", self.year, self.month)
    }

    /// First day of the period month.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn previous_month_mid_year() {
        let p = FilterPeriod::previous_month(date(2024, 11, 15));
        assert_eq!(p, FilterPeriod { year: 2024, month: 10 });
        assert_eq!(p.token(), "202410");
        assert_eq!(p.month_padded(), "10");
    }

    #[test]
    fn january_rolls_to_prior_december() {
        let p = FilterPeriod::previous_month(date(2025, 1, 3));
        assert_eq!(p, FilterPeriod { year: 2024, month: 12 });
        assert_eq!(p.token(), "202412");
    }

    #[test]
    fn every_month_rolls_back_by_one() {
        for m in 2..=12 {
            let p = FilterPeriod::previous_month(date(2024, m, 1));
            assert_eq!(p.month, m - 1);
            assert_eq!(p.year, 2024);
        }
    }

    #[test]
    fn month_zero_rejected() {
        assert!(matches!(
            FilterPeriod::new(2024, 0),
            Err(AutomationError::InvalidPeriod { month: 0 })
        ));
    }

    #[test]
    fn month_thirteen_rejected() {
        assert!(matches!(
            FilterPeriod::resolve(Some(2024), Some(13)),
            Err(AutomationError::InvalidPeriod { month: 13 })
        ));
    }

    #[test]
    fn explicit_pair_accepted() {
        let p = FilterPeriod::resolve(Some(2023), Some(7)).unwrap();
        assert_eq!(p.token(), "202307");
        assert_eq!(p.month_padded(), "07");
    }
}
