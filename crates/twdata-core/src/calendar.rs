//! Trading calendar and exchange-local days.
//!
//! Reports are keyed by calendar day in Taipei time. [`exchange_day`] maps an
//! instant to that day so lookups for the same day always share one key.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use chrono_tz::Asia::Taipei;
use std::collections::BTreeSet;
use std::fmt::Debug;

/// How far back [`TradingCalendar::most_recent_open_at_or_before`] scans.
const MAX_SCAN_DAYS: usize = 366;

/// Calendar day in exchange-local time for an instant.
#[must_use]
pub fn exchange_day(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Taipei).date_naive()
}

/// Trading-day oracle.
pub trait TradingCalendar: Send + Sync + Debug {
    /// Whether the exchange is open on the given day.
    fn is_open(&self, year: i32, month: u32, day: u32) -> bool;

    /// The latest open day at or before `date`.
    ///
    /// Returns `None` if no open day exists within a year before `date`.
    fn most_recent_open_at_or_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        std::iter::successors(Some(date), NaiveDate::pred_opt)
            .take(MAX_SCAN_DAYS)
            .find(|d| self.is_open(d.year(), d.month(), d.day()))
    }

    /// The latest open day strictly before `date`.
    fn previous_open(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.most_recent_open_at_or_before(date.pred_opt()?)
    }
}

/// Calendar open Monday to Friday except for listed holidays.
#[derive(Clone, Debug, Default)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    /// Creates a calendar with no holidays.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a calendar with the given holidays.
    #[must_use]
    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Marks a day as closed.
    pub fn add_holiday(&mut self, day: NaiveDate) {
        self.holidays.insert(day);
    }

    /// Listed holidays in ascending order.
    pub fn holidays(&self) -> impl Iterator<Item = &NaiveDate> {
        self.holidays.iter()
    }
}

impl TradingCalendar for WeekdayCalendar {
    fn is_open(&self, year: i32, month: u32, day: u32) -> bool {
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            return false;
        };
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekends_closed() {
        let cal = WeekdayCalendar::new();
        assert!(cal.is_open(2024, 1, 5)); // Friday
        assert!(!cal.is_open(2024, 1, 6));
        assert!(!cal.is_open(2024, 1, 7));
        assert!(!cal.is_open(2024, 2, 30));
    }

    #[test]
    fn test_previous_open_skips_weekend_and_holiday() {
        let cal = WeekdayCalendar::with_holidays([d(2024, 1, 5)]);
        assert_eq!(cal.previous_open(d(2024, 1, 8)), Some(d(2024, 1, 4)));
        assert_eq!(cal.most_recent_open_at_or_before(d(2024, 1, 8)), Some(d(2024, 1, 8)));
        assert_eq!(cal.most_recent_open_at_or_before(d(2024, 1, 7)), Some(d(2024, 1, 4)));
    }

    #[test]
    fn test_exchange_day_uses_taipei_time() {
        // 17:30 UTC is 01:30 the next day in Taipei.
        let instant = Utc.with_ymd_and_hms(2024, 1, 4, 17, 30, 0).unwrap();
        assert_eq!(exchange_day(instant), d(2024, 1, 5));

        let morning = Utc.with_ymd_and_hms(2024, 1, 5, 2, 0, 0).unwrap();
        assert_eq!(exchange_day(morning), d(2024, 1, 5));
    }
}
