use chrono::{Datelike, Duration, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A displayed calendar month, stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarMonth(NaiveDate);

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self(date - Duration::days(i64::from(date.day0())))
    }

    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    /// Parses `YYYY-MM`.
    pub fn parse(value: &str) -> Option<Self> {
        let (year, month) = value.trim().split_once('-')?;
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        (28..=31)
            .rev()
            .find_map(|day| self.0.with_day(day))
            .unwrap_or(self.0)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last_day();
        self.0.iter_days().take_while(move |day| *day <= last)
    }

    /// Days of the month padded out to whole Sunday-first weeks, as laid out
    /// on a month grid.
    pub fn grid_days(&self) -> Vec<NaiveDate> {
        let first = self.first_day();
        let last = self.last_day();
        let start = first - Duration::days(i64::from(first.weekday().num_days_from_sunday()));
        let end = last + Duration::days(6 - i64::from(last.weekday().num_days_from_sunday()));
        start.iter_days().take_while(|day| *day <= end).collect()
    }

    pub fn next(self) -> Self {
        self.0.checked_add_months(Months::new(1)).map(Self).unwrap_or(self)
    }

    pub fn prev(self) -> Self {
        self.0.checked_sub_months(Months::new(1)).map(Self).unwrap_or(self)
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}
