use crate::calendar::CalendarMonth;
use crate::date_key::DateKey;
use crate::models::{MonthSummary, StatusCounts, WeekSummary};
use crate::schedule::ScheduleMap;
use chrono::{Datelike, Duration, NaiveDate};

/// Counts statuses over the days of `month`, in total and per ISO week.
/// Weeks start on Monday; edge weeks only count the days inside the month.
pub fn build_month_summary(profile_id: &str, schedule: &ScheduleMap, month: CalendarMonth) -> MonthSummary {
    let mut totals = StatusCounts::default();
    let mut weeks: Vec<WeekSummary> = Vec::with_capacity(6);

    for date in month.days() {
        let status = schedule.get(&DateKey::from_date(date)).copied().unwrap_or_default();
        totals.record(status);

        let start = week_start(date);
        let label = week_label(start);
        if weeks.last().is_none_or(|week| week.week != label) {
            weeks.push(WeekSummary {
                week: label,
                start_date: start.to_string(),
                end_date: (start + Duration::days(6)).to_string(),
                days_in_month: 0,
                counts: StatusCounts::default(),
            });
        }
        if let Some(week) = weeks.last_mut() {
            week.days_in_month += 1;
            week.counts.record(status);
        }
    }

    MonthSummary {
        profile_id: profile_id.to_string(),
        month: month.to_string(),
        totals,
        weeks,
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}
