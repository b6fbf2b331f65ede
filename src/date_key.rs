use chrono::{DateTime, Duration, FixedOffset, Local, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{borrow::Borrow, fmt};
use tracing::debug;

const KEY_FORMAT: &str = "%Y-%m-%d";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%m/%d/%Y", "%b %d %Y", "%B %d, %Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Canonical `YYYY-MM-DD` identifier of a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(String);

impl DateKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(KEY_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_canonical(&self) -> bool {
        is_canonical(&self.0)
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.0, KEY_FORMAT).ok()
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DateKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self::from_date(date)
    }
}

/// Which clock decides the calendar day of an instant.
///
/// Plain dates and wall-clock date-times carry their day directly; only
/// values that pin an instant (epoch numbers, timestamps with an offset)
/// depend on the basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBasis {
    #[default]
    Utc,
    Local,
}

impl DayBasis {
    fn day_of(self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            DayBasis::Utc => instant.date_naive(),
            DayBasis::Local => instant.with_timezone(&Local).date_naive(),
        }
    }
}

/// Every shape a date can arrive in before it becomes a [`DateKey`].
#[derive(Debug, Clone, PartialEq)]
pub enum DateInput {
    Text(String),
    EpochMillis(i64),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    NaiveDateTime(NaiveDateTime),
    /// Calendar fields with a zero-based month. Out-of-range months and days
    /// roll over into the following month or year.
    Parts { year: i32, month_index: u32, day: u32 },
}

impl DateInput {
    pub fn to_date(&self, basis: DayBasis) -> Option<NaiveDate> {
        match self {
            DateInput::Text(text) => parse_text(text.trim(), basis),
            DateInput::EpochMillis(millis) => {
                DateTime::<Utc>::from_timestamp_millis(*millis).map(|instant| basis.day_of(instant))
            }
            DateInput::Date(date) => Some(*date),
            DateInput::DateTime(value) => Some(basis.day_of(value.with_timezone(&Utc))),
            DateInput::NaiveDateTime(value) => Some(value.date()),
            DateInput::Parts {
                year,
                month_index,
                day,
            } => from_parts(*year, *month_index, *day),
        }
    }
}

impl fmt::Display for DateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateInput::Text(text) => f.write_str(text),
            DateInput::EpochMillis(millis) => write!(f, "{millis}"),
            DateInput::Date(date) => write!(f, "{}", date.format(KEY_FORMAT)),
            DateInput::DateTime(value) => f.write_str(&value.to_rfc3339()),
            DateInput::NaiveDateTime(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S")),
            DateInput::Parts {
                year,
                month_index,
                day,
            } => write!(f, "{year}/{month_index}/{day}"),
        }
    }
}

impl From<&str> for DateInput {
    fn from(value: &str) -> Self {
        DateInput::Text(value.to_string())
    }
}

impl From<String> for DateInput {
    fn from(value: String) -> Self {
        DateInput::Text(value)
    }
}

impl From<&String> for DateInput {
    fn from(value: &String) -> Self {
        DateInput::Text(value.clone())
    }
}

impl From<DateKey> for DateInput {
    fn from(value: DateKey) -> Self {
        DateInput::Text(value.0)
    }
}

impl From<&DateKey> for DateInput {
    fn from(value: &DateKey) -> Self {
        DateInput::Text(value.0.clone())
    }
}

impl From<i64> for DateInput {
    fn from(value: i64) -> Self {
        DateInput::EpochMillis(value)
    }
}

impl From<NaiveDate> for DateInput {
    fn from(value: NaiveDate) -> Self {
        DateInput::Date(value)
    }
}

impl From<NaiveDateTime> for DateInput {
    fn from(value: NaiveDateTime) -> Self {
        DateInput::NaiveDateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for DateInput {
    fn from(value: DateTime<FixedOffset>) -> Self {
        DateInput::DateTime(value)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(value: DateTime<Utc>) -> Self {
        DateInput::DateTime(value.fixed_offset())
    }
}

impl From<&Value> for DateInput {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(text) => DateInput::Text(text.clone()),
            Value::Number(number) => match number.as_i64() {
                Some(millis) => DateInput::EpochMillis(millis),
                None => DateInput::Text(number.to_string()),
            },
            other => DateInput::Text(other.to_string()),
        }
    }
}

/// Normalizes any date representation to a canonical key, reading instants
/// on the UTC calendar.
pub fn normalize(value: impl Into<DateInput>) -> DateKey {
    normalize_with(value, DayBasis::Utc)
}

/// Normalizes with an explicit day basis.
///
/// Canonical text is returned untouched; anything unparsable is kept as its
/// string form so the caller never fails on a bad date.
pub fn normalize_with(value: impl Into<DateInput>, basis: DayBasis) -> DateKey {
    let input = value.into();
    if let DateInput::Text(text) = &input {
        if is_canonical(text) {
            return DateKey(text.clone());
        }
    }

    match input.to_date(basis) {
        Some(date) => DateKey::from_date(date),
        None => {
            let raw = input.to_string();
            debug!(raw = %raw, "unparsable date value kept as raw key");
            DateKey(raw)
        }
    }
}

pub fn is_canonical(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(idx, byte)| match idx {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

fn parse_text(text: &str, basis: DayBasis) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }

    if text.len() >= 10 && text.bytes().all(|byte| byte.is_ascii_digit()) {
        return text
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|instant| basis.day_of(instant));
    }

    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(basis.day_of(value.with_timezone(&Utc)));
    }
    if let Ok(value) = DateTime::parse_from_rfc2822(text) {
        return Some(basis.day_of(value.with_timezone(&Utc)));
    }
    if let Some(value) = parse_js_date_string(text) {
        return Some(basis.day_of(value.with_timezone(&Utc)));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|value| value.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        })
}

// "Tue Mar 05 2024 00:00:00 GMT+0900 (Japan Standard Time)"
fn parse_js_date_string(text: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = match text.find(" (") {
        Some(idx) => &text[..idx],
        None => text,
    };
    DateTime::parse_from_str(trimmed, "%a %b %d %Y %H:%M:%S GMT%z").ok()
}

fn from_parts(year: i32, month_index: u32, day: u32) -> Option<NaiveDate> {
    let first_of_year = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let first_of_month = first_of_year.checked_add_months(Months::new(month_index))?;
    first_of_month.checked_add_signed(Duration::days(i64::from(day) - 1))
}
