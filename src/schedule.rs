use crate::calendar::CalendarMonth;
use crate::date_key::{DateInput, DateKey, normalize};
use crate::selection::SelectionEngine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Availability of a single day. Absent entries read as `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateStatus {
    #[default]
    #[serde(rename = "unset")]
    Unset,
    #[serde(rename = "ok", alias = "available")]
    Available,
    #[serde(rename = "ng", alias = "unavailable")]
    Unavailable,
}

impl DateStatus {
    pub fn is_set(self) -> bool {
        self != DateStatus::Unset
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DateStatus::Unset => "unset",
            DateStatus::Available => "ok",
            DateStatus::Unavailable => "ng",
        }
    }
}

impl fmt::Display for DateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ScheduleMap = BTreeMap<DateKey, DateStatus>;

pub type ChangeHook = Box<dyn FnMut(&ScheduleMap) + Send>;

/// Re-keys every entry through the normalizer. When two raw keys land on the
/// same day, the later one in iteration order wins.
pub fn normalize_map<K, I>(entries: I) -> ScheduleMap
where
    K: Into<DateInput>,
    I: IntoIterator<Item = (K, DateStatus)>,
{
    entries
        .into_iter()
        .map(|(key, status)| (normalize(key), status))
        .collect()
}

/// Pretty JSON of the entries that carry an explicit status.
pub fn export_json(map: &ScheduleMap) -> Result<String, serde_json::Error> {
    let set: BTreeMap<&DateKey, DateStatus> = map
        .iter()
        .filter(|(_, status)| status.is_set())
        .map(|(key, status)| (key, *status))
        .collect();
    serde_json::to_string_pretty(&set)
}

/// One profile's day statuses plus the batch edits the calendar controls
/// perform on them. Every edit hands the full resulting map to the
/// registered change hook before returning.
#[derive(Default)]
pub struct ScheduleStore {
    map: ScheduleMap,
    on_change: Option<ChangeHook>,
}

impl fmt::Debug for ScheduleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleStore")
            .field("map", &self.map)
            .field("has_hook", &self.on_change.is_some())
            .finish()
    }
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(map: ScheduleMap) -> Self {
        Self {
            map: normalize_map(map),
            on_change: None,
        }
    }

    pub fn on_change(&mut self, hook: impl FnMut(&ScheduleMap) + Send + 'static) {
        self.on_change = Some(Box::new(hook));
    }

    pub fn map(&self) -> &ScheduleMap {
        &self.map
    }

    pub fn status_of(&self, date: impl Into<DateInput>) -> DateStatus {
        self.map.get(&normalize(date)).copied().unwrap_or_default()
    }

    /// Sets `status` on every selected day inside the displayed month.
    /// Without a selection this is a no-op and the hook is not called.
    pub fn apply_status_to_selection(&mut self, selection: &SelectionEngine, status: DateStatus) {
        let Some(range) = selection.range() else {
            return;
        };
        let month = selection.month();
        for day in range.days().filter(|day| month.contains(*day)) {
            self.map.insert(normalize(day), status);
        }
        self.notify();
    }

    /// Fills every day of `month` that has no explicit status.
    pub fn update_unset_all(&mut self, month: CalendarMonth, status: DateStatus) {
        for day in month.days() {
            let entry = self.map.entry(normalize(day)).or_default();
            if !entry.is_set() {
                *entry = status;
            }
        }
        self.notify();
    }

    /// Resets a single day to `Unset`, whatever it held before.
    pub fn clear_date(&mut self, date: impl Into<DateInput>) {
        self.map.insert(normalize(date), DateStatus::Unset);
        self.notify();
    }

    fn notify(&mut self) {
        if let Some(hook) = self.on_change.as_mut() {
            hook(&self.map);
        }
    }
}
