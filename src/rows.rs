use crate::date_key::{DateInput, DateKey, normalize};
use crate::models::{Profile, ProfileId};
use crate::schedule::{DateStatus, ScheduleMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One stored schedule cell. `date` is kept exactly as written, which may be
/// text in any format or a numeric timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub profile_id: ProfileId,
    pub date: Value,
    pub status: DateStatus,
}

impl ScheduleRow {
    fn normalized_date(&self) -> Option<DateKey> {
        match &self.date {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            raw => Some(normalize(DateInput::from(raw))),
        }
    }
}

/// Append-ordered profile and schedule rows backing the reference store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowStore {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub schedules: Vec<ScheduleRow>,
}

impl RowStore {
    pub fn get_profiles(&self) -> Vec<Profile> {
        self.profiles
            .iter()
            .filter(|profile| !profile.id.is_empty())
            .cloned()
            .collect()
    }

    /// Folds rows in write order so the latest row for a normalized day wins.
    pub fn get_schedules(&self) -> HashMap<ProfileId, ScheduleMap> {
        let mut schedules: HashMap<ProfileId, ScheduleMap> = HashMap::new();
        for row in &self.schedules {
            if row.profile_id.is_empty() {
                continue;
            }
            let Some(date) = row.normalized_date() else {
                continue;
            };
            schedules
                .entry(row.profile_id.clone())
                .or_default()
                .insert(date, row.status);
        }
        schedules
    }

    pub fn add_profile(&mut self, profile: Profile) {
        match self.profiles.iter_mut().find(|existing| existing.id == profile.id) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    /// Replaces every row of the profile with the set entries of `schedule`.
    pub fn update_schedule(&mut self, profile_id: &str, schedule: &ScheduleMap) {
        self.schedules.retain(|row| row.profile_id != profile_id);
        self.schedules.extend(
            schedule
                .iter()
                .filter(|(_, status)| status.is_set())
                .map(|(date, status)| ScheduleRow {
                    profile_id: profile_id.to_string(),
                    date: Value::String(normalize(date).into_string()),
                    status: *status,
                }),
        );
    }

    /// Removes the profile and all of its schedule rows. Returns whether
    /// anything was removed.
    pub fn delete_profile(&mut self, profile_id: &str) -> bool {
        let before = self.profiles.len() + self.schedules.len();
        self.profiles.retain(|profile| profile.id != profile_id);
        self.schedules.retain(|row| row.profile_id != profile_id);
        before != self.profiles.len() + self.schedules.len()
    }

    /// Drops older rows that share a profile and normalized day with a later
    /// one. Returns the number of rows removed.
    pub fn clean_duplicates(&mut self) -> usize {
        let mut latest: HashMap<(ProfileId, Option<DateKey>), usize> = HashMap::new();
        for (idx, row) in self.schedules.iter().enumerate() {
            latest.insert((row.profile_id.clone(), row.normalized_date()), idx);
        }

        let before = self.schedules.len();
        let mut idx = 0;
        self.schedules.retain(|row| {
            let keep = latest.get(&(row.profile_id.clone(), row.normalized_date())) == Some(&idx);
            idx += 1;
            keep
        });
        before - self.schedules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::normalize_map;
    use serde_json::json;

    fn row(profile_id: &str, date: Value, status: DateStatus) -> ScheduleRow {
        ScheduleRow {
            profile_id: profile_id.to_string(),
            date,
            status,
        }
    }

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.to_string(),
            name: id.to_uppercase(),
            color: "#6366f1".to_string(),
        }
    }

    #[test]
    fn later_row_wins_across_raw_formats() {
        let store = RowStore {
            profiles: vec![profile("p1")],
            schedules: vec![
                row("p1", json!("2024-03-05"), DateStatus::Available),
                row("p1", json!("2024-03-05T00:00:00.000Z"), DateStatus::Unavailable),
                row("p1", json!("2024-03-06"), DateStatus::Available),
            ],
        };

        let schedules = store.get_schedules();
        let p1 = &schedules["p1"];
        assert_eq!(p1.len(), 2);
        assert_eq!(p1.get("2024-03-05"), Some(&DateStatus::Unavailable));
    }

    #[test]
    fn rows_without_profile_or_date_are_skipped() {
        let store = RowStore {
            profiles: vec![],
            schedules: vec![
                row("", json!("2024-03-05"), DateStatus::Available),
                row("p1", Value::Null, DateStatus::Available),
                row("p1", json!(""), DateStatus::Available),
            ],
        };
        assert!(store.get_schedules().is_empty());
    }

    #[test]
    fn update_replaces_all_rows_and_drops_unset() {
        let mut store = RowStore {
            profiles: vec![profile("p1"), profile("p2")],
            schedules: vec![
                row("p1", json!("2024-03-01T00:00:00Z"), DateStatus::Available),
                row("p2", json!("2024-03-01"), DateStatus::Unavailable),
            ],
        };

        let map = normalize_map([
            ("2024-03-02", DateStatus::Available),
            ("2024-03-03", DateStatus::Unset),
        ]);
        store.update_schedule("p1", &map);

        let p1_rows: Vec<_> = store.schedules.iter().filter(|r| r.profile_id == "p1").collect();
        assert_eq!(p1_rows.len(), 1);
        assert_eq!(p1_rows[0].date, json!("2024-03-02"));
        assert_eq!(store.schedules.iter().filter(|r| r.profile_id == "p2").count(), 1);
    }

    #[test]
    fn delete_removes_profile_and_rows() {
        let mut store = RowStore {
            profiles: vec![profile("p1"), profile("p2")],
            schedules: vec![row("p1", json!("2024-03-01"), DateStatus::Available)],
        };
        assert!(store.delete_profile("p1"));
        assert_eq!(store.get_profiles(), vec![profile("p2")]);
        assert!(store.schedules.is_empty());
        assert!(!store.delete_profile("p1"));
    }

    #[test]
    fn adding_existing_id_updates_in_place() {
        let mut store = RowStore::default();
        store.add_profile(profile("p1"));
        let mut renamed = profile("p1");
        renamed.name = "Renamed".to_string();
        store.add_profile(renamed.clone());
        assert_eq!(store.get_profiles(), vec![renamed]);
    }

    #[test]
    fn clean_duplicates_keeps_latest_row() {
        let mut store = RowStore {
            profiles: vec![],
            schedules: vec![
                row("p1", json!("2024-03-05"), DateStatus::Available),
                row("p2", json!("2024-03-05"), DateStatus::Available),
                row("p1", json!(1_709_596_800_000_i64), DateStatus::Unavailable),
                row("p1", json!("2024-03-07"), DateStatus::Available),
            ],
        };

        assert_eq!(store.clean_duplicates(), 1);
        assert_eq!(store.schedules.len(), 3);
        assert_eq!(store.get_schedules()["p1"].get("2024-03-05"), Some(&DateStatus::Unavailable));
        assert_eq!(store.clean_duplicates(), 0);
    }
}
