use crate::schedule::{DateStatus, ScheduleMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type ProfileId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfilesResponse {
    pub profiles: Vec<Profile>,
}

/// Schedules as they travel over the wire; keys may be any raw date text.
#[derive(Debug, Serialize, Deserialize)]
pub struct SchedulesResponse {
    pub schedules: HashMap<ProfileId, BTreeMap<String, DateStatus>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScheduleRequest {
    pub profile_id: ProfileId,
    pub schedule_data: ScheduleMap,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_rows: Option<usize>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            profile: None,
            deleted_rows: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionQuery {
    pub action: Option<String>,
    pub profile_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub profile_id: String,
    pub month: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub available: u32,
    pub unavailable: u32,
    pub unset: u32,
}

impl StatusCounts {
    pub fn record(&mut self, status: DateStatus) {
        match status {
            DateStatus::Available => self.available += 1,
            DateStatus::Unavailable => self.unavailable += 1,
            DateStatus::Unset => self.unset += 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    pub week: String,
    pub start_date: String,
    pub end_date: String,
    pub days_in_month: u8,
    pub counts: StatusCounts,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub profile_id: ProfileId,
    pub month: String,
    pub totals: StatusCounts,
    pub weeks: Vec<WeekSummary>,
}
