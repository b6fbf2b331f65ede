use crate::models::{Profile, ProfileId};
use crate::rows::RowStore;
use crate::schedule::{ScheduleMap, normalize_map};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store request failed: {0}")]
    Transport(String),
    #[error("remote store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed remote store payload: {0}")]
    Malformed(String),
    #[error("remote store rejected the request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// Request/response access to the shared profile and schedule rows.
///
/// Implementations hand back canonical date keys and accept only canonical
/// keys; schedule writes replace the profile's rows wholesale.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get_profiles(&self) -> Result<Vec<Profile>, RemoteError>;

    async fn get_schedules(&self) -> Result<HashMap<ProfileId, ScheduleMap>, RemoteError>;

    async fn add_profile(&self, profile: &Profile) -> Result<(), RemoteError>;

    async fn update_schedule(&self, profile_id: &str, schedule: &ScheduleMap) -> Result<(), RemoteError>;

    async fn delete_profile(&self, profile_id: &str) -> Result<(), RemoteError>;
}

/// In-process store over a [`RowStore`], for local use and tests.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    rows: Mutex<RowStore>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: RowStore) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn rows(&self) -> RowStore {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get_profiles(&self) -> Result<Vec<Profile>, RemoteError> {
        Ok(self.rows.lock().get_profiles())
    }

    async fn get_schedules(&self) -> Result<HashMap<ProfileId, ScheduleMap>, RemoteError> {
        Ok(self.rows.lock().get_schedules())
    }

    async fn add_profile(&self, profile: &Profile) -> Result<(), RemoteError> {
        self.rows.lock().add_profile(profile.clone());
        Ok(())
    }

    async fn update_schedule(&self, profile_id: &str, schedule: &ScheduleMap) -> Result<(), RemoteError> {
        let schedule = normalize_map(schedule.clone());
        self.rows.lock().update_schedule(profile_id, &schedule);
        Ok(())
    }

    async fn delete_profile(&self, profile_id: &str) -> Result<(), RemoteError> {
        self.rows.lock().delete_profile(profile_id);
        Ok(())
    }
}
