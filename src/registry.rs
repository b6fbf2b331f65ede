use crate::models::{Profile, ProfileId};
use crate::remote::{RemoteError, RemoteStore};
use crate::schedule::ScheduleMap;
use crate::sync::{FailurePolicy, SyncCoordinator};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const PROFILE_COLORS: [&str; 8] = [
    "#6366f1", // indigo
    "#ec4899", // pink
    "#10b981", // emerald
    "#f59e0b", // amber
    "#8b5cf6", // violet
    "#06b6d4", // cyan
    "#ef4444", // red
    "#84cc16", // lime
];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("profile name must not be empty")]
    EmptyName,
    #[error("unknown profile: {0}")]
    UnknownProfile(ProfileId),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// First palette color no existing profile uses, or the first color once
/// the palette is exhausted.
pub fn next_color(profiles: &[Profile]) -> &'static str {
    PROFILE_COLORS
        .iter()
        .copied()
        .find(|color| !profiles.iter().any(|profile| profile.color == *color))
        .unwrap_or(PROFILE_COLORS[0])
}

pub fn generate_profile_id() -> ProfileId {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("profile_{}_{}", Utc::now().timestamp_millis(), suffix)
}

#[derive(Debug, Default)]
struct RegistryState {
    profiles: Vec<Profile>,
    current: Option<ProfileId>,
}

/// Ordered profile list plus the current-profile pointer.
///
/// Adding and removing profiles is optimistic: the local list changes first
/// and is restored if the remote store refuses the change. Schedules live in
/// the [`SyncCoordinator`].
pub struct ProfileRegistry {
    remote: Arc<dyn RemoteStore>,
    coordinator: Arc<SyncCoordinator>,
    state: Mutex<RegistryState>,
}

impl ProfileRegistry {
    pub const FAILURE_POLICY: FailurePolicy = FailurePolicy::RollbackOnFailure;

    pub fn new(remote: Arc<dyn RemoteStore>, coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            remote,
            coordinator,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Fetches profiles and schedules in parallel. Whichever half succeeds
    /// is applied even if the other fails.
    pub async fn load(&self) -> Result<(), RemoteError> {
        self.coordinator.report_syncing();
        let (profiles, schedules) = tokio::join!(self.remote.get_profiles(), self.remote.get_schedules());

        let mut failure = None;
        match profiles {
            Ok(profiles) => {
                info!(count = profiles.len(), "loaded profiles");
                let mut state = self.state.lock();
                if let Some(current) = state.current.clone() {
                    if !profiles.iter().any(|profile| profile.id == current) {
                        state.current = None;
                    }
                }
                state.profiles = profiles;
            }
            Err(err) => {
                warn!(error = %err, "failed to load profiles");
                failure = Some(err);
            }
        }
        match schedules {
            Ok(schedules) => {
                info!(count = schedules.len(), "loaded schedules");
                self.coordinator.replace_schedules(schedules);
            }
            Err(err) => {
                warn!(error = %err, "failed to load schedules");
                failure.get_or_insert(err);
            }
        }

        match failure {
            Some(err) => {
                self.coordinator.report_failure(&err);
                Err(err)
            }
            None => {
                self.coordinator.report_success();
                Ok(())
            }
        }
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.state.lock().profiles.clone()
    }

    pub fn profile(&self, profile_id: &str) -> Option<Profile> {
        self.state
            .lock()
            .profiles
            .iter()
            .find(|profile| profile.id == profile_id)
            .cloned()
    }

    pub fn current_profile_id(&self) -> Option<ProfileId> {
        self.state.lock().current.clone()
    }

    pub fn current_profile(&self) -> Option<Profile> {
        let state = self.state.lock();
        let current = state.current.as_deref()?;
        state.profiles.iter().find(|profile| profile.id == current).cloned()
    }

    pub fn schedule(&self, profile_id: &str) -> ScheduleMap {
        self.coordinator.schedule(profile_id)
    }

    pub async fn add_profile(&self, name: &str) -> Result<Profile, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let profile = {
            let mut state = self.state.lock();
            let profile = Profile {
                id: generate_profile_id(),
                name: name.to_string(),
                color: next_color(&state.profiles).to_string(),
            };
            state.profiles.push(profile.clone());
            profile
        };
        self.coordinator.insert_schedule(&profile.id, ScheduleMap::new());

        self.coordinator.report_syncing();
        let result = self.remote.add_profile(&profile).await;
        let result = Self::FAILURE_POLICY.settle(result, || {
            self.state.lock().profiles.retain(|existing| existing.id != profile.id);
            self.coordinator.remove_schedule(&profile.id);
        });

        match result {
            Ok(()) => {
                info!(profile_id = %profile.id, name = %profile.name, "profile added");
                self.coordinator.report_success();
                Ok(profile)
            }
            Err(err) => {
                warn!(profile_id = %profile.id, error = %err, "profile add failed; rolled back");
                self.coordinator.report_failure(&err);
                Err(err.into())
            }
        }
    }

    pub async fn remove_profile(&self, profile_id: &str) -> Result<(), RegistryError> {
        let profiles_before = self.state.lock().profiles.clone();

        {
            let mut state = self.state.lock();
            state.profiles.retain(|profile| profile.id != profile_id);
            if state.current.as_deref() == Some(profile_id) {
                state.current = None;
            }
        }
        let schedule_before = self.coordinator.remove_schedule(profile_id);

        self.coordinator.report_syncing();
        let result = self.remote.delete_profile(profile_id).await;
        let result = Self::FAILURE_POLICY.settle(result, || {
            self.state.lock().profiles = profiles_before;
            // only the removed profile's map; other profiles keep edits made meanwhile
            if let Some(schedule) = schedule_before {
                self.coordinator.insert_schedule(profile_id, schedule);
            }
        });

        match result {
            Ok(()) => {
                info!(profile_id, "profile removed");
                self.coordinator.report_success();
                Ok(())
            }
            Err(err) => {
                warn!(profile_id, error = %err, "profile removal failed; restored");
                self.coordinator.report_failure(&err);
                Err(err.into())
            }
        }
    }

    pub fn select_profile(&self, profile_id: &str) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if !state.profiles.iter().any(|profile| profile.id == profile_id) {
            return Err(RegistryError::UnknownProfile(profile_id.to_string()));
        }
        state.current = Some(profile_id.to_string());
        info!(profile_id, "profile selected");
        Ok(())
    }

    pub fn deselect_profile(&self) {
        self.state.lock().current = None;
    }
}
