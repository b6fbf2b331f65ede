use crate::models::{Profile, ProfileId};
use crate::remote::{MemoryRemoteStore, RemoteError, RemoteStore};
use crate::schedule::ScheduleMap;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Memory-backed remote that records successful schedule writes and can be
/// switched into failing every call.
#[derive(Default)]
pub(crate) struct RecordingRemote {
    inner: MemoryRemoteStore,
    failing: AtomicBool,
    updates: Mutex<Vec<(ProfileId, ScheduleMap)>>,
    update_delays: Mutex<VecDeque<Duration>>,
    failing_delete: Mutex<Option<Duration>>,
}

impl RecordingRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        let remote = Self::default();
        remote.set_failing(true);
        remote
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn updates(&self) -> Vec<(ProfileId, ScheduleMap)> {
        self.updates.lock().clone()
    }

    /// Queues a delay for one upcoming schedule write. Writes consume the
    /// queue in call order.
    pub(crate) fn delay_next_update(&self, delay: Duration) {
        self.update_delays.lock().push_back(delay);
    }

    /// Makes profile deletes wait `delay` and then fail, while every other
    /// call keeps succeeding.
    pub(crate) fn fail_deletes_after(&self, delay: Duration) {
        *self.failing_delete.lock() = Some(delay);
    }

    pub(crate) fn inner(&self) -> &MemoryRemoteStore {
        &self.inner
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for RecordingRemote {
    async fn get_profiles(&self) -> Result<Vec<Profile>, RemoteError> {
        self.check()?;
        self.inner.get_profiles().await
    }

    async fn get_schedules(&self) -> Result<HashMap<ProfileId, ScheduleMap>, RemoteError> {
        self.check()?;
        self.inner.get_schedules().await
    }

    async fn add_profile(&self, profile: &Profile) -> Result<(), RemoteError> {
        self.check()?;
        self.inner.add_profile(profile).await
    }

    async fn update_schedule(&self, profile_id: &str, schedule: &ScheduleMap) -> Result<(), RemoteError> {
        self.check()?;
        let delay = self.update_delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.update_schedule(profile_id, schedule).await?;
        self.updates.lock().push((profile_id.to_string(), schedule.clone()));
        Ok(())
    }

    async fn delete_profile(&self, profile_id: &str) -> Result<(), RemoteError> {
        self.check()?;
        let failing_delete = *self.failing_delete.lock();
        if let Some(delay) = failing_delete {
            tokio::time::sleep(delay).await;
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        self.inner.delete_profile(profile_id).await
    }
}
