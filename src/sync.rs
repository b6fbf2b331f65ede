//! Debounced, optimistic persistence of per-profile schedules.
//!
//! Local edits land in memory immediately. Each profile owns one trailing
//! debounce timer; a new edit restarts it, and when it finally fires the
//! profile's whole current map is written to the remote store. A failed
//! write leaves the local map untouched and surfaces through [`SyncState`].

use crate::models::ProfileId;
use crate::remote::{RemoteError, RemoteStore};
use crate::schedule::{ScheduleMap, normalize_map};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Error,
}

/// Observable sync indicator. `error` holds the detail of the last failure
/// while `status` is `Error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub status: SyncStatus,
    pub error: Option<String>,
}

/// What a failed remote call does to the optimistic local change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Restore the pre-mutation snapshot.
    RollbackOnFailure,
    /// Keep the local change as the source of truth until the next write.
    RetainOnFailure,
}

impl FailurePolicy {
    /// Runs `rollback` if `result` is an error and the policy calls for it.
    pub fn settle<T, E>(self, result: Result<T, E>, rollback: impl FnOnce()) -> Result<T, E> {
        if result.is_err() && self == FailurePolicy::RollbackOnFailure {
            rollback();
        }
        result
    }
}

struct PendingWrite {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TimerRegistry {
    next_generation: u64,
    pending: HashMap<ProfileId, PendingWrite>,
    in_flight: usize,
}

impl TimerRegistry {
    fn is_busy(&self) -> bool {
        !self.pending.is_empty() || self.in_flight > 0
    }
}

struct InFlight<'a>(&'a Mutex<TimerRegistry>);

impl<'a> InFlight<'a> {
    fn enter(timers: &'a Mutex<TimerRegistry>) -> Self {
        timers.lock().in_flight += 1;
        Self(timers)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.lock().in_flight -= 1;
    }
}

/// State the timer tasks need; cloned into each task so the coordinator
/// itself can be dropped (and cancel everything) independently.
#[derive(Clone)]
struct Shared {
    remote: Arc<dyn RemoteStore>,
    schedules: Arc<Mutex<HashMap<ProfileId, ScheduleMap>>>,
    timers: Arc<Mutex<TimerRegistry>>,
    unsynced: Arc<Mutex<HashSet<ProfileId>>>,
    status: Arc<watch::Sender<SyncState>>,
    write_locks: Arc<Mutex<HashMap<ProfileId, Arc<AsyncMutex<()>>>>>,
}

impl Shared {
    fn mark_syncing(&self) {
        self.status.send_if_modified(|state| {
            let changed = state.status != SyncStatus::Syncing;
            state.status = SyncStatus::Syncing;
            changed
        });
    }

    fn mark_error(&self, message: String) {
        self.status.send_modify(|state| {
            state.status = SyncStatus::Error;
            state.error = Some(message);
        });
    }

    /// Goes idle once nothing is pending or in flight.
    fn mark_success(&self) {
        if self.timers.lock().is_busy() {
            return;
        }
        self.status.send_replace(SyncState::default());
    }

    /// Drops a stale `Syncing` after writes were cancelled, keeping errors.
    fn settle_cancelled(&self) {
        if self.timers.lock().is_busy() {
            return;
        }
        self.status.send_if_modified(|state| {
            if state.status == SyncStatus::Syncing {
                *state = SyncState::default();
                true
            } else {
                false
            }
        });
    }

    fn write_lock(&self, profile_id: &str) -> Arc<AsyncMutex<()>> {
        self.write_locks
            .lock()
            .entry(profile_id.to_string())
            .or_default()
            .clone()
    }

    /// Writes the profile's current map. Writes of one profile run one at a
    /// time, and each reads the map only once the previous one has finished.
    async fn persist(&self, profile_id: &str) -> Result<(), RemoteError> {
        let in_flight = InFlight::enter(&self.timers);
        let write_lock = self.write_lock(profile_id);
        let _serialized = write_lock.lock().await;

        let Some(schedule) = self.schedules.lock().get(profile_id).cloned() else {
            debug!(profile_id, "profile no longer tracked; write dropped");
            drop(in_flight);
            self.settle_cancelled();
            return Ok(());
        };
        let schedule = normalize_map(schedule);

        info!(profile_id, entries = schedule.len(), "saving schedule");
        self.mark_syncing();
        let result = self.remote.update_schedule(profile_id, &schedule).await;
        drop(in_flight);

        // local maps are never snapshotted, so a failure leaves them as edited
        match result {
            Ok(()) => {
                self.unsynced.lock().remove(profile_id);
                info!(profile_id, "schedule saved");
                self.mark_success();
                Ok(())
            }
            Err(err) => {
                self.unsynced.lock().insert(profile_id.to_string());
                warn!(profile_id, error = %err, "schedule save failed; local edits kept");
                self.mark_error(err.to_string());
                Err(err)
            }
        }
    }
}

/// Owns the authoritative in-memory schedule of every profile and the
/// per-profile debounce timers that push them to the remote store.
///
/// Edits must be reported from within a tokio runtime; timers are spawned
/// onto the current runtime.
pub struct SyncCoordinator {
    shared: Shared,
    debounce: Duration,
    retired: Mutex<HashSet<ProfileId>>,
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("debounce", &self.debounce)
            .field("pending", &self.pending_profiles())
            .field("state", &self.sync_state())
            .finish()
    }
}

impl SyncCoordinator {
    /// Schedule writes keep the local map on failure; nothing is restored.
    pub const FAILURE_POLICY: FailurePolicy = FailurePolicy::RetainOnFailure;

    pub fn new(remote: Arc<dyn RemoteStore>, debounce: Duration) -> Self {
        let (status, _) = watch::channel(SyncState::default());
        Self {
            shared: Shared {
                remote,
                schedules: Arc::new(Mutex::new(HashMap::new())),
                timers: Arc::new(Mutex::new(TimerRegistry::default())),
                unsynced: Arc::new(Mutex::new(HashSet::new())),
                status: Arc::new(status),
                write_locks: Arc::new(Mutex::new(HashMap::new())),
            },
            debounce,
            retired: Mutex::new(HashSet::new()),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.shared.status.subscribe()
    }

    pub fn sync_state(&self) -> SyncState {
        self.shared.status.borrow().clone()
    }

    pub fn schedule(&self, profile_id: &str) -> ScheduleMap {
        self.shared.schedules.lock().get(profile_id).cloned().unwrap_or_default()
    }

    pub fn schedules(&self) -> HashMap<ProfileId, ScheduleMap> {
        self.shared.schedules.lock().clone()
    }

    pub fn insert_schedule(&self, profile_id: &str, schedule: ScheduleMap) {
        self.retired.lock().remove(profile_id);
        self.shared
            .schedules
            .lock()
            .insert(profile_id.to_string(), normalize_map(schedule));
    }

    /// Replaces every tracked schedule, e.g. after loading from the remote
    /// store or restoring a snapshot.
    pub fn replace_schedules(&self, schedules: HashMap<ProfileId, ScheduleMap>) {
        self.retired.lock().retain(|profile_id| !schedules.contains_key(profile_id));
        let schedules = schedules
            .into_iter()
            .map(|(profile_id, schedule)| (profile_id, normalize_map(schedule)))
            .collect();
        *self.shared.schedules.lock() = schedules;
    }

    /// Stops tracking a profile, cancelling its pending write. Later edits
    /// for it are ignored until it is inserted again.
    pub fn remove_schedule(&self, profile_id: &str) -> Option<ScheduleMap> {
        self.retired.lock().insert(profile_id.to_string());
        self.cancel_pending(profile_id);
        self.shared.schedules.lock().remove(profile_id)
    }

    /// Records a local edit and (re)starts the profile's debounce timer.
    pub fn on_change(&self, profile_id: &str, schedule: &ScheduleMap) {
        if self.retired.lock().contains(profile_id) {
            warn!(profile_id, "edit for removed profile ignored");
            return;
        }
        self.shared
            .schedules
            .lock()
            .insert(profile_id.to_string(), schedule.clone());
        self.shared.mark_syncing();
        self.arm(profile_id);
    }

    fn arm(&self, profile_id: &str) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(profile_id, "no async runtime; schedule change left unsynced");
            self.shared.unsynced.lock().insert(profile_id.to_string());
            self.shared.mark_error("no async runtime available for sync".to_string());
            return;
        };

        // held across spawn so the task cannot look itself up before it is registered
        let mut timers = self.shared.timers.lock();
        timers.next_generation += 1;
        let generation = timers.next_generation;
        let task = debounced_write(self.shared.clone(), profile_id.to_string(), generation, self.debounce);
        let handle = runtime.spawn(task);
        let previous = timers
            .pending
            .insert(profile_id.to_string(), PendingWrite { generation, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
            debug!(profile_id, "debounce restarted");
        }
    }

    pub fn has_pending(&self, profile_id: &str) -> bool {
        self.shared.timers.lock().pending.contains_key(profile_id)
    }

    pub fn pending_profiles(&self) -> Vec<ProfileId> {
        let mut pending: Vec<_> = self.shared.timers.lock().pending.keys().cloned().collect();
        pending.sort();
        pending
    }

    /// Tracked profiles whose latest local state has not reached the remote
    /// store because a write failed or was cancelled.
    pub fn unsynced_profiles(&self) -> Vec<ProfileId> {
        let schedules = self.shared.schedules.lock();
        let mut unsynced: Vec<_> = self
            .shared
            .unsynced
            .lock()
            .iter()
            .filter(|profile_id| schedules.contains_key(*profile_id))
            .cloned()
            .collect();
        unsynced.sort();
        unsynced
    }

    /// Cancels the profile's pending write, if any.
    pub fn cancel_pending(&self, profile_id: &str) -> bool {
        let Some(pending) = self.shared.timers.lock().pending.remove(profile_id) else {
            return false;
        };
        pending.handle.abort();
        self.shared.unsynced.lock().insert(profile_id.to_string());
        info!(profile_id, "pending schedule write cancelled");
        self.shared.settle_cancelled();
        true
    }

    /// Cancels every pending write. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(ProfileId, PendingWrite)> = self.shared.timers.lock().pending.drain().collect();
        let count = drained.len();
        if count == 0 {
            return 0;
        }

        let mut unsynced = self.shared.unsynced.lock();
        for (profile_id, pending) in drained {
            pending.handle.abort();
            unsynced.insert(profile_id);
        }
        drop(unsynced);

        warn!(cancelled = count, "pending schedule writes cancelled");
        self.shared.settle_cancelled();
        count
    }

    /// Writes the profile's current map now, skipping the debounce.
    pub async fn flush(&self, profile_id: &str) -> Result<(), RemoteError> {
        if let Some(pending) = self.shared.timers.lock().pending.remove(profile_id) {
            pending.handle.abort();
        }
        self.shared.persist(profile_id).await
    }

    /// Flushes every pending write; returns the first failure after trying
    /// them all.
    pub async fn flush_all(&self) -> Result<(), RemoteError> {
        let drained: Vec<(ProfileId, PendingWrite)> = self.shared.timers.lock().pending.drain().collect();
        let mut first_error = None;
        for (profile_id, pending) in drained {
            pending.handle.abort();
            if let Err(err) = self.shared.persist(&profile_id).await {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn shutdown(&self) {
        let cancelled = self.cancel_all();
        info!(cancelled, "sync coordinator shut down");
    }

    pub fn report_syncing(&self) {
        self.shared.mark_syncing();
    }

    pub fn report_success(&self) {
        self.shared.mark_success();
    }

    pub fn report_failure(&self, err: &impl fmt::Display) {
        self.shared.mark_error(err.to_string());
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        for (_, pending) in self.shared.timers.lock().pending.drain() {
            pending.handle.abort();
        }
    }
}

async fn debounced_write(shared: Shared, profile_id: ProfileId, generation: u64, delay: Duration) {
    tokio::time::sleep(delay).await;
    {
        let mut timers = shared.timers.lock();
        if timers.pending.get(&profile_id).map(|pending| pending.generation) != Some(generation) {
            return;
        }
        timers.pending.remove(&profile_id);
    }
    // failures are reported through the status channel
    let _ = shared.persist(&profile_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::DateStatus;
    use crate::testing::RecordingRemote;
    use tokio::time::{advance, sleep};

    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn coordinator(remote: &Arc<RecordingRemote>) -> SyncCoordinator {
        SyncCoordinator::new(remote.clone(), DEBOUNCE)
    }

    fn map(entries: &[(&str, DateStatus)]) -> ScheduleMap {
        normalize_map(entries.iter().copied())
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_sends_only_the_last_map() {
        let remote = Arc::new(RecordingRemote::new());
        let sync = coordinator(&remote);

        let mut last = ScheduleMap::new();
        for day in 1..=5 {
            let key = format!("2024-03-0{day}");
            last = map(&[(key.as_str(), DateStatus::Available)]);
            sync.on_change("p1", &last);
            assert_eq!(sync.sync_state().status, SyncStatus::Syncing);
            advance(Duration::from_millis(100)).await;
        }
        assert!(remote.updates().is_empty());

        sleep(DEBOUNCE * 2).await;
        assert_eq!(remote.updates(), vec![("p1".to_string(), last)]);
        assert_eq!(sync.sync_state(), SyncState::default());
        assert!(!sync.has_pending("p1"));
    }

    #[tokio::test(start_paused = true)]
    async fn profiles_debounce_independently() {
        let remote = Arc::new(RecordingRemote::new());
        let sync = coordinator(&remote);

        sync.on_change("p1", &map(&[("2024-03-01", DateStatus::Available)]));
        advance(Duration::from_millis(300)).await;
        sync.on_change("p2", &map(&[("2024-03-02", DateStatus::Unavailable)]));
        sleep(DEBOUNCE * 2).await;

        let mut written: Vec<String> = remote.updates().into_iter().map(|(id, _)| id).collect();
        written.sort();
        assert_eq!(written, vec!["p1", "p2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_keeps_local_map_and_reports_error() {
        let remote = Arc::new(RecordingRemote::failing());
        let sync = coordinator(&remote);
        let edited = map(&[("2024-03-05", DateStatus::Available)]);

        sync.on_change("p1", &edited);
        sleep(DEBOUNCE * 2).await;

        let state = sync.sync_state();
        assert_eq!(state.status, SyncStatus::Error);
        assert!(state.error.is_some());
        assert_eq!(sync.schedule("p1"), edited);
        assert_eq!(sync.unsynced_profiles(), vec!["p1".to_string()]);

        remote.set_failing(false);
        sync.on_change("p1", &edited);
        sleep(DEBOUNCE * 2).await;
        assert_eq!(sync.sync_state(), SyncState::default());
        assert!(sync.unsynced_profiles().is_empty());
        assert_eq!(remote.updates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_pending_writes() {
        let remote = Arc::new(RecordingRemote::new());
        let sync = coordinator(&remote);

        sync.on_change("p1", &map(&[("2024-03-01", DateStatus::Available)]));
        sync.on_change("p2", &map(&[("2024-03-01", DateStatus::Available)]));
        assert_eq!(sync.cancel_all(), 2);
        sleep(DEBOUNCE * 2).await;

        assert!(remote.updates().is_empty());
        assert_eq!(sync.unsynced_profiles(), vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(sync.sync_state().status, SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_immediately_and_disarms_timer() {
        let remote = Arc::new(RecordingRemote::new());
        let sync = coordinator(&remote);

        sync.on_change("p1", &map(&[("2024-03-01", DateStatus::Available)]));
        sync.flush("p1").await.unwrap();
        assert_eq!(remote.updates().len(), 1);

        sleep(DEBOUNCE * 2).await;
        assert_eq!(remote.updates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn outgoing_keys_are_canonical() {
        let remote = Arc::new(RecordingRemote::new());
        let sync = coordinator(&remote);
        let raw: ScheduleMap = serde_json::from_str(r#"{"2024/03/05": "ok"}"#).unwrap();

        sync.on_change("p1", &raw);
        sleep(DEBOUNCE * 2).await;

        let (_, written) = remote.updates().remove(0);
        assert_eq!(written.get("2024-03-05"), Some(&DateStatus::Available));
        assert_eq!(written.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn removed_profile_is_not_written() {
        let remote = Arc::new(RecordingRemote::new());
        let sync = coordinator(&remote);

        sync.on_change("p1", &map(&[("2024-03-01", DateStatus::Available)]));
        assert!(sync.remove_schedule("p1").is_some());
        sleep(DEBOUNCE * 2).await;

        assert!(remote.updates().is_empty());
        assert!(sync.unsynced_profiles().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn edits_for_removed_profile_are_ignored_until_reinserted() {
        let remote = Arc::new(RecordingRemote::new());
        let sync = coordinator(&remote);
        let edited = map(&[("2024-03-01", DateStatus::Available)]);

        sync.insert_schedule("p1", ScheduleMap::new());
        sync.remove_schedule("p1");
        sync.on_change("p1", &edited);
        sleep(DEBOUNCE * 2).await;

        assert!(remote.updates().is_empty());
        assert!(!sync.schedules().contains_key("p1"));
        assert!(!sync.has_pending("p1"));

        sync.insert_schedule("p1", ScheduleMap::new());
        sync.on_change("p1", &edited);
        sleep(DEBOUNCE * 2).await;
        assert_eq!(remote.updates(), vec![("p1".to_string(), edited)]);
    }

    #[tokio::test(start_paused = true)]
    async fn later_write_waits_for_slow_earlier_write() {
        let remote = Arc::new(RecordingRemote::new());
        let sync = coordinator(&remote);
        let first = map(&[("2024-03-01", DateStatus::Available)]);
        let second = map(&[("2024-03-02", DateStatus::Unavailable)]);
        remote.delay_next_update(Duration::from_secs(3));

        sync.on_change("p1", &first);
        sleep(DEBOUNCE + Duration::from_millis(100)).await;
        sync.on_change("p1", &second);
        sleep(DEBOUNCE * 2).await;

        assert!(remote.updates().is_empty());
        assert_eq!(sync.sync_state().status, SyncStatus::Syncing);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(
            remote.updates(),
            vec![("p1".to_string(), first), ("p1".to_string(), second.clone())]
        );
        assert_eq!(remote.inner().rows().get_schedules()["p1"], second);
        assert_eq!(sync.sync_state(), SyncState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_coordinator_cancels_timers() {
        let remote = Arc::new(RecordingRemote::new());
        let sync = coordinator(&remote);
        sync.on_change("p1", &map(&[("2024-03-01", DateStatus::Available)]));
        drop(sync);

        sleep(DEBOUNCE * 2).await;
        assert!(remote.updates().is_empty());
    }

    #[test]
    fn rollback_runs_only_for_rollback_policy() {
        let mut rolled_back = false;
        let result: Result<(), &str> = FailurePolicy::RollbackOnFailure.settle(Err("boom"), || rolled_back = true);
        assert!(result.is_err());
        assert!(rolled_back);

        let mut rolled_back = false;
        let _ = FailurePolicy::RetainOnFailure.settle(Err::<(), _>("boom"), || rolled_back = true);
        assert!(!rolled_back);

        let mut rolled_back = false;
        let _ = FailurePolicy::RollbackOnFailure.settle(Ok::<_, &str>(()), || rolled_back = true);
        assert!(!rolled_back);
    }
}
