use crate::calendar::CalendarMonth;
use crate::date_key::DateInput;
use crate::models::{Profile, ProfileId};
use crate::registry::{ProfileRegistry, RegistryError};
use crate::schedule::{DateStatus, ScheduleMap, ScheduleStore};
use crate::selection::SelectionEngine;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    MarkAvailable,
    MarkUnavailable,
    ClearSelection,
}

impl Shortcut {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "g" | "G" => Some(Shortcut::MarkAvailable),
            "r" | "R" => Some(Shortcut::MarkUnavailable),
            "Escape" => Some(Shortcut::ClearSelection),
            _ => None,
        }
    }
}

/// The editing surface for one profile at a time: a drag selection over the
/// displayed month and a schedule store wired to the sync coordinator.
pub struct EditorSession {
    registry: Arc<ProfileRegistry>,
    selection: SelectionEngine,
    store: Option<ScheduleStore>,
}

impl EditorSession {
    pub fn new(registry: Arc<ProfileRegistry>, month: CalendarMonth) -> Self {
        Self {
            registry,
            selection: SelectionEngine::new(month),
            store: None,
        }
    }

    pub fn registry(&self) -> &Arc<ProfileRegistry> {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn profile(&self) -> Option<Profile> {
        self.store.as_ref()?;
        self.registry.current_profile()
    }

    pub fn schedule(&self) -> Option<&ScheduleMap> {
        self.store.as_ref().map(ScheduleStore::map)
    }

    /// Switches editing to `profile_id`. Pending writes of every profile are
    /// cancelled.
    pub fn open_profile(&mut self, profile_id: &str) -> Result<(), RegistryError> {
        self.registry.select_profile(profile_id)?;
        let coordinator = self.registry.coordinator().clone();
        coordinator.cancel_all();

        let mut store = ScheduleStore::with_map(coordinator.schedule(profile_id));
        let owner: ProfileId = profile_id.to_string();
        store.on_change(move |map| coordinator.on_change(&owner, map));
        self.store = Some(store);
        self.selection.clear_selection();
        debug!(profile_id, "editor opened");
        Ok(())
    }

    pub fn close_profile(&mut self) {
        self.registry.deselect_profile();
        self.registry.coordinator().cancel_all();
        self.store = None;
        self.selection.clear_selection();
    }

    /// Removes a profile through the registry, closing the editor first when
    /// that profile is open.
    pub async fn remove_profile(&mut self, profile_id: &str) -> Result<(), RegistryError> {
        if self.store.is_some() && self.registry.current_profile_id().as_deref() == Some(profile_id) {
            self.close_profile();
        }
        self.registry.remove_profile(profile_id).await
    }

    pub fn pointer_down(&mut self, date: NaiveDate) {
        self.selection.pointer_down(date);
    }

    pub fn pointer_enter(&mut self, date: NaiveDate) {
        self.selection.pointer_enter(date);
    }

    pub fn pointer_up(&mut self) {
        self.selection.pointer_up();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
    }

    pub fn show_month(&mut self, month: CalendarMonth) {
        self.selection.show_month(month);
    }

    pub fn next_month(&mut self) {
        self.selection.next_month();
    }

    pub fn prev_month(&mut self) {
        self.selection.prev_month();
    }

    /// Returns false when no profile is open.
    pub fn apply_status_to_selection(&mut self, status: DateStatus) -> bool {
        let Some(store) = self.store.as_mut() else {
            return false;
        };
        store.apply_status_to_selection(&self.selection, status);
        true
    }

    pub fn update_unset_all(&mut self, status: DateStatus) -> bool {
        let month = self.selection.month();
        let Some(store) = self.store.as_mut() else {
            return false;
        };
        store.update_unset_all(month, status);
        true
    }

    pub fn clear_date(&mut self, date: impl Into<DateInput>) -> bool {
        let Some(store) = self.store.as_mut() else {
            return false;
        };
        store.clear_date(date);
        true
    }

    /// Runs the shortcut bound to `key`; returns whether one matched.
    pub fn handle_key(&mut self, key: &str) -> bool {
        let Some(shortcut) = Shortcut::from_key(key) else {
            return false;
        };
        match shortcut {
            Shortcut::MarkAvailable => {
                self.apply_status_to_selection(DateStatus::Available);
            }
            Shortcut::MarkUnavailable => {
                self.apply_status_to_selection(DateStatus::Unavailable);
            }
            Shortcut::ClearSelection => self.selection.clear_selection(),
        }
        true
    }

    pub fn status_of(&self, date: impl Into<DateInput>) -> DateStatus {
        self.store
            .as_ref()
            .map(|store| store.status_of(date))
            .unwrap_or_default()
    }
}
