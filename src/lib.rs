pub mod app;
pub mod calendar;
pub mod client;
pub mod config;
pub mod date_key;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod remote;
pub mod rows;
pub mod schedule;
pub mod selection;
pub mod session;
pub mod state;
pub mod stats;
pub mod storage;
pub mod sync;
#[cfg(test)]
mod testing;

pub use app::router;
pub use calendar::CalendarMonth;
pub use client::HttpRemoteStore;
pub use config::{ClientConfig, ConfigError};
pub use date_key::{DateInput, DateKey, DayBasis, normalize, normalize_with};
pub use models::{Profile, ProfileId};
pub use registry::{ProfileRegistry, RegistryError};
pub use remote::{MemoryRemoteStore, RemoteError, RemoteStore};
pub use schedule::{DateStatus, ScheduleMap, ScheduleStore};
pub use selection::SelectionEngine;
pub use session::EditorSession;
pub use state::AppState;
pub use storage::{load_data, resolve_data_path};
pub use sync::{FailurePolicy, SyncCoordinator, SyncState, SyncStatus};
