use chrono::NaiveDate;
use drag_scheduler::rows::RowStore;
use drag_scheduler::{
    AppState, CalendarMonth, DateStatus, EditorSession, HttpRemoteStore, ProfileRegistry, RegistryError,
    RemoteStore, SyncCoordinator, SyncStatus, router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::time::sleep;

const DEBOUNCE: Duration = Duration::from_millis(50);

fn unique_data_path() -> std::path::PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("drag_scheduler_flow_{}_{}.json", std::process::id(), nanos))
}

async fn spawn_in_process() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(AppState::new(unique_data_path(), RowStore::default()));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn stack(base_url: String) -> (Arc<HttpRemoteStore>, EditorSession) {
    let remote = Arc::new(HttpRemoteStore::with_client(Client::new(), base_url));
    let coordinator = Arc::new(SyncCoordinator::new(remote.clone(), DEBOUNCE));
    let registry = Arc::new(ProfileRegistry::new(remote.clone(), coordinator));
    let session = EditorSession::new(registry, CalendarMonth::new(2024, 3).unwrap());
    (remote, session)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

async fn wait_for_idle(coordinator: &SyncCoordinator) {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if coordinator.pending_profiles().is_empty() && coordinator.sync_state().status != SyncStatus::Syncing {
            return;
        }
        if Instant::now() > deadline {
            panic!("sync did not settle");
        }
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn drag_edit_reaches_server_and_reloads() {
    let base_url = spawn_in_process().await;
    let (remote, mut session) = stack(base_url.clone());

    let alice = session.registry().add_profile("Alice").await.unwrap();
    session.open_profile(&alice.id).unwrap();
    session.pointer_down(day(10));
    session.pointer_enter(day(5));
    session.pointer_up();
    assert!(session.handle_key("G"));
    session.clear_date(day(7));

    let coordinator = session.registry().coordinator().clone();
    wait_for_idle(&coordinator).await;
    assert_eq!(coordinator.sync_state().status, SyncStatus::Idle);

    let stored = remote.get_schedules().await.unwrap();
    let schedule = &stored[&alice.id];
    assert_eq!(schedule.len(), 5);
    assert_eq!(schedule.get("2024-03-05"), Some(&DateStatus::Available));
    assert!(schedule.get("2024-03-07").is_none());

    let (_, fresh) = stack(base_url);
    fresh.registry().load().await.unwrap();
    assert_eq!(fresh.registry().profiles(), vec![alice.clone()]);
    assert_eq!(fresh.registry().schedule(&alice.id).len(), 5);
}

#[tokio::test]
async fn unreachable_store_rolls_back_profile_add() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (_, session) = stack(base_url);
    let err = session.registry().add_profile("Bob").await.unwrap_err();

    assert!(matches!(err, RegistryError::Remote(_)));
    assert!(session.registry().profiles().is_empty());
    assert!(session.registry().coordinator().schedules().is_empty());
    let state = session.registry().coordinator().sync_state();
    assert_eq!(state.status, SyncStatus::Error);
    assert!(state.error.is_some());
}
