use crate::errors::AppError;
use crate::rows::RowStore;
use std::{env, path::Path, path::PathBuf};
use tokio::fs;
use tracing::{error, info};

pub fn resolve_data_path() -> PathBuf {
    match env::var("APP_DATA_PATH") {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from("data/rows.json"),
    }
}

/// Reads the row file; a missing or unreadable file starts an empty store.
pub async fn load_data(path: &Path) -> RowStore {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<RowStore>(&bytes) {
            Ok(rows) => {
                info!(
                    profiles = rows.profiles.len(),
                    schedule_rows = rows.schedules.len(),
                    "loaded row file"
                );
                rows
            }
            Err(err) => {
                error!("failed to parse row file: {err}");
                RowStore::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => RowStore::default(),
        Err(err) => {
            error!("failed to read row file: {err}");
            RowStore::default()
        }
    }
}

pub async fn persist_data(path: &Path, rows: &RowStore) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(rows).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}
