use crate::rows::RowStore;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub rows: Arc<Mutex<RowStore>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, rows: RowStore) -> Self {
        Self {
            data_path,
            rows: Arc::new(Mutex::new(rows)),
        }
    }
}
