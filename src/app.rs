use crate::handlers;
use crate::state::AppState;
use axum::{Router, routing::get};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::action).post(handlers::action))
        .route("/exec", get(handlers::action).post(handlers::action))
        .route("/api/summary", get(handlers::get_summary))
        .with_state(state)
}
