use crate::calendar::CalendarMonth;
use crate::errors::AppError;
use crate::models::{
    ActionQuery, MonthSummary, Profile, ProfilesResponse, SchedulesResponse, SuccessResponse, SummaryQuery,
    UpdateScheduleRequest,
};
use crate::schedule::normalize_map;
use crate::state::AppState;
use crate::stats::build_month_summary;
use crate::storage::persist_data;
use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

/// Single action endpoint. GET and POST share it; POST bodies are JSON
/// regardless of the declared content type.
pub async fn action(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
    body: String,
) -> Result<Response, AppError> {
    let action = query.action.as_deref().unwrap_or_default();
    match action {
        "getProfiles" => get_profiles(&state).await,
        "getSchedules" => get_schedules(&state).await,
        "addProfile" => add_profile(&state, &body).await,
        "updateSchedule" => update_schedule(&state, &body).await,
        "deleteProfile" => delete_profile(&state, query.profile_id.as_deref()).await,
        "cleanDuplicates" => clean_duplicates(&state).await,
        other => {
            warn!(action = other, "unknown action");
            Err(AppError::bad_request("Unknown action"))
        }
    }
}

pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<MonthSummary>, AppError> {
    let month = match query.month.as_deref() {
        Some(value) => CalendarMonth::parse(value).ok_or_else(|| AppError::bad_request("month must be YYYY-MM"))?,
        None => CalendarMonth::current(),
    };

    let rows = state.rows.lock().await;
    if !rows.get_profiles().iter().any(|profile| profile.id == query.profile_id) {
        return Err(AppError::not_found(format!("unknown profile: {}", query.profile_id)));
    }
    let schedule = rows.get_schedules().remove(&query.profile_id).unwrap_or_default();
    Ok(Json(build_month_summary(&query.profile_id, &schedule, month)))
}

async fn get_profiles(state: &AppState) -> Result<Response, AppError> {
    let profiles = state.rows.lock().await.get_profiles();
    Ok(Json(ProfilesResponse { profiles }).into_response())
}

async fn get_schedules(state: &AppState) -> Result<Response, AppError> {
    let schedules = state
        .rows
        .lock()
        .await
        .get_schedules()
        .into_iter()
        .map(|(profile_id, schedule)| {
            let schedule = schedule
                .into_iter()
                .map(|(key, status)| (key.into_string(), status))
                .collect();
            (profile_id, schedule)
        })
        .collect();
    Ok(Json(SchedulesResponse { schedules }).into_response())
}

async fn add_profile(state: &AppState, body: &str) -> Result<Response, AppError> {
    let profile: Profile = parse_body(body)?;
    if profile.id.trim().is_empty() {
        return Err(AppError::bad_request("profile id is required"));
    }

    let mut rows = state.rows.lock().await;
    rows.add_profile(profile.clone());
    persist_data(&state.data_path, &rows).await?;
    info!(profile_id = %profile.id, name = %profile.name, "profile stored");

    Ok(Json(SuccessResponse {
        profile: Some(profile),
        ..SuccessResponse::ok()
    })
    .into_response())
}

async fn update_schedule(state: &AppState, body: &str) -> Result<Response, AppError> {
    let request: UpdateScheduleRequest = parse_body(body)?;
    if request.profile_id.trim().is_empty() {
        return Err(AppError::bad_request("profileId is required"));
    }
    let schedule = normalize_map(request.schedule_data);

    let mut rows = state.rows.lock().await;
    rows.update_schedule(&request.profile_id, &schedule);
    persist_data(&state.data_path, &rows).await?;
    info!(profile_id = %request.profile_id, entries = schedule.len(), "schedule stored");

    Ok(Json(SuccessResponse::ok()).into_response())
}

async fn delete_profile(state: &AppState, profile_id: Option<&str>) -> Result<Response, AppError> {
    let profile_id = profile_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("profileId is required"))?;

    let mut rows = state.rows.lock().await;
    let existed = rows.delete_profile(profile_id);
    persist_data(&state.data_path, &rows).await?;
    info!(profile_id, existed, "profile deleted");

    Ok(Json(SuccessResponse::ok()).into_response())
}

async fn clean_duplicates(state: &AppState) -> Result<Response, AppError> {
    let mut rows = state.rows.lock().await;
    let deleted = rows.clean_duplicates();
    persist_data(&state.data_path, &rows).await?;
    info!(deleted, "duplicate schedule rows removed");

    Ok(Json(SuccessResponse {
        deleted_rows: Some(deleted),
        ..SuccessResponse::ok()
    })
    .into_response())
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, AppError> {
    serde_json::from_str(body).map_err(|err| AppError::bad_request(format!("invalid request body: {err}")))
}
