//! HTTP client for the action-style row-store protocol.
//!
//! Every call targets one endpoint and selects the operation with an
//! `action` query parameter. Write bodies go out as `text/plain` JSON, which
//! hosted script endpoints require to avoid a CORS preflight.

use crate::config::{ClientConfig, ConfigError};
use crate::models::{Profile, ProfileId, ProfilesResponse, SchedulesResponse, UpdateScheduleRequest};
use crate::remote::{RemoteError, RemoteStore};
use crate::schedule::{ScheduleMap, normalize_map};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header::CONTENT_TYPE};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

const TEXT_PLAIN: &str = "text/plain;charset=utf-8";

#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

impl HttpRemoteStore {
    /// Builds a client from config; fails when no endpoint is configured.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let base_url = config.api_url()?.to_string();
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ConfigError::Client(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, action: &str) -> RequestBuilder {
        self.client.get(&self.base_url).query(&[("action", action)])
    }

    fn post<B: Serialize>(&self, action: &str, body: &B) -> Result<RequestBuilder, RemoteError> {
        let payload = serde_json::to_string(body).map_err(|err| RemoteError::Malformed(err.to_string()))?;
        Ok(self
            .client
            .post(&self.base_url)
            .query(&[("action", action)])
            .header(CONTENT_TYPE, TEXT_PLAIN)
            .body(payload))
    }

    async fn send<T: DeserializeOwned>(&self, action: &str, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(action, status = status.as_u16(), bytes = body.len(), "remote store responded");

        let value: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(RemoteError::Status {
                    status: status.as_u16(),
                    message: body,
                });
            }
            Err(err) => return Err(RemoteError::Malformed(err.to_string())),
        };

        if let Some(message) = value.get("error").and_then(Value::as_str) {
            warn!(action, error = message, "remote store reported an error");
            return Err(if status.is_success() {
                RemoteError::Rejected(message.to_string())
            } else {
                RemoteError::Status {
                    status: status.as_u16(),
                    message: message.to_string(),
                }
            });
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        serde_json::from_value(value).map_err(|err| RemoteError::Malformed(err.to_string()))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn get_profiles(&self) -> Result<Vec<Profile>, RemoteError> {
        let response: ProfilesResponse = self.send("getProfiles", self.get("getProfiles")).await?;
        Ok(response.profiles)
    }

    async fn get_schedules(&self) -> Result<HashMap<ProfileId, ScheduleMap>, RemoteError> {
        let response: SchedulesResponse = self.send("getSchedules", self.get("getSchedules")).await?;
        Ok(response
            .schedules
            .into_iter()
            .map(|(profile_id, schedule)| (profile_id, normalize_map(schedule)))
            .collect())
    }

    async fn add_profile(&self, profile: &Profile) -> Result<(), RemoteError> {
        let request = self.post("addProfile", profile)?;
        let _: Value = self.send("addProfile", request).await?;
        Ok(())
    }

    async fn update_schedule(&self, profile_id: &str, schedule: &ScheduleMap) -> Result<(), RemoteError> {
        let body = UpdateScheduleRequest {
            profile_id: profile_id.to_string(),
            schedule_data: normalize_map(schedule.iter().map(|(key, status)| (key, *status))),
        };
        let request = self.post("updateSchedule", &body)?;
        let _: Value = self.send("updateSchedule", request).await?;
        Ok(())
    }

    async fn delete_profile(&self, profile_id: &str) -> Result<(), RemoteError> {
        let request = self.get("deleteProfile").query(&[("profileId", profile_id)]);
        let _: Value = self.send("deleteProfile", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_configured_endpoint() {
        let err = HttpRemoteStore::new(&ClientConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiUrl));

        let config = ClientConfig::default().with_api_url("http://127.0.0.1:9/exec");
        let store = HttpRemoteStore::new(&config).unwrap();
        assert_eq!(store.base_url(), "http://127.0.0.1:9/exec");
    }
}
