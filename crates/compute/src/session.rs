//! reqwest-backed compute session.
//!
//! Authenticates once at [`ComputeSession::connect`] and then serves every
//! [`AuthenticatedClient`] call with the held bearer token. The token is
//! refreshed lazily: before a call when it is known to be expired, and once
//! per call when the provider answers 401.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use autosnap_core::{Config, Instance, Snapshot};

use crate::auth::{request_token, AccessToken, Credentials, Endpoints};
use crate::client::{default_snapshot_name, AuthenticatedClient};
use crate::error::ComputeError;

/// Page size requested when listing instances.
const PAGE_SIZE: u32 = 100;

/// Authenticated handle to the compute provider.
pub struct ComputeSession {
    client: reqwest::Client,
    credentials: Credentials,
    endpoints: Endpoints,
    token: RwLock<AccessToken>,
}

impl ComputeSession {
    /// Build the HTTP client and obtain the first token.
    ///
    /// Failure here is fatal to the daemon: nothing else can succeed
    /// without a token.
    pub async fn connect(
        credentials: Credentials,
        endpoints: Endpoints,
        timeout: Duration,
    ) -> Result<Self, ComputeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ComputeError::Auth(format!("failed to build HTTP client: {e}")))?;

        let token = request_token(&client, &credentials, &endpoints).await?;
        info!(api = %endpoints.api_url, "Connected to compute API");

        Ok(Self {
            client,
            credentials,
            endpoints,
            token: RwLock::new(token),
        })
    }

    /// Connect using the credentials, endpoints and timeout from `config`.
    pub async fn from_config(config: &Config) -> Result<Self, ComputeError> {
        Self::connect(
            Credentials::from_config(config),
            Endpoints::from_config(config),
            Duration::from_secs(config.request_timeout_secs),
        )
        .await
    }

    /// Current bearer value, refreshing first if the token has expired.
    async fn bearer(&self) -> Result<String, ComputeError> {
        {
            let token = self.token.read().await;
            if !token.is_expired(Utc::now()) {
                return Ok(token.value().to_string());
            }
        }
        debug!("Access token expired, refreshing");
        self.reauthenticate().await
    }

    async fn reauthenticate(&self) -> Result<String, ComputeError> {
        let mut token = self.token.write().await;
        let fresh = request_token(&self.client, &self.credentials, &self.endpoints).await?;
        let value = fresh.value().to_string();
        *token = fresh;
        Ok(value)
    }

    /// Perform one API call, retrying once after re-authentication on 401.
    /// Returns the decoded JSON body, or `None` for DELETE / empty bodies.
    async fn call(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ComputeError> {
        let url = format!("{}/{}", self.endpoints.api_url, endpoint);

        let result = match self.bearer().await {
            Ok(token) => match self.send(&method, &url, &token, body).await {
                Err(e) if e.is_unauthorized() => {
                    warn!(%url, "API answered 401, re-authenticating");
                    match self.reauthenticate().await {
                        Ok(token) => self.send(&method, &url, &token, body).await,
                        Err(e) => Err(e),
                    }
                }
                other => other,
            },
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            debug!(%method, %url, error = %e, "API call failed");
        }
        result
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ComputeError> {
        let request_id = Uuid::new_v4().to_string();
        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(token)
            .header("x-request-id", &request_id);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, %url, %request_id, "API request");
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComputeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        if method == Method::DELETE {
            return Ok(None);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ComputeError::Parse(format!("invalid JSON from {url}: {e}")))
    }
}

#[async_trait]
impl AuthenticatedClient for ComputeSession {
    async fn list_instances(&self) -> Result<Vec<Instance>, ComputeError> {
        info!("Fetching instances...");

        let mut instances = Vec::new();
        let mut page = 1;
        loop {
            let endpoint = format!("instances?page={page}&size={PAGE_SIZE}");
            let payload = self.call(Method::GET, &endpoint, None).await?;
            let total_pages = total_pages(payload.as_ref());
            instances.extend(data_array::<Instance>(payload)?);

            match total_pages {
                Some(total) if page < total => page += 1,
                _ => break,
            }
        }

        if instances.is_empty() {
            warn!("No instances found.");
        } else {
            debug!(count = instances.len(), "Fetched instances");
        }
        Ok(instances)
    }

    async fn list_snapshots(&self, instance_id: &str) -> Result<Vec<Snapshot>, ComputeError> {
        info!(instance_id, "Fetching snapshots...");
        let payload = self
            .call(Method::GET, &format!("instances/{instance_id}/snapshots"), None)
            .await?;
        data_array(payload)
    }

    async fn create_snapshot(
        &self,
        instance_id: &str,
        name: Option<&str>,
        description: &str,
    ) -> Result<Snapshot, ComputeError> {
        info!(instance_id, "Creating snapshot...");
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| default_snapshot_name(Local::now()));
        let body = json!({ "name": name, "description": description });

        let payload = self
            .call(
                Method::POST,
                &format!("instances/{instance_id}/snapshots"),
                Some(&body),
            )
            .await?;

        let snapshot = data_array::<Snapshot>(payload)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ComputeError::Parse("create response carried no snapshot record".to_string())
            })?;

        info!(instance_id, snapshot_id = %snapshot.id, "Snapshot created");
        Ok(snapshot)
    }

    async fn delete_snapshot(
        &self,
        instance_id: &str,
        snapshot_id: &str,
    ) -> Result<(), ComputeError> {
        info!(instance_id, snapshot_id, "Deleting snapshot...");
        self.call(
            Method::DELETE,
            &format!("instances/{instance_id}/snapshots/{snapshot_id}"),
            None,
        )
        .await?;
        Ok(())
    }
}

/// Decode the `data` array of a provider response. A missing body or
/// missing `data` key means "no records".
fn data_array<T: DeserializeOwned>(payload: Option<Value>) -> Result<Vec<T>, ComputeError> {
    let Some(mut payload) = payload else {
        return Ok(Vec::new());
    };
    match payload.get_mut("data").map(Value::take) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(data) => serde_json::from_value(data)
            .map_err(|e| ComputeError::Parse(format!("unexpected `data` shape: {e}"))),
    }
}

fn total_pages(payload: Option<&Value>) -> Option<u64> {
    payload?
        .get("_pagination")?
        .get("totalPages")?
        .as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_array_missing_is_empty() {
        let empty: Vec<Instance> = data_array(None).unwrap();
        assert!(empty.is_empty());
        let no_key: Vec<Instance> = data_array(Some(json!({ "_links": {} }))).unwrap();
        assert!(no_key.is_empty());
        let null: Vec<Instance> = data_array(Some(json!({ "data": null }))).unwrap();
        assert!(null.is_empty());
    }

    #[test]
    fn data_array_rejects_wrong_shape() {
        let result: Result<Vec<Instance>, _> = data_array(Some(json!({ "data": "nope" })));
        assert!(matches!(result, Err(ComputeError::Parse(_))));
    }

    #[test]
    fn total_pages_reads_pagination_block() {
        let payload = json!({ "data": [], "_pagination": { "totalPages": 3, "page": 1 } });
        assert_eq!(total_pages(Some(&payload)), Some(3));
        assert_eq!(total_pages(Some(&json!({ "data": [] }))), None);
        assert_eq!(total_pages(None), None);
    }
}
