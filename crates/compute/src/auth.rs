//! OAuth password-grant authentication and the expiring bearer token.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, error, info};

use autosnap_core::Config;

use crate::error::ComputeError;

/// Tokens are treated as expired this long before the provider says so.
const EXPIRY_SKEW_SECS: i64 = 30;

/// Account credentials exchanged for a bearer token.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.api_user.clone(),
            password: config.api_password.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Provider URLs: the token endpoint and the compute REST base.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub auth_url: String,
    pub api_url: String,
}

impl Endpoints {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auth_url: config.auth_url.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }
}

/// A bearer token with an optional expiry.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// A token without a known expiry never expires locally; the provider
    /// answering 401 is the only signal in that case.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= at,
            None => false,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Exchange credentials for a bearer token via the password grant.
///
/// Every failure mode (transport, non-2xx, malformed body, missing token)
/// is reported as [`ComputeError::Auth`].
pub async fn request_token(
    client: &reqwest::Client,
    credentials: &Credentials,
    endpoints: &Endpoints,
) -> Result<AccessToken, ComputeError> {
    info!("Connecting to compute API...");

    let form = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("grant_type", "password"),
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
    ];

    let response = client
        .post(&endpoints.auth_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            error!(error = %e, "Connection to compute API failed");
            ComputeError::Auth(format!("token request failed: {e}"))
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(%status, "Token endpoint rejected credentials");
        return Err(ComputeError::Auth(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ComputeError::Auth(format!("unreadable token response: {e}")))?;

    let value = token
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            error!("Failed to obtain access token.");
            ComputeError::Auth("token response carried no access_token".to_string())
        })?;

    let expires_at = token
        .expires_in
        .filter(|secs| *secs > 0)
        .map(|secs| Utc::now() + Duration::seconds(secs));

    debug!(expires_at = ?expires_at, "Access token obtained");
    Ok(AccessToken::new(value, expires_at))
}
