use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yml";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FILE: &str = "logs/auto-snapshots.log";
pub const DEFAULT_AUTH_URL: &str =
    "https://auth.contabo.com/auth/realms/contabo/protocol/openid-connect/token";
pub const DEFAULT_API_URL: &str = "https://api.contabo.com/v1/compute";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SNAPSHOT_DESCRIPTION: &str = "Auto-snapshots BOT";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

// ── Layer ─────────────────────────────────────────────────────

/// One source of configuration values. Every field is optional; layers are
/// merged (environment first, then the YAML file) before validation.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub webhook_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_user: Option<String>,
    pub api_password: Option<String>,
    pub cron_schedule: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub auth_url: Option<String>,
    pub api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub snapshot_description: Option<String>,
}

impl ConfigLayer {
    /// Read the layer from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a layer from an arbitrary key lookup (upper-case env names).
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let request_timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                value: raw,
            })?),
            None => None,
        };

        Ok(Self {
            webhook_url: get("WEBHOOK_URL"),
            client_id: get("CLIENT_ID"),
            client_secret: get("CLIENT_SECRET"),
            api_user: get("API_USER"),
            api_password: get("API_PASSWORD"),
            cron_schedule: get("CRON_SCHEDULE"),
            log_level: get("LOG_LEVEL"),
            log_file: get("LOG_FILE").map(PathBuf::from),
            auth_url: get("AUTH_URL"),
            api_url: get("API_URL"),
            request_timeout_secs,
            snapshot_description: get("SNAPSHOT_DESCRIPTION"),
        })
    }

    /// Parse a YAML config file. Returns `Ok(None)` when the file does not exist.
    pub fn from_yaml_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Some(Self::default()));
        }

        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Fill every unset field of `self` from `fallback`.
    pub fn or(self, fallback: ConfigLayer) -> ConfigLayer {
        fn blank(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.trim().is_empty())
        }
        ConfigLayer {
            webhook_url: self.webhook_url.or(blank(fallback.webhook_url)),
            client_id: self.client_id.or(blank(fallback.client_id)),
            client_secret: self.client_secret.or(blank(fallback.client_secret)),
            api_user: self.api_user.or(blank(fallback.api_user)),
            api_password: self.api_password.or(blank(fallback.api_password)),
            cron_schedule: self.cron_schedule.or(blank(fallback.cron_schedule)),
            log_level: self.log_level.or(blank(fallback.log_level)),
            log_file: self.log_file.or(fallback.log_file),
            auth_url: self.auth_url.or(blank(fallback.auth_url)),
            api_url: self.api_url.or(blank(fallback.api_url)),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
            snapshot_description: self
                .snapshot_description
                .or(blank(fallback.snapshot_description)),
        }
    }

    /// Names of required keys that are still unset, in declaration order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("webhook_url", self.webhook_url.is_none()),
            ("client_id", self.client_id.is_none()),
            ("client_secret", self.client_secret.is_none()),
            ("api_user", self.api_user.is_none()),
            ("api_password", self.api_password.is_none()),
            ("cron_schedule", self.cron_schedule.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, missing)| missing.then_some(key))
        .collect()
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Validated, immutable process configuration.
#[derive(Clone)]
pub struct Config {
    pub webhook_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub api_user: String,
    pub api_password: String,
    pub cron_schedule: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub auth_url: String,
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub snapshot_description: String,
}

impl Config {
    /// Build config from the environment, falling back to the YAML file at
    /// `path` for anything the environment leaves unset.
    /// Call `load_dotenv()` first if a `.env` file should be honoured.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::resolve(ConfigLayer::from_env()?, path)
    }

    /// Merge `primary` with the file at `path` and validate the result.
    pub fn resolve(primary: ConfigLayer, path: &Path) -> Result<Self, ConfigError> {
        let merged = match ConfigLayer::from_yaml_file(path)? {
            Some(file) => {
                tracing::debug!(path = %path.display(), "Loaded config file");
                primary.or(file)
            }
            None => {
                if !primary.missing_required().is_empty() {
                    tracing::warn!(
                        path = %path.display(),
                        "Configuration file not found. Ensure all environment variables are set."
                    );
                }
                primary
            }
        };
        Self::try_from(merged)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  schedule:    cron={}", self.cron_schedule);
        tracing::info!("  provider:    api={}, timeout={}s", self.api_url, self.request_timeout_secs);
        tracing::info!("  account:     user={}, client_id={}", self.api_user, self.client_id);
        tracing::info!(
            "  logging:     level={}, file={}",
            self.log_level,
            self.log_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
    }
}

impl TryFrom<ConfigLayer> for Config {
    type Error = ConfigError;

    fn try_from(layer: ConfigLayer) -> Result<Self, Self::Error> {
        let missing = layer.missing_required();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |value: Option<String>, key: &'static str| {
            value.ok_or_else(|| ConfigError::Missing(vec![key]))
        };

        let request_timeout_secs = layer
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            webhook_url: required(layer.webhook_url, "webhook_url")?,
            client_id: required(layer.client_id, "client_id")?,
            client_secret: required(layer.client_secret, "client_secret")?,
            api_user: required(layer.api_user, "api_user")?,
            api_password: required(layer.api_password, "api_password")?,
            cron_schedule: required(layer.cron_schedule, "cron_schedule")?,
            log_level: layer
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_file: log_file_setting(layer.log_file),
            auth_url: layer.auth_url.unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            api_url: layer.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            request_timeout_secs,
            snapshot_description: layer
                .snapshot_description
                .unwrap_or_else(|| DEFAULT_SNAPSHOT_DESCRIPTION.to_string()),
        })
    }
}

/// Unset means the default file; `off` or `none` disables file logging.
fn log_file_setting(value: Option<PathBuf>) -> Option<PathBuf> {
    match value {
        None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        Some(path) => {
            let raw = path.to_string_lossy();
            if raw.eq_ignore_ascii_case("off") || raw.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(path)
            }
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("webhook_url", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_user", &self.api_user)
            .field("api_password", &"<redacted>")
            .field("cron_schedule", &self.cron_schedule)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .field("auth_url", &self.auth_url)
            .field("api_url", &self.api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("snapshot_description", &self.snapshot_description)
            .finish()
    }
}
