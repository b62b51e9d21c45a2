//! Persisted settings and service endpoints.
//!
//! # Design
//! Settings are owned by the host and handed to the core as plain data.
//! On disk they are a small JSON object; every field defaults to an empty
//! string, so a partial or missing file loads as "not configured yet"
//! rather than failing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_REST_URL: &str = "https://api.rememberthemilk.com/services/rest/";
pub const DEFAULT_AUTH_URL: &str = "https://www.rememberthemilk.com/services/auth/";

/// Credentials for the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub shared_secret: String,
    pub auth_token: String,
}

impl Settings {
    /// `true` once the API key and shared secret are both set.
    pub fn has_app_keys(&self) -> bool {
        !self.api_key.is_empty() && !self.shared_secret.is_empty()
    }

    /// `true` once the authentication flow has stored a token.
    pub fn is_authenticated(&self) -> bool {
        self.has_app_keys() && !self.auth_token.is_empty()
    }
}

/// Base URLs of the REST endpoint and the browser authorization page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub rest_url: String,
    pub auth_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            rest_url: DEFAULT_REST_URL.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Point both endpoints at one base URL, as the mock server lays them out.
    pub fn with_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            rest_url: format!("{base}/services/rest/"),
            auth_url: format!("{base}/services/auth/"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write settings to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where the host keeps `Settings` between runs.
pub trait SettingsStore {
    fn load(&self) -> Result<Settings, ConfigError>;
    fn save(&self, settings: &Settings) -> Result<(), ConfigError>;
}

/// Stores settings as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let json = serde_json::to_string_pretty(settings).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(write_err)
    }
}
