use std::fs;
use std::path::Path;
use std::time::Duration;

use inspectsync_engine::{EngineConfig, EngineError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the remote record store lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Path segment of the per-entity detail endpoint.
    pub detail_path: String,
    /// Path segment of the per-section write endpoint.
    pub submit_path: String,
    pub timeout_secs: u64,
    /// Sent as a bearer token when present.
    pub auth_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".into(),
            detail_path: "inspections".into(),
            submit_path: "inspections".into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auth_token: None,
        }
    }
}

impl RemoteConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(input).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let contents = read(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| EngineError::InvalidConfig(format!("base_url: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(EngineError::InvalidConfig(format!(
                "base_url cannot carry paths: {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(EngineError::InvalidConfig("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Everything a client app needs to stand up an engine, as one TOML file:
///
/// ```toml
/// database_path = "inspect.db"
///
/// [engine]
/// page_size = 25
///
/// [remote]
/// base_url = "https://api.example.com/v1"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub database_path: String,
    pub engine: EngineConfig,
    pub remote: RemoteConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_path: "inspectsync.db".into(),
            engine: EngineConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(input).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.engine.validate()?;
        config.remote.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let contents = read(path.as_ref())?;
        Self::from_toml(&contents)
    }
}

fn read(path: &Path) -> Result<String, EngineError> {
    fs::read_to_string(path)
        .map_err(|e| EngineError::InvalidConfig(format!("{}: {e}", path.display())))
}
