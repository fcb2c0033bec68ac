use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::EngineError;

pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const DEFAULT_LIST_TTL_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Items requested per page by the accumulator.
    pub page_size: usize,
    /// How long a cached list is served without refetching.
    pub list_ttl_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            list_ttl_ms: DEFAULT_LIST_TTL_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(input).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::InvalidConfig(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.page_size == 0 {
            return Err(EngineError::InvalidConfig("page_size must be positive".into()));
        }
        Ok(())
    }
}
