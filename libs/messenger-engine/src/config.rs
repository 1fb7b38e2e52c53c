use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Ingestion settings. Embedded (flattened) in the server's TOML config.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum message length in characters.
    #[serde(default = "default_max_content_len")]
    pub max_content_len: usize,

    /// Upper bound on any single store call, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_max_content_len() -> usize {
    1000
}

fn default_store_timeout_ms() -> u64 {
    5000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_content_len: default_max_content_len(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Reject settings that would make every submission fail.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_content_len == 0 {
            return Err(EngineError::Config("max_content_len must be at least 1".into()));
        }
        if self.store_timeout_ms == 0 {
            return Err(EngineError::Config("store_timeout_ms must be at least 1".into()));
        }
        Ok(())
    }
}
