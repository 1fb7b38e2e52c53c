use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use messenger_api::OverflowPolicy;
use messenger_engine::EngineConfig;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "messenger-server", about = "Message ingestion and live fan-out service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml", env = "MESSENGER_CONFIG")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Validation and store-timeout settings.
    #[serde(flatten)]
    pub engine: EngineConfig,
    /// Store backend: "memory" or "file".
    #[serde(default = "default_storage")]
    pub storage: String,
    /// Backend-specific settings, passed to the store factory as JSON.
    #[serde(default)]
    pub storage_config: Option<toml::Value>,
    /// Per-client live feed buffer.
    #[serde(default = "default_ws_buffer")]
    pub ws_buffer: usize,
    #[serde(default = "default_ws_overflow")]
    pub ws_overflow: OverflowPolicy,
}

fn default_api_port() -> u16 {
    9300
}
fn default_storage() -> String {
    "memory".into()
}
fn default_ws_buffer() -> usize {
    1024
}
fn default_ws_overflow() -> OverflowPolicy {
    OverflowPolicy::Drop
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `storage_config` as a JSON string, `"{}"` when absent.
    pub fn storage_config_json(&self) -> Result<String, ServerError> {
        match &self.storage_config {
            Some(v) => serde_json::to_string(v)
                .map_err(|e| ServerError::Config { context: "storage_config", detail: e.to_string() }),
            None => Ok("{}".to_string()),
        }
    }
}
