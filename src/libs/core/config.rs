use std::path::Path;
use thiserror::Error;
use url::Url;

fn default_api_base_url() -> String {
    "http://localhost:3000/api/".to_string()
}

fn default_socket_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_database_path() -> String {
    "pranayam.db".to_string()
}

fn default_history_page_size() -> u32 {
    20
}

fn default_discovery_distance_km() -> u32 {
    50
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    64
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config Parse Error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid Url for {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
}

/// Endpoints and tunables for the chat client.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
pub struct ClientConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
    #[serde(default = "default_discovery_distance_km")]
    pub discovery_distance_km: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            socket_url: default_socket_url(),
            database_path: default_database_path(),
            history_page_size: default_history_page_size(),
            discovery_distance_km: default_discovery_distance_km(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_base_url).map_err(|e| ConfigError::InvalidUrl {
            field: "api_base_url",
            reason: e.to_string(),
        })?;
        Url::parse(&self.socket_url).map_err(|e| ConfigError::InvalidUrl {
            field: "socket_url",
            reason: e.to_string(),
        })?;
        Ok(())
    }
}
