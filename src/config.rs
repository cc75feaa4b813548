use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Whereizit server
    pub server_url: String,
    /// API key identifying the current user (empty = anonymous)
    pub api_key: String,
    /// Location used for distance sorting in listings
    pub home_lat: Option<f64>,
    pub home_lng: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            api_key: String::new(),
            home_lat: None,
            home_lng: None,
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        if let Ok(server_url) = std::env::var("WHEREIZIT_SERVER_URL") {
            config.server_url = server_url;
        }
        if let Ok(api_key) = std::env::var("WHEREIZIT_API_KEY") {
            config.api_key = api_key;
        }

        Ok(config)
    }

    /// Writes the configuration to the given path, creating parent
    /// directories as needed.
    pub fn save(&self, path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(path.clone(), e))?;
        }
        let contents = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::SerializeError(path.clone(), e))?;
        std::fs::write(path, contents).map_err(|e| ConfigError::WriteError(path.clone(), e))
    }

    /// Default config file path: ~/.config/whereizit/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("whereizit")
            .join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    WriteError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    SerializeError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::WriteError(path, e) => {
                write!(f, "Failed to write config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::SerializeError(path, e) => {
                write!(
                    f,
                    "Failed to serialize config file '{}': {}",
                    path.display(),
                    e
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
