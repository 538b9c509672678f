//! Runtime configuration: a TOML file layered under environment overrides.
//!
//! The runtime-recognized keys are the admin password and the public web
//! host URLs; store location and log filtering are operational extras.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "pine-host.toml";

const ENV_ADMIN_PASSWORD: &str = "PINE_HOST_ADMIN_PASSWORD";
const ENV_PUBLIC_URLS: &str = "PINE_HOST_PUBLIC_URLS";
const ENV_PROCESS_STORE: &str = "PINE_HOST_PROCESS_STORE";
const ENV_LOG_FILTER: &str = "PINE_HOST_LOG_FILTER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub admin_password: Option<String>,
    pub public_urls: Vec<String>,
    pub process_store: PathBuf,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_password: None,
            public_urls: Vec::new(),
            process_store: PathBuf::from("process-store"),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: Option<String>,
}

/// Load the config file (when present) and apply environment overrides.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = if path.exists() {
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(password) = std::env::var(ENV_ADMIN_PASSWORD)
        && !password.is_empty()
    {
        config.admin_password = Some(password);
    }
    if let Ok(urls) = std::env::var(ENV_PUBLIC_URLS)
        && !urls.trim().is_empty()
    {
        config.public_urls = urls
            .split(',')
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
    }
    if let Ok(store) = std::env::var(ENV_PROCESS_STORE)
        && !store.trim().is_empty()
    {
        config.process_store = PathBuf::from(store);
    }
    if let Ok(filter) = std::env::var(ENV_LOG_FILTER)
        && !filter.trim().is_empty()
    {
        config.logging.filter = Some(filter);
    }
}
