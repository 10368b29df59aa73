use crate::config::{Config, MAX_PAGE_SIZE};
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Overrides `auth.credentials_path`.
pub const CREDENTIALS_PATH_ENV: &str = "GDOC_CREDENTIALS_PATH";
/// Overrides `auth.token_path`.
pub const TOKEN_PATH_ENV: &str = "GDOC_TOKEN_PATH";

/// Loads the optional YAML config file and applies environment overrides.
///
/// Without a file every setting takes its default. Keys missing from the
/// file take their defaults as well. The result is not validated: callers
/// apply their own overrides first and then call [`validate_config`].
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path_ref) => read_config_file(path_ref)?,
        None => {
            info!("No config file given, using defaults");
            Config::default()
        }
    };

    if let Ok(credentials) = std::env::var(CREDENTIALS_PATH_ENV) {
        info!(env = CREDENTIALS_PATH_ENV, path = %credentials, "Credentials path taken from environment");
        config.auth.credentials_path = PathBuf::from(credentials);
    }
    if let Ok(token) = std::env::var(TOKEN_PATH_ENV) {
        info!(env = TOKEN_PATH_ENV, path = %token, "Token path taken from environment");
        config.auth.token_path = PathBuf::from(token);
    }

    Ok(config)
}

fn read_config_file(path_ref: &Path) -> Result<Config> {
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    if config_content.trim().is_empty() {
        return Ok(Config::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Rejects settings the APIs cannot serve.
pub fn validate_config(config: &Config) -> Result<()> {
    let max = config.download.max_documents;
    if max == 0 || max > MAX_PAGE_SIZE {
        error!(max_documents = max, "max_documents out of range");
        anyhow::bail!("max_documents must be between 1 and {MAX_PAGE_SIZE}, got {max}");
    }
    if config.download.mime_type.trim().is_empty() {
        anyhow::bail!("mime_type must not be empty");
    }
    Ok(())
}
