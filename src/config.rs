use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::contract::GOOGLE_DOC_MIME_TYPE;
use crate::download::{DEFAULT_DOCS_BASE_URL, DEFAULT_DRIVE_BASE_URL};

/// Largest page the Drive `files.list` endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub download: DownloadConfig,
    pub api: ApiConfig,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            credentials_path = %self.auth.credentials_path.display(),
            token_path = %self.auth.token_path.display(),
            output_dir = %self.download.output_dir.display(),
            max_documents = self.download.max_documents,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

/// Where the OAuth client configuration and the cached token live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
        }
    }
}

/// What to list and where the flattened documents go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    pub max_documents: u32,
    pub mime_type: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("doc"),
            max_documents: 10,
            mime_type: GOOGLE_DOC_MIME_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub drive_base_url: String,
    pub docs_base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            drive_base_url: DEFAULT_DRIVE_BASE_URL.to_string(),
            docs_base_url: DEFAULT_DOCS_BASE_URL.to_string(),
        }
    }
}
