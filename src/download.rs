//! Drive and Docs API clients.
//!
//! Both wrap one shared [`AuthorizedClient`] and implement the traits in
//! [`crate::contract`] that the synchronise pipeline is written against.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, error, info};

use crate::auth::AuthorizedClient;
use crate::contract::{ApiError, DocumentFetcher, DocumentLister, ListQuery};
use crate::document::{short_id, Document, DriveFile, FileList};

pub const DEFAULT_DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_DOCS_BASE_URL: &str = "https://docs.googleapis.com/v1";

/// Drive v3 client used to list the user's documents.
pub struct DriveClient {
    client: Arc<AuthorizedClient>,
    base_url: String,
}

impl DriveClient {
    pub fn new(client: Arc<AuthorizedClient>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn files_url(&self) -> String {
        format!("{}/files", self.base_url)
    }
}

/// Query parameters for `files.list`.
pub fn list_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    vec![
        ("corpora", "user".to_string()),
        ("orderBy", "createdTime desc".to_string()),
        ("pageSize", query.max_documents.to_string()),
        ("q", query.search_expression()),
        ("fields", "files(id,name,mimeType,createdTime)".to_string()),
    ]
}

#[async_trait]
impl DocumentLister for DriveClient {
    async fn list_documents(&self, query: &ListQuery) -> Result<Vec<DriveFile>, ApiError> {
        let url = self.files_url();
        debug!(url = %url, ?query, "Listing documents");

        let list: FileList = self
            .client
            .get_json(&url, &list_params(query))
            .await
            .map_err(|e| {
                error!(error = %e, "Unable to retrieve file list from google drive");
                e
            })?;

        let mut files = list.files.unwrap_or_default();
        // The service honours pageSize, but never hand back more than asked.
        files.truncate(query.max_documents as usize);
        if files.is_empty() {
            info!("No files returned from google drive");
        } else {
            info!(count = files.len(), "Obtained {} files", files.len());
        }
        Ok(files)
    }
}

/// Docs v1 client used to fetch full document structures.
pub struct DocsClient {
    client: Arc<AuthorizedClient>,
    base_url: String,
}

impl DocsClient {
    pub fn new(client: Arc<AuthorizedClient>, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn document_url(&self, document_id: &str) -> String {
        format!("{}/documents/{}", self.base_url, document_id)
    }
}

#[async_trait]
impl DocumentFetcher for DocsClient {
    async fn fetch_document(&self, document_id: &str) -> Result<Document, ApiError> {
        let url = self.document_url(document_id);
        let no_query: [(&str, &str); 0] = [];

        // TODO: retry transient (429/5xx) failures before giving up
        let doc: Document = self.client.get_json(&url, &no_query).await.map_err(|e| {
            error!(error = %e, document_id, "Unable to retrieve data from document");
            e
        })?;

        info!(
            title = %doc.title,
            id = short_id(document_id),
            "Downloaded doc {} {}...",
            doc.title,
            short_id(document_id)
        );
        Ok(doc)
    }
}

fn doc_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/document/(?:u/\d+/)?d/([A-Za-z0-9_-]+)").expect("document URL pattern is valid")
    })
}

/// Extracts the document ID from a Google Docs URL, or accepts a bare ID.
pub fn extract_document_id(url_or_id: &str) -> Option<String> {
    let trimmed = url_or_id.trim();
    if trimmed.contains("docs.google.com") {
        return doc_url_pattern()
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
    }
    let is_bare_id = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    is_bare_id.then(|| trimmed.to_string())
}
