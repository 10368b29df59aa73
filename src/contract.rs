//! # contract: seams between the pipeline and the Google APIs
//!
//! The orchestration in [`crate::synchronise`] only talks to the remote
//! services through the traits in this module, so the real HTTP clients in
//! [`crate::download`] can be swapped for `mockall` mocks in tests.
//!
//! - [`DocumentLister`] queries the file-listing service (Drive).
//! - [`DocumentFetcher`] retrieves a structured document (Docs).
//!
//! Both are `Send + Sync` and shared by reference across every concurrent
//! document task.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::document::{Document, DriveFile};

/// Error type for the remote service traits (simple boxed error for now)
pub type ApiError = Box<dyn std::error::Error + Send + Sync>;

/// MIME type of native Google Docs documents.
pub const GOOGLE_DOC_MIME_TYPE: &str = "application/vnd.google-apps.document";

/// Parameters of a document listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// Upper bound on the number of files returned.
    pub max_documents: u32,
    /// Only files of this MIME type are returned.
    pub mime_type: String,
}

impl ListQuery {
    pub fn google_docs(max_documents: u32) -> Self {
        Self {
            max_documents,
            mime_type: GOOGLE_DOC_MIME_TYPE.to_string(),
        }
    }

    /// The Drive search expression for this query.
    pub fn search_expression(&self) -> String {
        format!("mimeType = '{}'", self.mime_type.replace('\'', "\\'"))
    }
}

/// Trait for listing the authenticated user's documents.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocumentLister: Send + Sync {
    /// List the user's own files matching the query, newest first, at most
    /// `query.max_documents` of them. An empty list is not an error.
    async fn list_documents(&self, query: &ListQuery) -> Result<Vec<DriveFile>, ApiError>;
}

/// Trait for fetching the full structure of a single document.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_document(&self, document_id: &str) -> Result<Document, ApiError>;
}
