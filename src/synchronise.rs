//! High-level pipeline: orchestrates list → fetch → flatten → save.
//!
//! Every listed document gets its own future and all of them are polled
//! concurrently, without a cap, through a single join. The clients are
//! borrowed read-only by every task.
//!
//! # Error Handling
//! - A failed listing or a failed document fetch is fatal: the join stops
//!   at the first [`SyncError`], the remaining tasks are dropped, and the
//!   error is returned. Files written by tasks that already finished stay on
//!   disk.
//! - A failed flatten/save is logged and recorded as
//!   [`DocumentOutcome::Failed`] in the report; sibling tasks are unaffected.
//!
//! # Navigation
//! - Main entrypoints: [`synchronise`], [`fetch_one`]
//! - Supporting types: [`SynchroniseReport`], [`DocumentReport`].

use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use thiserror::Error;
use tracing::{error, info};

use crate::config::DownloadConfig;
use crate::contract::{ApiError, DocumentFetcher, DocumentLister, ListQuery};
use crate::preprocess;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unable to retrieve file list: {0}")]
    Listing(#[source] ApiError),
    #[error("unable to retrieve document {document_id}: {source}")]
    Fetch {
        document_id: String,
        #[source]
        source: ApiError,
    },
}

/// Outcome of one synchronise run.
#[derive(Debug, Default)]
pub struct SynchroniseReport {
    pub documents: Vec<DocumentReport>,
}

impl SynchroniseReport {
    pub fn saved(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.outcome, DocumentOutcome::Saved(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.saved()
    }
}

#[derive(Debug)]
pub struct DocumentReport {
    pub document_id: String,
    pub title: String,
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    /// Flattened text written to this path.
    Saved(PathBuf),
    /// Flatten or save failed with this error.
    Failed(String),
}

/// Lists the user's documents and saves each one, concurrently.
pub async fn synchronise<L, F>(
    config: &DownloadConfig,
    lister: &L,
    fetcher: &F,
) -> Result<SynchroniseReport, SyncError>
where
    L: DocumentLister + ?Sized,
    F: DocumentFetcher + ?Sized,
{
    info!(
        max_documents = config.max_documents,
        output_dir = %config.output_dir.display(),
        "[SYNC] Starting document synchronisation"
    );

    let query = ListQuery {
        max_documents: config.max_documents,
        mime_type: config.mime_type.clone(),
    };
    let files = lister.list_documents(&query).await.map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Listing documents failed");
        SyncError::Listing(e)
    })?;

    if files.is_empty() {
        info!(count = 0, "[SYNC] No documents to process");
        return Ok(SynchroniseReport::default());
    }

    let tasks = files
        .iter()
        .map(|file| download_extract_save(fetcher, &file.id, &config.output_dir));
    let documents = try_join_all(tasks).await?;

    let report = SynchroniseReport { documents };
    info!(
        saved = report.saved(),
        failed = report.failed(),
        "[SYNC] All document tasks finished"
    );
    Ok(report)
}

/// Saves a single, known document.
pub async fn fetch_one<F>(
    config: &DownloadConfig,
    fetcher: &F,
    document_id: &str,
) -> Result<SynchroniseReport, SyncError>
where
    F: DocumentFetcher + ?Sized,
{
    info!(document_id, "[SYNC] Fetching single document");
    let document = download_extract_save(fetcher, document_id, &config.output_dir).await?;
    Ok(SynchroniseReport {
        documents: vec![document],
    })
}

/// Download, extract and save one document.
async fn download_extract_save<F>(
    fetcher: &F,
    document_id: &str,
    output_dir: &Path,
) -> Result<DocumentReport, SyncError>
where
    F: DocumentFetcher + ?Sized,
{
    let document = fetcher.fetch_document(document_id).await.map_err(|e| {
        error!(document_id, error = %e, "[SYNC][ERROR] Document fetch failed");
        SyncError::Fetch {
            document_id: document_id.to_string(),
            source: e,
        }
    })?;

    let title = document.title.clone();
    let id = document_id.to_string();
    let dir = output_dir.to_path_buf();
    let saved =
        tokio::task::spawn_blocking(move || preprocess::extract_and_save(&document, &id, &dir))
            .await;

    let outcome = match saved {
        Ok(Ok(path)) => DocumentOutcome::Saved(path),
        Ok(Err(e)) => {
            error!(title = %title, document_id, error = %e, "Could not extract and save doc");
            DocumentOutcome::Failed(e.to_string())
        }
        Err(e) => {
            error!(title = %title, document_id, error = %e, "Save task did not complete");
            DocumentOutcome::Failed(e.to_string())
        }
    };

    Ok(DocumentReport {
        document_id: document_id.to_string(),
        title,
        outcome,
    })
}
