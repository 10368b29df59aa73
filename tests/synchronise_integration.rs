use std::fs;
use std::path::Path;

use serde_json::json;
use tempfile::tempdir;

use gdoc_flatten::config::DownloadConfig;
use gdoc_flatten::contract::{MockDocumentFetcher, MockDocumentLister, GOOGLE_DOC_MIME_TYPE};
use gdoc_flatten::document::{Document, DriveFile};
use gdoc_flatten::synchronise::{fetch_one, synchronise, DocumentOutcome, SyncError};

fn download_config(output_dir: &Path) -> DownloadConfig {
    DownloadConfig {
        output_dir: output_dir.to_path_buf(),
        max_documents: 10,
        mime_type: GOOGLE_DOC_MIME_TYPE.to_string(),
    }
}

fn drive_file(id: &str) -> DriveFile {
    DriveFile {
        id: id.to_string(),
        name: format!("Name of {id}"),
        mime_type: GOOGLE_DOC_MIME_TYPE.to_string(),
        created_time: None,
    }
}

fn document_for(id: &str) -> Document {
    serde_json::from_value(json!({
        "documentId": id,
        "title": format!("Title {id}"),
        "body": { "content": [
            { "paragraph": {
                "elements": [ { "textRun": { "content": format!("{id}\n") } } ],
                "paragraphStyle": { "namedStyleType": "HEADING_1" }
            } },
            { "paragraph": {
                "elements": [ { "textRun": { "content": "body" } } ],
                "paragraphStyle": { "namedStyleType": "NORMAL_TEXT" }
            } }
        ] }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_synchronise_saves_every_listed_document() {
    let tmp = tempdir().unwrap();
    let output_dir = tmp.path().join("doc");
    let config = download_config(&output_dir);

    let mut lister = MockDocumentLister::new();
    lister
        .expect_list_documents()
        .times(1)
        .withf(|q| q.max_documents == 10 && q.mime_type == GOOGLE_DOC_MIME_TYPE)
        .returning(|_| Ok(vec![drive_file("docA"), drive_file("docB"), drive_file("docC")]));

    let mut fetcher = MockDocumentFetcher::new();
    fetcher
        .expect_fetch_document()
        .times(3)
        .returning(|id| Ok(document_for(id)));

    let report = synchronise(&config, &lister, &fetcher)
        .await
        .expect("Synchronise should succeed");

    assert_eq!(report.documents.len(), 3);
    assert_eq!(report.saved(), 3);
    assert_eq!(report.failed(), 0);
    for id in ["docA", "docB", "docC"] {
        let content = fs::read_to_string(output_dir.join(id)).unwrap();
        assert_eq!(content, format!("# {id}\nbody"));
    }
    let titles: Vec<_> = report.documents.iter().map(|d| d.title.as_str()).collect();
    assert!(titles.contains(&"Title docB"));
}

#[tokio::test]
async fn test_synchronise_with_no_listed_documents_writes_nothing() {
    let tmp = tempdir().unwrap();
    let output_dir = tmp.path().join("doc");
    let config = download_config(&output_dir);

    let mut lister = MockDocumentLister::new();
    lister.expect_list_documents().return_once(|_| Ok(vec![]));
    let mut fetcher = MockDocumentFetcher::new();
    fetcher.expect_fetch_document().never();

    let report = synchronise(&config, &lister, &fetcher)
        .await
        .expect("An empty listing is not an error");

    assert!(report.documents.is_empty());
    assert!(!output_dir.exists(), "No output directory should be created");
}

#[tokio::test]
async fn test_synchronise_listing_failure_is_fatal() {
    let tmp = tempdir().unwrap();
    let config = download_config(tmp.path());

    let mut lister = MockDocumentLister::new();
    lister
        .expect_list_documents()
        .return_once(|_| Err("Google API error (403 Forbidden)".into()));
    let fetcher = MockDocumentFetcher::new();

    let err = synchronise(&config, &lister, &fetcher).await.unwrap_err();
    assert!(matches!(err, SyncError::Listing(_)), "got {err:?}");
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn test_synchronise_fetch_failure_aborts_the_run() {
    let tmp = tempdir().unwrap();
    let output_dir = tmp.path().join("doc");
    let config = download_config(&output_dir);

    let mut lister = MockDocumentLister::new();
    lister
        .expect_list_documents()
        .return_once(|_| Ok(vec![drive_file("good1"), drive_file("broken"), drive_file("good2")]));

    let mut fetcher = MockDocumentFetcher::new();
    fetcher.expect_fetch_document().returning(|id| {
        if id == "broken" {
            Err("Google API error (404 Not Found)".into())
        } else {
            Ok(document_for(id))
        }
    });

    let err = synchronise(&config, &lister, &fetcher).await.unwrap_err();
    match err {
        SyncError::Fetch { document_id, .. } => assert_eq!(document_id, "broken"),
        other => panic!("expected fetch failure, got {other:?}"),
    }
    assert!(!output_dir.join("broken").exists());
}

#[tokio::test]
async fn test_synchronise_fetch_failure_keeps_completed_files() {
    let tmp = tempdir().unwrap();
    let output_dir = tmp.path().join("doc");
    let config = download_config(&output_dir);

    let mut fetcher = MockDocumentFetcher::new();
    fetcher.expect_fetch_document().returning(|id| {
        if id == "broken" {
            Err("Google API error (500 Internal Server Error)".into())
        } else {
            Ok(document_for(id))
        }
    });

    // A document whose task already finished.
    let report = fetch_one(&config, &fetcher, "done").await.unwrap();
    assert_eq!(
        report.documents[0].outcome,
        DocumentOutcome::Saved(output_dir.join("done"))
    );

    let mut lister = MockDocumentLister::new();
    lister
        .expect_list_documents()
        .return_once(|_| Ok(vec![drive_file("broken")]));

    let err = synchronise(&config, &lister, &fetcher).await.unwrap_err();
    assert!(matches!(err, SyncError::Fetch { ref document_id, .. } if document_id == "broken"));

    assert_eq!(fs::read_to_string(output_dir.join("done")).unwrap(), "# done\nbody");
    assert!(!output_dir.join("broken").exists());
}

#[tokio::test]
async fn test_synchronise_save_failure_is_recorded_and_run_continues() {
    let tmp = tempdir().unwrap();
    // A regular file where the output directory should be.
    let output_dir = tmp.path().join("doc");
    fs::write(&output_dir, b"not a directory").unwrap();
    let config = download_config(&output_dir);

    let mut lister = MockDocumentLister::new();
    lister
        .expect_list_documents()
        .return_once(|_| Ok(vec![drive_file("docA"), drive_file("docB")]));
    let mut fetcher = MockDocumentFetcher::new();
    fetcher
        .expect_fetch_document()
        .times(2)
        .returning(|id| Ok(document_for(id)));

    let report = synchronise(&config, &lister, &fetcher)
        .await
        .expect("Save failures must not fail the run");

    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.saved(), 0);
    assert_eq!(report.failed(), 2);
    for doc in &report.documents {
        assert!(
            matches!(&doc.outcome, DocumentOutcome::Failed(msg) if msg.contains("output directory")),
            "unexpected outcome {:?}",
            doc.outcome
        );
    }
}

#[tokio::test]
async fn test_fetch_one_saves_the_requested_document() {
    let tmp = tempdir().unwrap();
    let config = download_config(tmp.path());

    let mut fetcher = MockDocumentFetcher::new();
    fetcher
        .expect_fetch_document()
        .withf(|id| id == "1xYz")
        .times(1)
        .returning(|id| Ok(document_for(id)));

    let report = fetch_one(&config, &fetcher, "1xYz").await.unwrap();

    assert_eq!(report.documents.len(), 1);
    assert_eq!(
        report.documents[0].outcome,
        DocumentOutcome::Saved(tmp.path().join("1xYz"))
    );
    assert_eq!(fs::read_to_string(tmp.path().join("1xYz")).unwrap(), "# 1xYz\nbody");
}

#[tokio::test]
async fn test_fetch_one_propagates_fetch_failure() {
    let tmp = tempdir().unwrap();
    let config = download_config(tmp.path());

    let mut fetcher = MockDocumentFetcher::new();
    fetcher
        .expect_fetch_document()
        .return_once(|_| Err("connection refused".into()));

    let err = fetch_one(&config, &fetcher, "missing").await.unwrap_err();
    assert!(err.to_string().contains("missing"));
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}
