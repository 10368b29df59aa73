use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("gdoc-flatten").expect("Binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync").and(predicate::str::contains("fetch")));
}

#[test]
fn sync_without_credentials_file_fails() {
    let workdir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("gdoc-flatten").expect("Binary exists");

    cmd.current_dir(workdir.path())
        .env_remove("GDOC_CREDENTIALS_PATH")
        .env_remove("GDOC_TOKEN_PATH")
        .arg("sync");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unable to obtain an authorized Google API client"));
    assert!(!workdir.path().join("token.json").exists());
    assert!(!workdir.path().join("doc").exists());
}

#[test]
fn sync_rejects_out_of_range_max_documents() {
    let workdir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("gdoc-flatten").expect("Binary exists");

    cmd.current_dir(workdir.path())
        .args(["sync", "--max-documents", "0"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("max_documents"));
}

#[test]
fn sync_max_documents_flag_overrides_config_file() {
    let workdir = tempdir().unwrap();
    std::fs::write(
        workdir.path().join("gdoc.yaml"),
        "download:\n  max_documents: 0\n",
    )
    .unwrap();
    let mut cmd = Command::cargo_bin("gdoc-flatten").expect("Binary exists");

    cmd.current_dir(workdir.path())
        .env_remove("GDOC_CREDENTIALS_PATH")
        .env_remove("GDOC_TOKEN_PATH")
        .args(["sync", "--config", "gdoc.yaml", "--max-documents", "5"]);

    // Validation passes, so the run only stops at the missing credentials.
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Unable to obtain an authorized Google API client"))
        .stderr(predicate::str::contains("max_documents must be").not());
}

#[test]
fn fetch_rejects_unrecognised_document_reference() {
    let workdir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("gdoc-flatten").expect("Binary exists");

    cmd.current_dir(workdir.path())
        .args(["fetch", "https://example.com/not/a/doc"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Could not extract document ID"));
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use gdoc_flatten::cli::{run, Cli, Commands};

    // An unusable document reference fails before any network access.
    let cli = Cli {
        command: Commands::Fetch {
            config: None,
            output_dir: None,
            document: "not a document".to_string(),
        },
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
