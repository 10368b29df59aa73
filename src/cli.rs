use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};

use crate::auth::authorize;
use crate::config::Config;
use crate::download::{extract_document_id, DocsClient, DriveClient};
use crate::load_config::{load_config, validate_config};
use crate::synchronise::{fetch_one, synchronise, SynchroniseReport};

/// CLI for gdoc-flatten: download Google Docs as flattened text files.
#[derive(Parser)]
#[clap(
    name = "gdoc-flatten",
    version,
    about = "Download your most recent Google Docs and flatten them into markdown-like text files"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the newest documents in your Drive and save each one
    Sync {
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Maximum number of documents to fetch
        #[clap(long)]
        max_documents: Option<u32>,
        /// Directory the flattened documents are written to
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// Save a single document given its ID or URL
    Fetch {
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Directory the flattened document is written to
        #[clap(long)]
        output_dir: Option<PathBuf>,
        /// Document ID or docs.google.com URL
        document: String,
    },
}

fn resolve_config(
    path: Option<PathBuf>,
    max_documents: Option<u32>,
    output_dir: Option<PathBuf>,
) -> Result<Config> {
    let mut config = load_config(path.as_deref())?;
    if let Some(max) = max_documents {
        config.download.max_documents = max;
    }
    if let Some(dir) = output_dir {
        config.download.output_dir = dir;
    }
    validate_config(&config)?;
    config.trace_loaded();
    Ok(config)
}

async fn connect(config: &Config) -> Result<(DriveClient, DocsClient)> {
    let client = authorize(&config.auth.credentials_path, &config.auth.token_path)
        .await
        .context("Unable to obtain an authorized Google API client")?;
    let client = Arc::new(client);
    tracing::info!("Authorized Google API client constructed");
    Ok((
        DriveClient::new(client.clone(), &config.api.drive_base_url),
        DocsClient::new(client, &config.api.docs_base_url),
    ))
}

fn print_report(report: &SynchroniseReport) {
    println!("Synchronise complete.\nReport:");
    println!("{:#?}", report);
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            max_documents,
            output_dir,
        } => {
            let config = resolve_config(config, max_documents, output_dir)?;
            let (drive, docs) = connect(&config).await?;
            println!("Synchronise starting...");
            let report = synchronise(&config.download, &drive, &docs)
                .await
                .map_err(|e| {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    anyhow::Error::new(e)
                })?;
            tracing::info!(command = "sync", saved = report.saved(), failed = report.failed(), "Synchronisation complete");
            print_report(&report);
            Ok(())
        }
        Commands::Fetch {
            config,
            output_dir,
            document,
        } => {
            let document_id = extract_document_id(&document)
                .with_context(|| format!("Could not extract document ID from: {document}"))?;
            let config = resolve_config(config, None, output_dir)?;
            let (_, docs) = connect(&config).await?;
            let report = fetch_one(&config.download, &docs, &document_id)
                .await
                .map_err(|e| {
                    tracing::error!(command = "fetch", error = %e, "Fetch failed");
                    anyhow::Error::new(e)
                })?;
            print_report(&report);
            Ok(())
        }
    }
}
