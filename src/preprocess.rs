//! Flattens a structured Google Docs document into markdown-like text.
//!
//! Paragraph styles named `HEADING_<n>` become `n` leading `#` characters
//! and a space; the text runs of each paragraph are written verbatim and in
//! order. Nothing else of the document structure survives.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::document::{short_id, Document, Paragraph};

const HEADING_MARKER: &str = "HEADING_";
/// Largest heading level honoured. Higher levels are written as plain text.
pub const MAX_HEADING_LEVEL: usize = 100;

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("invalid document id {0:?} for an output file name")]
    InvalidDocumentId(String),
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create output file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write flattened text: {0}")]
    Write(#[from] std::io::Error),
}

/// Heading level encoded in a named style type such as `HEADING_3`.
///
/// The suffix after the first `HEADING_` must parse as an unsigned integer
/// between 1 and [`MAX_HEADING_LEVEL`]; anything else means "not a heading".
pub fn heading_level(named_style_type: &str) -> Option<usize> {
    let idx = named_style_type.find(HEADING_MARKER)?;
    let suffix = &named_style_type[idx + HEADING_MARKER.len()..];
    match suffix.parse::<usize>() {
        Ok(level) if (1..=MAX_HEADING_LEVEL).contains(&level) => Some(level),
        _ => None,
    }
}

fn write_paragraph<W: Write>(paragraph: &Paragraph, writer: &mut W) -> std::io::Result<()> {
    if let Some(level) = paragraph.named_style_type().and_then(heading_level) {
        io::copy(&mut io::repeat(b'#').take(level as u64), writer)?;
        writer.write_all(b" ")?;
    }
    for run in paragraph.text_runs() {
        writer.write_all(run.content.as_bytes())?;
    }
    // TODO: emit bullet markers for list paragraphs (paragraph.bullet)
    Ok(())
}

/// Write the flattened text of `document` to `writer`.
///
/// Output is buffered and flushed after every paragraph. The first write
/// or flush failure stops processing and is returned.
pub fn flatten_document<W: Write>(document: &Document, writer: W) -> Result<(), FlattenError> {
    let mut w = BufWriter::new(writer);
    for block in document.content() {
        let Some(paragraph) = &block.paragraph else {
            continue;
        };
        if paragraph.text_runs().next().is_none() {
            continue;
        }
        write_paragraph(paragraph, &mut w)?;
        w.flush()?;
    }
    Ok(())
}

/// Flatten `document` into an in-memory string.
pub fn flatten_to_string(document: &Document) -> Result<String, FlattenError> {
    let mut out = Vec::new();
    flatten_document(document, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn validate_document_id(document_id: &str) -> Result<(), FlattenError> {
    let invalid = document_id.is_empty()
        || document_id == "."
        || document_id == ".."
        || document_id.contains(['/', '\\']);
    if invalid {
        return Err(FlattenError::InvalidDocumentId(document_id.to_string()));
    }
    Ok(())
}

/// Flatten `document` into `<output_dir>/<document_id>`, creating the
/// directory if needed and truncating any previous file.
pub fn extract_and_save(
    document: &Document,
    document_id: &str,
    output_dir: &Path,
) -> Result<PathBuf, FlattenError> {
    validate_document_id(document_id)?;

    fs::create_dir_all(output_dir).map_err(|e| {
        error!(error = ?e, path = %output_dir.display(), "Failed to create output directory");
        FlattenError::CreateDir {
            path: output_dir.to_path_buf(),
            source: e,
        }
    })?;

    let path = output_dir.join(document_id);
    let file = File::create(&path).map_err(|e| {
        error!(error = ?e, path = %path.display(), "Failed to create output file");
        FlattenError::CreateFile {
            path: path.clone(),
            source: e,
        }
    })?;
    debug!(path = %path.display(), blocks = document.content().len(), "Writing flattened document");

    flatten_document(document, file)?;

    info!(
        title = %document.title,
        id = short_id(document_id),
        "Finished processing doc {} {}...",
        document.title,
        short_id(document_id)
    );
    Ok(path)
}
