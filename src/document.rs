//! Response shapes of the Drive and Docs APIs.
//!
//! Only the fields the flattener and the listing need are modelled; serde
//! ignores everything else in the payload.

use serde::{Deserialize, Serialize};

/// A file entry as returned by the Drive `files.list` endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub created_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileList {
    #[serde(default)]
    pub files: Option<Vec<DriveFile>>,
}

/// A Google Docs document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<Body>,
}

impl Document {
    /// The ordered content blocks of the document body, empty when the
    /// document has no body.
    pub fn content(&self) -> &[StructuralElement] {
        self.body
            .as_ref()
            .map(|b| b.content.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

/// One content block. Only paragraphs are modelled; tables, section breaks
/// and tables of contents deserialize with `paragraph == None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralElement {
    #[serde(default)]
    pub paragraph: Option<Paragraph>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    #[serde(default)]
    pub elements: Vec<ParagraphElement>,
    #[serde(default)]
    pub paragraph_style: Option<ParagraphStyle>,
}

impl Paragraph {
    /// The named style type, e.g. `HEADING_2` or `NORMAL_TEXT`.
    pub fn named_style_type(&self) -> Option<&str> {
        self.paragraph_style
            .as_ref()
            .and_then(|s| s.named_style_type.as_deref())
    }

    /// Text runs in element order.
    pub fn text_runs(&self) -> impl Iterator<Item = &TextRun> {
        self.elements.iter().filter_map(|e| e.text_run.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphStyle {
    #[serde(default)]
    pub named_style_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphElement {
    #[serde(default)]
    pub text_run: Option<TextRun>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    #[serde(default)]
    pub content: String,
}

/// First ten characters of a document id, for log lines.
pub fn short_id(document_id: &str) -> &str {
    match document_id.char_indices().nth(10) {
        Some((idx, _)) => &document_id[..idx],
        None => document_id,
    }
}
