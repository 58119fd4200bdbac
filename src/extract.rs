//! Content extraction: turns a file's bytes into something a multimodal
//! consumer can take directly (plain text or text + data-URI parts).

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use serde::Serialize;

use crate::fs_ops::TextEncoding;
use crate::mime::{MediaKind, media_for_ext};
use crate::readers::{docx, pdf, sheet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One element of a mixed text/media payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// Serialized untagged: a bare string or an array of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExtractedContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub content: ExtractedContent,
    pub is_extracted: bool,
    /// Encoding reported back to the caller.
    pub encoding: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Pdf,
    Docx,
    Workbook,
    Csv,
    Media(MediaKind, &'static str),
    Text,
}

fn format_for(ext: &str) -> Format {
    match ext {
        "pdf" => Format::Pdf,
        "docx" => Format::Docx,
        "xlsx" | "xls" => Format::Workbook,
        "csv" => Format::Csv,
        other => match media_for_ext(other) {
            Some((kind, mime)) => Format::Media(kind, mime),
            None => Format::Text,
        },
    }
}

pub fn lowercase_ext(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

/// Decode `bytes` (the full contents of `path`) according to its extension.
///
/// Document and spreadsheet decoders are synchronous and run on the blocking
/// pool.
pub async fn extract(path: &Path, bytes: Vec<u8>, encoding: TextEncoding) -> Result<Extraction> {
    let ext = lowercase_ext(path);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let extracted_text = |text: String| Extraction {
        content: ExtractedContent::Text(text),
        is_extracted: true,
        encoding: "utf8".to_string(),
    };

    match format_for(&ext) {
        Format::Pdf => {
            let text = blocking(move || pdf::pdf_text(&bytes)).await?;
            Ok(extracted_text(text))
        }
        Format::Docx => {
            let text = blocking(move || docx::docx_text(&bytes)).await?;
            Ok(extracted_text(text))
        }
        Format::Workbook => {
            let text = blocking(move || sheet::workbook_text(bytes)).await?;
            Ok(extracted_text(text))
        }
        Format::Csv => Ok(extracted_text(sheet::csv_text(&encoding.decode(&bytes)))),
        Format::Media(kind, mime) => Ok(Extraction {
            content: ExtractedContent::Parts(vec![
                ContentPart::text(format!("read {} file '{}'", kind.label(), file_name)),
                ContentPart::image_url(data_uri(mime, &bytes)),
            ]),
            is_extracted: true,
            encoding: "utf8".to_string(),
        }),
        Format::Text => Ok(Extraction {
            content: ExtractedContent::Text(encoding.decode(&bytes)),
            is_extracted: false,
            encoding: encoding.name(),
        }),
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Extraction task panicked")?
}
