//! Per-file text extraction, chosen by file extension.
//!
//! PDF parsing is CPU-bound, so it runs inside `tokio::task::spawn_blocking`
//! to keep the async executor free. A panic inside the PDF parser surfaces as
//! an `ExtractionError::Pdf` rather than taking the request down.

use std::path::Path;

use tracing::{debug, warn};

use super::docx::docx_to_text;
use super::ExtractionError;
use crate::latex::to_plain_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedFormat {
    Pdf,
    Docx,
    Markdown,
    Tex,
    Text,
}

impl SupportedFormat {
    /// Format of `path` by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "md" | "markdown" => Some(Self::Markdown),
            "tex" => Some(Self::Tex),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Markdown => "md",
            Self::Tex => "tex",
            Self::Text => "txt",
        }
    }
}

/// Extracts plain text from one file. Returns `Ok(None)` for unsupported
/// extensions.
pub async fn extract_text(path: &Path) -> Result<Option<String>, ExtractionError> {
    let Some(format) = SupportedFormat::from_path(path) else {
        debug!("Skipping unsupported file {}", path.display());
        return Ok(None);
    };

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ExtractionError::Io {
            file: path.to_path_buf(),
            source,
        })?;

    let text = extract_bytes(path, format, bytes).await?;
    debug!(
        "Extracted {} chars from {} ({})",
        text.len(),
        path.display(),
        format.extension()
    );
    Ok(Some(text))
}

/// Extracts plain text from file contents already in memory. `path` is only
/// used for error reporting.
pub async fn extract_bytes(
    path: &Path,
    format: SupportedFormat,
    bytes: Vec<u8>,
) -> Result<String, ExtractionError> {
    let file = path.to_path_buf();
    match format {
        SupportedFormat::Pdf => {
            let joined =
                tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                    .await;
            match joined {
                Ok(Ok(text)) => Ok(text.trim().to_string()),
                Ok(Err(e)) => Err(ExtractionError::Pdf {
                    file,
                    message: e.to_string(),
                }),
                Err(e) => Err(ExtractionError::Pdf {
                    file,
                    message: format!("PDF parser failed: {e}"),
                }),
            }
        }
        SupportedFormat::Docx => {
            docx_to_text(&bytes).map_err(|source| ExtractionError::Docx { file, source })
        }
        SupportedFormat::Markdown | SupportedFormat::Text => {
            let text = String::from_utf8(bytes).map_err(|_| ExtractionError::Utf8 { file })?;
            Ok(text.trim().to_string())
        }
        SupportedFormat::Tex => {
            let raw = String::from_utf8(bytes).map_err(|_| ExtractionError::Utf8 { file })?;
            match to_plain_text(&raw) {
                Ok(text) => Ok(text),
                Err(e) => {
                    warn!(
                        "Could not flatten {} ({}); using raw LaTeX",
                        path.display(),
                        e
                    );
                    Ok(raw.trim().to_string())
                }
            }
        }
    }
}
