// Context Aggregator: turns the staged supporting files of one request
// (experience notes, project READMEs, the job description) into the single
// plain-text context handed to every rewrite call.

pub mod aggregate;
pub mod docx;
pub mod extract;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub use aggregate::aggregate;
pub use extract::SupportedFormat;

/// Separator between the texts of two supporting files.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Aggregated plain text of all supporting material for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteContext(String);

impl RewriteContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Joins non-empty pieces with [`CONTEXT_SEPARATOR`], in the given order.
    pub fn from_pieces(pieces: impl IntoIterator<Item = String>) -> Self {
        let joined = pieces
            .into_iter()
            .filter(|piece| !piece.trim().is_empty())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for RewriteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A supporting file could not be turned into text. Fatal to the whole
/// aggregation.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read '{file}': {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract text from PDF '{file}': {message}")]
    Pdf { file: PathBuf, message: String },

    #[error("failed to extract text from Word document '{file}': {source}")]
    Docx {
        file: PathBuf,
        #[source]
        source: docx::DocxError,
    },

    #[error("'{file}' is not valid UTF-8")]
    Utf8 { file: PathBuf },

    #[error("failed to list supporting files in '{dir}': {source}")]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractionError {
    /// The file (or directory) the failure belongs to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { file, .. }
            | Self::Pdf { file, .. }
            | Self::Docx { file, .. }
            | Self::Utf8 { file } => file,
            Self::ReadDir { dir, .. } => dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pieces_skips_blank_pieces() {
        let context = RewriteContext::from_pieces(vec![
            "Job: Rust".to_string(),
            "  \n".to_string(),
            "Project: tailor".to_string(),
        ]);
        assert_eq!(context.as_str(), "Job: Rust\n\nProject: tailor");
    }

    #[test]
    fn test_empty_context() {
        assert!(RewriteContext::default().is_empty());
        assert!(RewriteContext::from_pieces(Vec::new()).is_empty());
    }
}
