//! Document Reconstructor: splices rewritten sections back into the source.
//!
//! Works on a private copy of the document. Sections are visited in the
//! original map's (document) order; each changed section's original content
//! is located by literal substring search, starting after the previously
//! located section, and replaced once. The result is checked by
//! re-scanning it: if it no longer parses, or its section keys differ from the
//! source's, every edit is discarded and the pristine document is returned as
//! `Reconstruction::Reverted`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::latex::tokenizer;
use crate::latex::{scan_with, DEFAULT_HEADING};
use crate::models::sections::{SectionKey, SectionMap};

/// A section that was left untouched. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconstructionWarning {
    /// The original content was not found verbatim in the working document.
    SectionNotMatched { section: SectionKey },
    /// The original content is empty or whitespace-only; an empty match is
    /// ambiguous, so the section is never substituted.
    EmptyOriginal { section: SectionKey },
    /// The rewrite would break the document structure on its own.
    RewriteRejected { section: SectionKey, reason: String },
}

impl fmt::Display for ReconstructionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SectionNotMatched { section } => {
                write!(f, "section '{section}' not found verbatim in document; skipped")
            }
            Self::EmptyOriginal { section } => {
                write!(f, "section '{section}' has empty original content; skipped")
            }
            Self::RewriteRejected { section, reason } => {
                write!(f, "rewrite of section '{section}' rejected: {reason}")
            }
        }
    }
}

/// Why the whole document was reverted to its original text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevertReason {
    #[error("reconstructed document does not parse: {message}")]
    Unparseable { message: String },

    #[error("reconstructed document has sections {found:?}, expected {expected:?}")]
    SectionsChanged {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("match for section '{section}' fell outside the working document")]
    SpanOutOfRange { section: SectionKey },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconstruction {
    /// The source with zero or more exact section replacements.
    Applied {
        document: String,
        replaced: Vec<SectionKey>,
        warnings: Vec<ReconstructionWarning>,
    },
    /// The pristine source; all edits were discarded.
    Reverted {
        document: String,
        reason: RevertReason,
        warnings: Vec<ReconstructionWarning>,
    },
}

impl Reconstruction {
    pub fn document(&self) -> &str {
        match self {
            Self::Applied { document, .. } | Self::Reverted { document, .. } => document,
        }
    }

    pub fn into_document(self) -> String {
        match self {
            Self::Applied { document, .. } | Self::Reverted { document, .. } => document,
        }
    }

    pub fn warnings(&self) -> &[ReconstructionWarning] {
        match self {
            Self::Applied { warnings, .. } | Self::Reverted { warnings, .. } => warnings,
        }
    }

    pub fn is_reverted(&self) -> bool {
        matches!(self, Self::Reverted { .. })
    }
}

/// Reconstructs `document` with `\section` as the heading command.
pub fn reconstruct(document: &str, original: &SectionMap, rewritten: &SectionMap) -> Reconstruction {
    reconstruct_with(document, original, rewritten, DEFAULT_HEADING)
}

pub fn reconstruct_with(
    document: &str,
    original: &SectionMap,
    rewritten: &SectionMap,
    heading: &str,
) -> Reconstruction {
    let mut working = document.to_string();
    let mut cursor = 0;
    let mut replaced = Vec::new();
    let mut warnings = Vec::new();

    // Document order comes from `original`, whatever order `rewritten` is in.
    for section in original {
        let key = &section.key;
        let Some(after) = rewritten.get(key) else {
            debug!("Section '{}' has no rewrite; kept", key);
            continue;
        };
        let before = section.content.as_str();
        let changed = after != before;

        if before.trim().is_empty() {
            if changed {
                warnings.push(ReconstructionWarning::EmptyOriginal {
                    section: key.clone(),
                });
            }
            continue;
        }

        let Some(tail) = working.get(cursor..) else {
            return revert(
                document,
                RevertReason::SpanOutOfRange {
                    section: key.clone(),
                },
                warnings,
            );
        };
        let Some(found) = tail.find(before) else {
            if changed {
                warnings.push(ReconstructionWarning::SectionNotMatched {
                    section: key.clone(),
                });
            }
            continue;
        };
        let start = cursor + found;
        let end = start + before.len();

        if !changed {
            cursor = end;
            continue;
        }

        if let Err(reason) = check_fragment(after, heading) {
            warnings.push(ReconstructionWarning::RewriteRejected {
                section: key.clone(),
                reason,
            });
            cursor = end;
            continue;
        }

        let replacement = guard_formatting(after);
        working.replace_range(start..end, &replacement);
        cursor = start + replacement.len();
        replaced.push(key.clone());
        debug!("Replaced section '{}'", key);
    }

    for warning in &warnings {
        warn!("Reconstruction: {}", warning);
    }

    if replaced.is_empty() {
        return Reconstruction::Applied {
            document: document.to_string(),
            replaced,
            warnings,
        };
    }

    if let Err(reason) = verify_structure(document, &working, heading) {
        return revert(document, reason, warnings);
    }

    info!("Reconstructed document: {} section(s) replaced", replaced.len());
    Reconstruction::Applied {
        document: working,
        replaced,
        warnings,
    }
}

/// A rewrite must tokenize on its own and must not introduce a heading.
fn check_fragment(fragment: &str, heading: &str) -> Result<(), String> {
    let nodes = tokenizer::parse_with(fragment, &[heading]).map_err(|e| e.to_string())?;
    if tokenizer::contains_macro(&nodes, heading) {
        return Err(format!("introduces a \\{heading} command"));
    }
    Ok(())
}

/// Text that does not open with a command is set off by blank lines so it
/// cannot run into the surrounding paragraph.
fn guard_formatting(rewrite: &str) -> String {
    if rewrite.starts_with('\\') {
        rewrite.to_string()
    } else {
        format!("\n\n{rewrite}\n\n")
    }
}

fn verify_structure(source: &str, result: &str, heading: &str) -> Result<(), RevertReason> {
    let unparseable = |e: crate::latex::ParseError| RevertReason::Unparseable {
        message: e.to_string(),
    };
    let expected = scan_with(source, heading).map_err(unparseable)?;
    let found = scan_with(result, heading).map_err(unparseable)?;

    if !expected.keys().eq(found.keys()) {
        return Err(RevertReason::SectionsChanged {
            expected: expected.keys().map(ToString::to_string).collect(),
            found: found.keys().map(ToString::to_string).collect(),
        });
    }
    Ok(())
}

fn revert(
    document: &str,
    reason: RevertReason,
    warnings: Vec<ReconstructionWarning>,
) -> Reconstruction {
    warn!("Reconstruction reverted to the original document: {}", reason);
    Reconstruction::Reverted {
        document: document.to_string(),
        reason,
        warnings,
    }
}
