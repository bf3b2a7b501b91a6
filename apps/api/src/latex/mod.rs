// Markup handling for LaTeX resumes: tokenizing, section scanning, and
// plain-text flattening. Everything here is synchronous and in-memory.

pub mod scanner;
pub mod text;
pub mod tokenizer;

use thiserror::Error;

pub use scanner::{scan, scan_with};
pub use text::to_plain_text;

/// The heading command that delimits resume sections.
pub const DEFAULT_HEADING: &str = "section";

/// Title used when a heading's title cannot be extracted.
pub const UNNAMED_SECTION: &str = "Unnamed";

/// The markup could not be tokenized. Fatal: no partial result is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unterminated command at line {line} (offset {offset})")]
    UnterminatedCommand { offset: usize, line: usize },

    #[error("unclosed '{{' opened at line {line} (offset {offset})")]
    UnclosedGroup { offset: usize, line: usize },

    #[error("unexpected '}}' at line {line} (offset {offset})")]
    UnexpectedCloseBrace { offset: usize, line: usize },

    #[error("environment '{name}' opened at line {line} is never closed")]
    UnclosedEnvironment {
        name: String,
        offset: usize,
        line: usize,
    },

    #[error("\\end{{{found}}} at line {line} does not match \\begin{{{expected}}}")]
    MismatchedEnd {
        expected: String,
        found: String,
        offset: usize,
        line: usize,
    },

    #[error("\\end{{{name}}} at line {line} has no matching \\begin")]
    UnexpectedEnd {
        name: String,
        offset: usize,
        line: usize,
    },

    #[error("math opened at line {line} (offset {offset}) is never closed")]
    UnclosedMath { offset: usize, line: usize },

    #[error("malformed environment name at line {line} (offset {offset})")]
    MalformedEnvironmentName { offset: usize, line: usize },

    #[error("unclosed '[' argument at line {line} (offset {offset})")]
    UnclosedOptionalArgument { offset: usize, line: usize },

    #[error("nesting too deep at line {line} (offset {offset})")]
    NestingTooDeep { offset: usize, line: usize },
}
