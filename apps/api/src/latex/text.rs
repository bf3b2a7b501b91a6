//! Plain-text flattening of LaTeX markup.
//!
//! This is an approximation for feeding text to the LLM (supporting `.tex`
//! files, cover-letter input), not a renderer.

use super::tokenizer::{self, Node, NodeKind};
use super::ParseError;

/// Commands whose following braced arguments are layout or metadata, not prose.
/// The number is how many arguments to drop (`usize::MAX` = all that follow).
const SKIPPED_ARGUMENTS: &[(&str, usize)] = &[
    ("documentclass", usize::MAX),
    ("usepackage", usize::MAX),
    ("newcommand", usize::MAX),
    ("renewcommand", usize::MAX),
    ("newenvironment", usize::MAX),
    ("renewenvironment", usize::MAX),
    ("setlength", usize::MAX),
    ("addtolength", usize::MAX),
    ("setcounter", usize::MAX),
    ("definecolor", usize::MAX),
    ("hypersetup", usize::MAX),
    ("geometry", usize::MAX),
    ("titleformat", usize::MAX),
    ("titlespacing", usize::MAX),
    ("pagestyle", 1),
    ("thispagestyle", 1),
    ("vspace", 1),
    ("hspace", 1),
    ("label", 1),
    ("ref", 1),
    ("color", 1),
    ("input", 1),
    ("include", 1),
    ("fontsize", 2),
    ("href", 1),
];

const ESCAPED_LITERALS: &[&str] = &["&", "%", "$", "#", "_", "{", "}"];

/// Flattens `src` to readable text: literal text and group contents are kept,
/// comments and command names are dropped, `\\` and `\item` start new lines.
pub fn to_plain_text(src: &str) -> Result<String, ParseError> {
    let nodes = tokenizer::parse(src)?;
    let mut out = String::new();
    push_text(src, &nodes, &mut out);
    Ok(normalize(&out))
}

fn push_text(src: &str, nodes: &[Node], out: &mut String) {
    // Arguments still to drop after a layout command.
    let mut skip = 0usize;

    for node in nodes {
        match &node.kind {
            NodeKind::Group(children) => {
                if skip > 0 {
                    skip -= 1;
                } else {
                    push_text(src, children, out);
                }
            }
            NodeKind::Chars => {
                let text = node.verbatim(src);
                let text = if skip > 0 {
                    match strip_options(text) {
                        Some(rest) => rest,
                        None => {
                            skip = 0;
                            text
                        }
                    }
                } else {
                    text
                };
                if !text.is_empty() {
                    if !text.trim().is_empty() {
                        skip = 0;
                    }
                    out.push_str(&text.replace('~', " "));
                }
            }
            NodeKind::Macro { name, argument } => {
                skip = 0;
                match name.as_str() {
                    "\\" | "newline" | "linebreak" => out.push('\n'),
                    "par" => out.push_str("\n\n"),
                    "item" => out.push_str("\n- "),
                    n if ESCAPED_LITERALS.contains(&n) => out.push_str(n),
                    n => {
                        if let Some(children) = argument {
                            out.push_str("\n\n");
                            push_text(src, children, out);
                            out.push('\n');
                        } else if let Some((_, count)) =
                            SKIPPED_ARGUMENTS.iter().find(|(cmd, _)| *cmd == n)
                        {
                            skip = *count;
                        }
                    }
                }
            }
            NodeKind::Environment { body, .. } => {
                skip = 0;
                push_text(src, body, out);
            }
            NodeKind::Math(children) => push_text(src, children, out),
            NodeKind::Comment => {}
        }
    }
}

/// For `\documentclass[11pt]{article}`: drops a leading `[...]` (which the
/// tokenizer leaves in a text run) and returns what follows it. Returns `None`
/// if the text does not start with an option list.
fn strip_options(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Some("");
    }
    let rest = trimmed.strip_prefix('[')?;
    let close = rest.find(']')?;
    Some(&rest[close + 1..])
}

/// Collapses whitespace within each line and runs of blank lines.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.trim().to_string()
}
