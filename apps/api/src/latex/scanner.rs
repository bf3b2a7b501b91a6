//! Section Boundary Scanner: splits a LaTeX resume into named sections.
//!
//! When the document has a `document` environment, only its body is scanned.
//! Otherwise headings are found at the top level and inside any environment
//! that precedes the first heading of its container. Environments inside a section and brace groups are
//! never descended into, so section regions cannot overlap.
//!
//! A section's content runs from the end of its heading command to the start
//! of the next heading in the same container, or to the end of the container
//! (just before `\end{document}` for the document body). Text before the first
//! heading belongs to no section.

use tracing::debug;

use super::tokenizer::{self, Node, NodeKind};
use super::{ParseError, DEFAULT_HEADING, UNNAMED_SECTION};
use crate::models::sections::SectionMap;

/// Control symbols that stand for a literal character inside a title.
const ESCAPED_LITERALS: &[&str] = &["&", "%", "$", "#", "_", "{", "}"];

/// Scans `document` for `\section` headings.
pub fn scan(document: &str) -> Result<SectionMap, ParseError> {
    scan_with(document, DEFAULT_HEADING)
}

/// Scans `document` using `heading` (e.g. `"subsection"`) as the boundary
/// command.
pub fn scan_with(document: &str, heading: &str) -> Result<SectionMap, ParseError> {
    let nodes = tokenizer::parse_with(document, &[heading])?;

    let mut sections = SectionMap::new();
    collect_sections(document, &nodes, document.len(), heading, &mut sections);

    debug!(
        "Scanned {} section(s) with heading \\{}",
        sections.len(),
        heading
    );
    Ok(sections)
}

fn collect_sections(
    src: &str,
    nodes: &[Node],
    container_end: usize,
    heading: &str,
    sections: &mut SectionMap,
) {
    // Only the body of a `document` environment is typeset; headings in the
    // preamble (`\renewcommand\section{...}`) or after it are not sections.
    if let Some(Node {
        kind: NodeKind::Environment { body, body_end, .. },
        ..
    }) = nodes.iter().find(|node| is_document(node))
    {
        collect_sections(src, body, *body_end, heading, sections);
        return;
    }

    let headings: Vec<&Node> = nodes
        .iter()
        .filter(|node| node.macro_name() == Some(heading))
        .collect();

    let first_heading = headings.first().map_or(container_end, |node| node.start);
    for node in nodes.iter().take_while(|node| node.start < first_heading) {
        if let NodeKind::Environment { body, body_end, .. } = &node.kind {
            collect_sections(src, body, *body_end, heading, sections);
        }
    }

    for (i, node) in headings.iter().enumerate() {
        let end = headings
            .get(i + 1)
            .map_or(container_end, |next| next.start);
        let content = src[node.end..end].trim();
        sections.push(extract_title(src, node), content);
    }
}

fn is_document(node: &Node) -> bool {
    matches!(&node.kind, NodeKind::Environment { name, .. } if name == "document")
}

/// Flattens the heading's title argument to plain text: literal characters
/// are kept, nested groups are flattened, commands are dropped (except
/// escaped literals such as `\&`). Whitespace runs collapse to one space.
fn extract_title(src: &str, heading: &Node) -> String {
    let NodeKind::Macro {
        argument: Some(children),
        ..
    } = &heading.kind
    else {
        return UNNAMED_SECTION.to_string();
    };

    let mut raw = String::new();
    push_title_text(src, children, &mut raw);

    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        UNNAMED_SECTION.to_string()
    } else {
        title
    }
}

fn push_title_text(src: &str, nodes: &[Node], out: &mut String) {
    for node in nodes {
        match &node.kind {
            NodeKind::Chars => out.push_str(&node.verbatim(src).replace('~', " ")),
            NodeKind::Group(children) => push_title_text(src, children, out),
            NodeKind::Macro { name, .. } if ESCAPED_LITERALS.contains(&name.as_str()) => {
                out.push_str(name)
            }
            // `\bf Title` or `\hspace{1em}`: the command itself contributes nothing
            NodeKind::Macro { .. } => out.push(' '),
            NodeKind::Comment | NodeKind::Math(_) | NodeKind::Environment { .. } => {}
        }
    }
}
