//! Plain-text extraction for Word (.docx) documents.
//!
//! A .docx file is a zip archive; the body lives in `word/document.xml`.
//! Text runs (`w:t`) are concatenated, each paragraph (`w:p`) ends a line,
//! and `w:tab` / `w:br` become a tab and a line break.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a valid .docx archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive has no word/document.xml")]
    MissingDocument,

    #[error("failed to read word/document.xml: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed word/document.xml: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Extracts the body text of a .docx file held in memory.
pub fn docx_to_text(bytes: &[u8]) -> Result<String, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    match archive.by_name(DOCUMENT_PART) {
        Ok(mut part) => {
            part.read_to_string(&mut xml)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Err(DocxError::MissingDocument),
        Err(e) => return Err(e.into()),
    }
    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &str) -> Result<String, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"t" => in_text = true,
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match local_name(e.name().as_ref()) {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text => out.push_str(&String::from_utf8_lossy(e.as_ref())),
            Event::GeneralRef(e) if in_text => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    out.push(resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.trim().to_string())
}

fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "apos" => Some('\''),
        "quot" => Some('"'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        _ => {
            let code = match entity.strip_prefix("#x") {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => entity.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Builds a minimal .docx whose body holds one paragraph per entry.
    pub(crate) fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let bytes = build_docx(&["Led the payments team", "Rust &amp; Go"]);
        assert_eq!(docx_to_text(&bytes).unwrap(), "Led the payments team\nRust & Go");
    }

    #[test]
    fn test_runs_tabs_and_breaks() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>Skills:</w:t></w:r><w:r><w:tab/><w:t>Rust</w:t><w:br/><w:t>Go</w:t></w:r></w:p>
            <w:p/>
            <w:p><w:r><w:t>End</w:t></w:r></w:p>
        </w:body></w:document>"#;
        assert_eq!(document_xml_to_text(xml).unwrap(), "Skills:\tRust\nGo\n\nEnd");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(docx_to_text(b"plain text"), Err(DocxError::Zip(_))));
    }

    #[test]
    fn test_zip_without_document_part() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<a/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        assert!(matches!(docx_to_text(&bytes), Err(DocxError::MissingDocument)));
    }
}
