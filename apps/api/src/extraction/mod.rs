//! Document Extractor — turns a PDF or DOCX byte stream into normalized
//! plain text. Purely functional; the original bytes are never retained.

use std::io::Read;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

/// Extracted text below this length is a strong signal of a scanned or
/// image-only document.
const MIN_TEXT_CHARS: usize = 100;

/// Rough words-per-page used when the format exposes no page structure.
const WORDS_PER_PAGE: usize = 500;

#[derive(Debug, Error)]
pub enum DocumentParseError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("invalid or corrupted document: {0}")]
    Malformed(String),

    #[error(
        "extracted text is empty or too short ({chars} chars); \
         the document may be scanned or image-based"
    )]
    TooShort { chars: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Infers the format from the filename extension. `.doc` is handled by
    /// the DOCX path, matching the accepted upload extensions.
    pub fn from_filename(filename: &str) -> Result<Self, DocumentParseError> {
        let extension = filename
            .rsplit('.')
            .next()
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" | "doc" => Ok(DocumentFormat::Docx),
            _ => Err(DocumentParseError::UnsupportedFormat(format!(
                ".{extension}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub pages: usize,
}

/// Extracts and normalizes text from raw document bytes.
pub fn extract(
    bytes: &[u8],
    format: DocumentFormat,
) -> Result<ExtractedDocument, DocumentParseError> {
    let (raw, pages) = match format {
        DocumentFormat::Pdf => extract_pdf(bytes)?,
        DocumentFormat::Docx => extract_docx(bytes)?,
    };

    let text = normalize_text(&raw);
    if text.len() < MIN_TEXT_CHARS {
        return Err(DocumentParseError::TooShort { chars: text.len() });
    }

    let pages = pages.unwrap_or_else(|| estimate_pages(&text));
    debug!("extracted {} chars across {} pages", text.len(), pages);

    Ok(ExtractedDocument { text, pages })
}

fn extract_pdf(bytes: &[u8]) -> Result<(String, Option<usize>), DocumentParseError> {
    let raw = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| DocumentParseError::Malformed(format!("pdf: {e}")))?;

    // Form feeds mark page starts or separators depending on the producer;
    // when none survive extraction, fall back to the word-count estimate.
    let breaks = raw.matches('\u{c}').count();
    let pages = if breaks > 0 {
        Some(breaks + usize::from(!raw.starts_with('\u{c}')))
    } else {
        None
    };

    Ok((raw, pages))
}

/// Walks `word/document.xml` inside the OOXML container, collecting run text
/// and mapping paragraph/tab/break elements to their plain-text equivalents.
fn extract_docx(bytes: &[u8]) -> Result<(String, Option<usize>), DocumentParseError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| DocumentParseError::Malformed(format!("docx container: {e}")))?;

    let mut xml = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| DocumentParseError::Malformed(format!("docx body missing: {e}")))?
        .read_to_end(&mut xml)
        .map_err(|e| DocumentParseError::Malformed(format!("docx body unreadable: {e}")))?;

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| DocumentParseError::Malformed(format!("docx xml: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocumentParseError::Malformed(format!("docx xml: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok((out, None))
}

/// Collapses boilerplate whitespace while preserving paragraph breaks: inner
/// runs of spaces/tabs become one space, runs of blank lines become one blank
/// line, and page breaks become paragraph separators.
fn normalize_text(raw: &str) -> String {
    let unified = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{c}', "\n\n");

    let mut lines: Vec<String> = Vec::new();
    let mut prev_blank = true;
    for line in unified.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !prev_blank {
                lines.push(String::new());
            }
            prev_blank = true;
        } else {
            lines.push(collapsed);
            prev_blank = false;
        }
    }
    while lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn estimate_pages(text: &str) -> usize {
    (text.split_whitespace().count() / WORDS_PER_PAGE).max(1)
}

/// Builds a minimal in-memory DOCX for tests elsewhere in the crate.
#[cfg(test)]
pub(crate) fn docx_fixture(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;

    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{body}</w:body></w:document>"#
    );

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", zip::write::FileOptions::default())
        .expect("start docx body");
    writer.write_all(xml.as_bytes()).expect("write docx body");
    writer.finish().expect("finish docx").into_inner()
}
