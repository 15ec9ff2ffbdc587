//! Plain-text extraction from uploaded files.
//!
//! Dispatch is by lowercase file suffix onto the closed [`DocumentFormat`]
//! enum. PDF and DOCX parsing is CPU-bound and runs on the blocking pool.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// A supported upload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// Portable Document Format; text is extracted page by page.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// UTF-8 text.
    PlainText,
}

impl DocumentFormat {
    /// Every supported format.
    pub const ALL: [DocumentFormat; 3] = [Self::Pdf, Self::Docx, Self::PlainText];

    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Determine the format of `path` from its suffix.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFileType`] for any other suffix, or none.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        Self::from_extension(&extension).ok_or(RagError::UnsupportedFileType { extension })
    }

    /// The canonical lowercase extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "txt",
        }
    }
}

/// Extract the plain text of the file at `path`.
///
/// - PDF pages are joined with `\n`; a page without extractable text
///   (scanned images, unsupported fonts) contributes an empty string.
/// - DOCX paragraphs are joined with `\n`.
/// - Text files are decoded as UTF-8 with invalid byte sequences dropped.
///
/// # Errors
///
/// - [`RagError::UnsupportedFileType`] for an unrecognised suffix.
/// - [`RagError::ExtractionError`] if the file cannot be read or parsed.
pub async fn extract(path: &Path) -> Result<String> {
    let format = DocumentFormat::from_path(path)?;
    let failed = |message: String| RagError::ExtractionError { path: path.to_path_buf(), message };

    let bytes =
        tokio::fs::read(path).await.map_err(|e| failed(format!("failed to read file: {e}")))?;
    debug!(path = %path.display(), ?format, bytes = bytes.len(), "extracting text");

    let text = match format {
        DocumentFormat::PlainText => decode_utf8_lossy_dropping(&bytes),
        DocumentFormat::Pdf => tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|e| failed(format!("task join error: {e}")))?
            .map_err(|e| failed(format!("PDF extraction failed: {e}")))?,
        DocumentFormat::Docx => tokio::task::spawn_blocking(move || extract_docx_text(&bytes))
            .await
            .map_err(|e| failed(format!("task join error: {e}")))?
            .map_err(|e| failed(format!("DOCX extraction failed: {e}")))?,
    };

    Ok(text)
}

/// Decode UTF-8, skipping invalid sequences instead of replacing them.
fn decode_utf8_lossy_dropping(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn extract_pdf_text(bytes: &[u8]) -> std::result::Result<String, String> {
    let document = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
    let pages = document.get_pages();

    let mut empty_pages = 0usize;
    let texts: Vec<String> = pages
        .keys()
        .map(|&page| match document.extract_text(&[page]) {
            Ok(text) => text,
            Err(e) => {
                debug!(page, error = %e, "page has no extractable text");
                empty_pages += 1;
                String::new()
            }
        })
        .collect();

    if empty_pages > 0 {
        warn!(pages = pages.len(), empty_pages, "PDF contains pages without extractable text");
    }
    Ok(texts.join("\n"))
}

fn extract_docx_text(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing word/document.xml: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;
    docx_paragraphs(&xml).map(|paragraphs| paragraphs.join("\n"))
}

/// Collect the text of every `w:p` paragraph in a `document.xml` body.
fn docx_paragraphs(xml: &str) -> std::result::Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Tab stop definitions live in `w:tabs` inside paragraph properties.
    let mut in_tab_stops = false;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                b"tabs" => in_tab_stops = true,
                b"tab" if !in_tab_stops => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(String::new()),
                b"tab" if !in_tab_stops => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(text) if in_text => {
                current.push_str(&text.unescape().map_err(|e| e.to_string())?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tabs" => in_tab_stops = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}
