// Text extraction for the supported document formats

#[cfg(test)]
mod tests;

use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use crate::{RagError, Result};

const DOCX_BODY_PART: &str = "word/document.xml";

/// Document kinds the indexer knows how to turn into text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    /// Plain text, markdown and HTML, read as-is without stripping markup
    PlainText,
    Unsupported(String),
}

impl DocumentFormat {
    /// Classify by file extension, case-insensitively
    #[inline]
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "txt" | "md" | "html" => Self::PlainText,
            other => Self::Unsupported(other.to_string()),
        }
    }

    #[inline]
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or_else(|| Self::Unsupported(String::new()), Self::from_extension)
    }

    #[inline]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    #[inline]
    pub fn is_pdf(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

impl fmt::Display for DocumentFormat {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Docx => write!(f, "docx"),
            Self::PlainText => write!(f, "text"),
            Self::Unsupported(ext) if ext.is_empty() => write!(f, "(no extension)"),
            Self::Unsupported(ext) => write!(f, ".{}", ext),
        }
    }
}

/// Convert raw document bytes into UTF-8 text.
///
/// `document` names the source in error messages.
#[inline]
pub fn extract_text(bytes: &[u8], format: &DocumentFormat, document: &str) -> Result<String> {
    debug!(
        "Extracting {} bytes from {} as {}",
        bytes.len(),
        document,
        format
    );

    match format {
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
            RagError::Extraction {
                document: document.to_string(),
                message: format!("PDF parsing failed: {}", e),
            }
        }),
        DocumentFormat::Docx => extract_docx(bytes).map_err(|message| RagError::Extraction {
            document: document.to_string(),
            message,
        }),
        DocumentFormat::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
        DocumentFormat::Unsupported(_) => Err(RagError::UnsupportedFormat(format!(
            "{} ({})",
            document, format
        ))),
    }
}

/// Read a file and extract its text off the async runtime
#[inline]
pub async fn extract_file(path: &Path) -> Result<String> {
    let format = DocumentFormat::from_path(path);
    let document = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    if !format.is_supported() {
        return Err(RagError::UnsupportedFormat(format!("{} ({})", document, format)));
    }

    let bytes = tokio::fs::read(path).await?;

    tokio::task::spawn_blocking(move || extract_text(&bytes, &format, &document))
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Extraction task failed: {}", e)))?
}

/// Pull paragraph text out of the main document part of a DOCX archive
fn extract_docx(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("Invalid DOCX archive: {}", e))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .map_err(|e| format!("Missing {}: {}", DOCX_BODY_PART, e))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("Failed to read {}: {}", DOCX_BODY_PART, e))?;

    docx_xml_to_text(&xml)
}

/// Collect `w:t` runs, breaking lines at paragraphs and explicit breaks
fn docx_xml_to_text(xml: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_text_run = true;
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text_run {
                    match e.unescape() {
                        Ok(run) => text.push_str(&run),
                        Err(err) => warn!("Skipping undecodable DOCX text run: {}", err),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "Malformed DOCX XML at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}
