use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use thiserror::Error;

/// Upper bound on the decompressed size of a single office archive entry.
const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub(crate) enum ExtractionError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read PDF: {0}")]
    Pdf(String),
    #[error("failed to read office archive: {0}")]
    Archive(String),
    #[error("failed to parse document XML: {0}")]
    Xml(String),
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document is not valid UTF-8 text")]
    InvalidUtf8,
    #[error("no text could be extracted from the document")]
    Empty,
    #[error("extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentFormat {
    Pdf,
    Txt,
    Md,
    Docx,
    Pptx,
    Json,
}

impl DocumentFormat {
    pub(crate) fn from_extension(extension: &str) -> Result<Self, ExtractionError> {
        match extension.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::Txt),
            "md" => Ok(Self::Md),
            "docx" => Ok(Self::Docx),
            "pptx" => Ok(Self::Pptx),
            "json" => Ok(Self::Json),
            other => Err(ExtractionError::UnsupportedFormat(other.to_string())),
        }
    }

    pub(crate) fn from_filename(filename: &str) -> Result<Self, ExtractionError> {
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ExtractionError::UnsupportedFormat(filename.to_string()))?;
        Self::from_extension(extension)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Json => "json",
        }
    }
}

/// Extracts and cleans the text of an uploaded document on the blocking pool.
pub(crate) async fn extract_text(
    format: DocumentFormat,
    bytes: Vec<u8>,
) -> Result<String, ExtractionError> {
    let raw = tokio::task::spawn_blocking(move || extract_raw(format, &bytes))
        .await
        .map_err(|err| ExtractionError::Task(err.to_string()))??;

    let cleaned = clean_text(&raw);
    if cleaned.is_empty() {
        return Err(ExtractionError::Empty);
    }

    tracing::debug!(format = format.as_str(), chars = cleaned.len(), "Document text extracted");
    Ok(cleaned)
}

/// Trims every line and drops blank ones.
pub(crate) fn clean_text(raw: &str) -> String {
    raw.lines().map(str::trim).filter(|line| !line.is_empty()).collect::<Vec<_>>().join("\n")
}

fn extract_raw(format: DocumentFormat, bytes: &[u8]) -> Result<String, ExtractionError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Txt | DocumentFormat::Md => {
            String::from_utf8(bytes.to_vec()).map_err(|_| ExtractionError::InvalidUtf8)
        }
        DocumentFormat::Docx => extract_docx(bytes),
        DocumentFormat::Pptx => extract_pptx(bytes),
        DocumentFormat::Json => extract_json(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|err| ExtractionError::Pdf(err.to_string()))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        match document.extract_text(&[page_number]) {
            Ok(text) => pages.push(text),
            Err(err) => {
                tracing::warn!(page = page_number, error = %err, "Skipping unreadable PDF page");
            }
        }
    }

    Ok(pages.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    Ok(xml_paragraphs(&xml)?.join("\n"))
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = open_archive(bytes)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|number| (number, name.to_string())))
        .collect();
    slides.sort_by_key(|(number, _)| *number);

    let mut lines = Vec::new();
    for (_, name) in slides {
        let xml = read_entry(&mut archive, &name)?;
        lines.extend(xml_paragraphs(&xml)?);
    }

    Ok(lines.join("\n"))
}

fn slide_number(entry: &str) -> Option<u32> {
    entry.strip_prefix("ppt/slides/slide")?.strip_suffix(".xml")?.parse().ok()
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, ExtractionError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|err| ExtractionError::Archive(err.to_string()))
}

fn read_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<String, ExtractionError> {
    read_entry_limited(archive, name, MAX_ENTRY_BYTES)
}

fn read_entry_limited(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    limit: u64,
) -> Result<String, ExtractionError> {
    let entry = archive.by_name(name).map_err(|err| ExtractionError::Archive(err.to_string()))?;
    let mut xml = String::new();
    // One byte past the limit tells an oversized entry from one exactly at it.
    let read = entry
        .take(limit.saturating_add(1))
        .read_to_string(&mut xml)
        .map_err(|err| ExtractionError::Archive(err.to_string()))?;
    if read as u64 > limit {
        return Err(ExtractionError::Archive(format!(
            "entry {name} expands beyond {limit} bytes"
        )));
    }
    Ok(xml)
}

/// Text of every non-empty `<*:p>` paragraph, reading runs from `<*:t>` elements.
/// Works for both WordprocessingML and DrawingML.
fn xml_paragraphs(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(|err| ExtractionError::Xml(err.to_string()))? {
            Event::Start(element) if element.local_name().as_ref() == b"t" => in_text = true,
            Event::End(element) => match element.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Empty(element) => {
                if matches!(element.local_name().as_ref(), b"tab" | b"br") {
                    current.push(' ');
                }
            }
            Event::Text(text) if in_text => {
                let text = text.unescape().map_err(|err| ExtractionError::Xml(err.to_string()))?;
                current.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn extract_json(bytes: &[u8]) -> Result<String, ExtractionError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let mut leaves = Vec::new();
    collect_leaves(&value, &mut leaves);
    Ok(leaves.join(" "))
}

fn collect_leaves(value: &Value, leaves: &mut Vec<String>) {
    match value {
        Value::String(text) => leaves.push(text.clone()),
        Value::Number(number) => leaves.push(number.to_string()),
        Value::Bool(flag) => leaves.push(flag.to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_leaves(item, leaves)),
        Value::Object(map) => map.values().for_each(|item| collect_leaves(item, leaves)),
        Value::Null => {}
    }
}
