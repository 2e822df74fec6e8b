use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Document;
use crate::repositories::documents::DocumentListRow;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct DocumentCreate {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub(crate) title: String,
    #[serde(alias = "content")]
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct DocumentResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) text: String,
    pub(crate) source_filename: Option<String>,
    pub(crate) source_format: Option<String>,
    pub(crate) char_count: usize,
    pub(crate) content_hash: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            char_count: document.original_text.chars().count(),
            id: document.id,
            title: document.title,
            text: document.original_text,
            source_filename: document.source_filename,
            source_format: document.source_format,
            content_hash: document.content_hash,
            created_at: format_primitive(document.created_at),
            updated_at: format_primitive(document.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DocumentSummaryResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) source_filename: Option<String>,
    pub(crate) source_format: Option<String>,
    pub(crate) char_count: i32,
    pub(crate) quiz_count: i64,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl From<DocumentListRow> for DocumentSummaryResponse {
    fn from(row: DocumentListRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            source_filename: row.source_filename,
            source_format: row.source_format,
            char_count: row.char_count,
            quiz_count: row.quiz_count,
            created_at: format_primitive(row.created_at),
            updated_at: format_primitive(row.updated_at),
        }
    }
}
