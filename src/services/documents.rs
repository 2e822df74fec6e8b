use std::path::Path;

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::Document;
use crate::repositories;
use crate::services::extraction::DocumentFormat;

const FALLBACK_TITLE: &str = "Untitled document";
const MAX_TITLE_CHARS: usize = 255;

pub(crate) struct NewDocument<'a> {
    pub(crate) title: &'a str,
    pub(crate) text: &'a str,
    pub(crate) source_filename: Option<&'a str>,
    pub(crate) source_format: Option<DocumentFormat>,
}

pub(crate) fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// File stem of an uploaded filename, used when the upload carries no title.
pub(crate) fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .unwrap_or_default();

    if stem.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    stem.chars().take(MAX_TITLE_CHARS).collect()
}

pub(crate) async fn store(
    pool: &PgPool,
    user_id: &str,
    document: NewDocument<'_>,
) -> Result<Document, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let hash = content_hash(document.text);

    let stored = repositories::documents::create(
        pool,
        repositories::documents::CreateDocument {
            id: &id,
            user_id,
            title: document.title.trim(),
            original_text: document.text,
            source_filename: document.source_filename,
            source_format: document.source_format.map(DocumentFormat::as_str),
            content_hash: &hash,
            now: primitive_now_utc(),
        },
    )
    .await?;

    tracing::info!(
        document_id = %stored.id,
        chars = stored.original_text.chars().count(),
        format = document.source_format.map(DocumentFormat::as_str).unwrap_or("text"),
        "Document stored"
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn title_from_filename_uses_stem() {
        assert_eq!(title_from_filename("lectures/Week 1 - Cells.pdf"), "Week 1 - Cells");
        assert_eq!(title_from_filename("notes.md"), "notes");
        assert_eq!(title_from_filename(""), FALLBACK_TITLE);
    }
}
