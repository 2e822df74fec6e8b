use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Document;

pub(crate) const COLUMNS: &str = "\
    id, user_id, title, original_text, source_filename, source_format, content_hash, \
    created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DocumentListRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) source_filename: Option<String>,
    pub(crate) source_format: Option<String>,
    pub(crate) char_count: i32,
    pub(crate) quiz_count: i64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) total_count: i64,
}

pub(crate) struct CreateDocument<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) original_text: &'a str,
    pub(crate) source_filename: Option<&'a str>,
    pub(crate) source_format: Option<&'a str>,
    pub(crate) content_hash: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateDocument<'_>,
) -> Result<Document, sqlx::Error> {
    sqlx::query_as::<_, Document>(&format!(
        "INSERT INTO documents (
            id, user_id, title, original_text, source_filename, source_format, content_hash,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.title)
    .bind(params.original_text)
    .bind(params.source_filename)
    .bind(params.source_format)
    .bind(params.content_hash)
    .bind(params.now)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_for_user(
    pool: &PgPool,
    document_id: &str,
    user_id: &str,
) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {COLUMNS} FROM documents WHERE id = $1 AND user_id = $2"
    ))
    .bind(document_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct ListDocumentsParams {
    pub(crate) user_id: String,
    pub(crate) title: Option<String>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    params: ListDocumentsParams,
) -> Result<Vec<DocumentListRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT d.id,
                d.title,
                d.source_filename,
                d.source_format,
                char_length(d.original_text) AS char_count,
                COALESCE(q.quiz_count, 0) AS quiz_count,
                d.created_at,
                d.updated_at,
                COUNT(*) OVER() AS total_count
         FROM documents d
         LEFT JOIN (
             SELECT document_id, COUNT(*) AS quiz_count
             FROM quizzes
             GROUP BY document_id
         ) q ON q.document_id = d.id
         WHERE d.user_id = ",
    );
    builder.push_bind(params.user_id);

    if let Some(title) = params.title {
        builder.push(" AND d.title ILIKE ");
        builder.push_bind(format!("%{title}%"));
    }

    builder.push(" ORDER BY d.created_at DESC, d.id OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<DocumentListRow>().fetch_all(pool).await
}

/// Quizzes, questions, choices and attempts go with the document through FK cascades.
pub(crate) async fn delete_for_user(
    pool: &PgPool,
    document_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM documents WHERE id = $1 AND user_id = $2")
        .bind(document_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
