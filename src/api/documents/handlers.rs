use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{window, PaginatedResponse};
use crate::api::validation::validate_document_upload;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::document::{DocumentCreate, DocumentResponse, DocumentSummaryResponse};
use crate::services::documents::{self, NewDocument};
use crate::services::extraction::{self, clean_text};

use super::queries::ListDocumentsQuery;

pub(super) async fn create_document(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Result<Json<DocumentCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let Json(payload) = payload.map_err(ApiError::malformed_body)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let text = clean_text(&payload.text);
    if text.is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }

    let document = documents::store(
        state.db(),
        &user.id,
        NewDocument { title: &payload.title, text: &text, source_filename: None, source_format: None },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store document"))?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

pub(super) async fn upload_document(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let storage = state.settings().storage();
    let max_bytes = storage.max_upload_size_mb * 1024 * 1024;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut title: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            filename = field.file_name().map(|s| s.to_string());
            let mut bytes = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
            {
                let next_size = bytes.len() as u64 + chunk.len() as u64;
                if next_size > max_bytes {
                    return Err(ApiError::BadRequest(format!(
                        "File size exceeds {}MB limit",
                        storage.max_upload_size_mb
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }
            file_bytes = Some(bytes);
        } else if name == "title" {
            let text = field
                .text()
                .await
                .map_err(|_| ApiError::BadRequest("Invalid title".to_string()))?;
            title = Some(text.trim().to_string()).filter(|value| !value.is_empty());
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;
    let filename = filename.unwrap_or_default();
    let format = validate_document_upload(&filename, &storage.allowed_document_extensions)?;

    let text = extraction::extract_text(format, bytes).await?;
    let title = title.unwrap_or_else(|| documents::title_from_filename(&filename));
    if title.chars().count() > 255 {
        return Err(ApiError::BadRequest("title must be 1-255 characters".to_string()));
    }

    let document = documents::store(
        state.db(),
        &user.id,
        NewDocument {
            title: &title,
            text: &text,
            source_filename: Some(&filename),
            source_format: Some(format),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store document"))?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

pub(super) async fn list_documents(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ListDocumentsQuery>,
) -> Result<Json<PaginatedResponse<DocumentSummaryResponse>>, ApiError> {
    let (skip, limit) = window(params.skip, params.limit);

    let rows = repositories::documents::list_for_user(
        state.db(),
        repositories::documents::ListDocumentsParams {
            user_id: user.id,
            title: params.title.filter(|title| !title.trim().is_empty()),
            skip,
            limit,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list documents"))?;

    let total_count = rows.first().map(|row| row.total_count).unwrap_or(0);
    let items = rows.into_iter().map(DocumentSummaryResponse::from).collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

pub(super) async fn get_document(
    Path(document_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = repositories::documents::find_for_user(state.db(), &document_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch document"))?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    Ok(Json(DocumentResponse::from(document)))
}

pub(super) async fn delete_document(
    Path(document_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::documents::delete_for_user(state.db(), &document_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete document"))?;

    if !deleted {
        return Err(ApiError::NotFound("Document not found".to_string()));
    }

    tracing::info!(document_id = %document_id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}
