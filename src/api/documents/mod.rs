mod handlers;
mod queries;

use axum::extract::DefaultBodyLimit;
use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

/// Slack on top of the file limit for the multipart framing and the title field.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub(crate) fn router(max_upload_size_mb: u64) -> Router<AppState> {
    let body_limit = (max_upload_size_mb as usize) * 1024 * 1024 + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/", post(handlers::create_document).get(handlers::list_documents))
        .route(
            "/upload",
            post(handlers::upload_document).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/:document_id", get(handlers::get_document).delete(handlers::delete_document))
}
