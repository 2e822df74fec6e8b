mod handlers;
mod queries;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_quizzes))
        .route("/generate", post(handlers::generate_quiz))
        .route("/:quiz_id", get(handlers::get_quiz).delete(handlers::delete_quiz))
        .route("/:quiz_id/submit", post(handlers::submit_quiz))
}

#[cfg(test)]
mod tests;
