use axum::extract::{Query, State};
use axum::{routing::get, Json, Router};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{window, PaginatedResponse};
use crate::api::validation::parse_timestamp_filter;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::attempt::AttemptSummaryResponse;

#[derive(Debug, Deserialize)]
pub(crate) struct ListAttemptsQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    limit: i64,
    #[serde(default)]
    quiz_id: Option<String>,
    #[serde(default)]
    quiz_title: Option<String>,
    #[serde(default)]
    min_score: Option<i32>,
    #[serde(default)]
    max_score: Option<i32>,
    #[serde(default)]
    min_percentage: Option<f64>,
    #[serde(default)]
    attempted_after: Option<String>,
    #[serde(default)]
    attempted_before: Option<String>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_attempts))
}

async fn list_attempts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ListAttemptsQuery>,
) -> Result<Json<PaginatedResponse<AttemptSummaryResponse>>, ApiError> {
    let (skip, limit) = window(params.skip, params.limit);
    let attempted_after =
        parse_timestamp_filter("attempted_after", params.attempted_after.as_deref())?;
    let attempted_before =
        parse_timestamp_filter("attempted_before", params.attempted_before.as_deref())?;

    if let Some(min_percentage) = params.min_percentage {
        if !(0.0..=100.0).contains(&min_percentage) {
            return Err(ApiError::BadRequest(
                "min_percentage must be between 0 and 100".to_string(),
            ));
        }
    }

    let rows = repositories::attempts::list_for_user(
        state.db(),
        repositories::attempts::ListAttemptsParams {
            user_id: user.id,
            quiz_id: params.quiz_id.filter(|id| !id.trim().is_empty()),
            quiz_title: params.quiz_title.filter(|title| !title.trim().is_empty()),
            min_score: params.min_score,
            max_score: params.max_score,
            min_percentage: params.min_percentage,
            attempted_after,
            attempted_before,
            skip,
            limit,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    let total_count = rows.first().map(|row| row.total_count).unwrap_or(0);
    let items = rows.into_iter().map(AttemptSummaryResponse::from).collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}
