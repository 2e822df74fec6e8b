use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{window, PaginatedResponse};
use crate::api::validation::parse_timestamp_filter;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::types::GenerationMethod;
use crate::repositories;
use crate::schemas::quiz::{
    QuizGenerate, QuizResponse, QuizResultResponse, QuizSubmit, QuizSummaryResponse,
};
use crate::services::quiz_generation::{GenerationOptions, GenerationRequest, QuizGenerator};
use crate::services::quiz_grading::{self, GradeError};

use super::queries::{ListQuizzesQuery, QuizDetailQuery};

pub(super) async fn generate_quiz(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Result<Json<QuizGenerate>, JsonRejection>,
) -> Result<(StatusCode, Json<QuizResponse>), ApiError> {
    let Json(payload) = payload.map_err(ApiError::malformed_body)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let quiz_settings = state.settings().quiz();
    let rate_key = format!("quiz-generate:{}", user.id);
    let allowed = state
        .redis()
        .rate_limit(
            &rate_key,
            quiz_settings.generation_rate_limit,
            quiz_settings.generation_rate_window_seconds,
        )
        .await
        .unwrap_or(true);
    if !allowed {
        metrics::counter!("quiz_generations_total", "status" => "rate_limited").increment(1);
        return Err(ApiError::TooManyRequests("Too many quiz generation requests, try again later"));
    }

    let document =
        repositories::documents::find_for_user(state.db(), &payload.document_id, &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch document"))?
            .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

    let provider = match payload.method {
        GenerationMethod::Provider => state.provider(),
        GenerationMethod::Heuristic => None,
    };
    let generator = QuizGenerator::new(GenerationOptions::from_settings(state.settings()), provider);
    let request = GenerationRequest {
        desired_count: payload.num_questions,
        question_types: payload.question_types,
        seed: payload.seed,
    };

    let generated = match generator.generate(&document.original_text, request).await {
        Ok(generated) => generated,
        Err(err) => {
            metrics::counter!("quiz_generations_total", "status" => "rejected").increment(1);
            tracing::info!(document_id = %document.id, error = %err, "Quiz generation rejected");
            return Err(err.into());
        }
    };

    let generation_method = if generated.from_provider > 0 {
        GenerationMethod::Provider
    } else {
        GenerationMethod::Heuristic
    };
    let title = payload
        .title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| format!("Quiz for {}", document.title));

    let stored = repositories::quizzes::create_batch(
        state.db(),
        repositories::quizzes::CreateQuizBatch {
            document_id: &document.id,
            title: &title,
            generation_method,
            drafts: &generated.drafts,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| {
        metrics::counter!("quiz_generations_total", "status" => "failed").increment(1);
        ApiError::internal(e, "Failed to store quiz")
    })?;

    metrics::counter!("quiz_generations_total", "status" => "created").increment(1);
    tracing::info!(
        quiz_id = %stored.quiz.id,
        document_id = %document.id,
        questions = stored.questions.len(),
        from_provider = generated.from_provider,
        from_heuristics = generated.from_heuristics,
        method = generation_method.as_str(),
        "Quiz generated"
    );

    Ok((StatusCode::CREATED, Json(QuizResponse::from_quiz(stored, false))))
}

pub(super) async fn list_quizzes(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ListQuizzesQuery>,
) -> Result<Json<PaginatedResponse<QuizSummaryResponse>>, ApiError> {
    let (skip, limit) = window(params.skip, params.limit);
    let created_after = parse_timestamp_filter("created_after", params.created_after.as_deref())?;
    let created_before =
        parse_timestamp_filter("created_before", params.created_before.as_deref())?;

    let rows = repositories::quizzes::list_for_user(
        state.db(),
        repositories::quizzes::ListQuizzesParams {
            user_id: user.id,
            title: non_blank(params.title),
            document_title: non_blank(params.document_title),
            document_id: non_blank(params.document_id),
            created_after,
            created_before,
            min_questions: params.min_questions,
            skip,
            limit,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list quizzes"))?;

    let total_count = rows.first().map(|row| row.total_count).unwrap_or(0);
    let items = rows.into_iter().map(QuizSummaryResponse::from).collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

pub(super) async fn get_quiz(
    Path(quiz_id): Path<String>,
    Query(params): Query<QuizDetailQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<QuizResponse>, ApiError> {
    let quiz = repositories::quizzes::load_for_user(state.db(), &quiz_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    Ok(Json(QuizResponse::from_quiz(quiz, params.reveal_answers)))
}

pub(super) async fn delete_quiz(
    Path(quiz_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::quizzes::delete_for_user(state.db(), &quiz_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete quiz"))?;

    if !deleted {
        return Err(ApiError::NotFound("Quiz not found".to_string()));
    }

    tracing::info!(quiz_id = %quiz_id, "Quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn submit_quiz(
    Path(quiz_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Result<Json<QuizSubmit>, JsonRejection>,
) -> Result<Json<QuizResultResponse>, ApiError> {
    let Json(payload) = payload.map_err(ApiError::malformed_body)?;
    let answers = quiz_grading::parse_answers(&payload.answers)?;

    let graded = quiz_grading::grade(state.db(), &quiz_id, &user.id, &answers)
        .await
        .map_err(|e| match e {
            GradeError::NotFound => ApiError::NotFound("Quiz not found".to_string()),
            GradeError::Database(err) => ApiError::internal(err, "Failed to record quiz attempt"),
        })?;

    Ok(Json(QuizResultResponse {
        attempt_id: graded.attempt.id,
        quiz_id: graded.attempt.quiz_id,
        score: graded.outcome.score,
        total_questions: graded.outcome.total_questions,
        percentage: graded.outcome.percentage,
        completed_at: format_primitive(graded.attempt.completed_at),
        results: graded.outcome.results,
    }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|item| item.trim().to_string()).filter(|item| !item.is_empty())
}
