use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::QuizAttempt;

pub(crate) const COLUMNS: &str = "id, quiz_id, user_id, score, total_questions, completed_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AttemptListRow {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) quiz_title: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) completed_at: PrimitiveDateTime,
    pub(crate) total_count: i64,
}

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) now: PrimitiveDateTime,
}

/// Attempts are append-only: there is no update or per-attempt delete.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAttempt<'_>,
) -> Result<QuizAttempt, sqlx::Error> {
    sqlx::query_as::<_, QuizAttempt>(&format!(
        "INSERT INTO quiz_attempts (id, quiz_id, user_id, score, total_questions, completed_at)
         VALUES ($1,$2,$3,$4,$5,$6)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.quiz_id)
    .bind(params.user_id)
    .bind(params.score)
    .bind(params.total_questions)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) struct ListAttemptsParams {
    pub(crate) user_id: String,
    pub(crate) quiz_id: Option<String>,
    pub(crate) quiz_title: Option<String>,
    pub(crate) min_score: Option<i32>,
    pub(crate) max_score: Option<i32>,
    pub(crate) min_percentage: Option<f64>,
    pub(crate) attempted_after: Option<PrimitiveDateTime>,
    pub(crate) attempted_before: Option<PrimitiveDateTime>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    params: ListAttemptsParams,
) -> Result<Vec<AttemptListRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT a.id,
                a.quiz_id,
                q.title AS quiz_title,
                a.score,
                a.total_questions,
                a.completed_at,
                COUNT(*) OVER() AS total_count
         FROM quiz_attempts a
         JOIN quizzes q ON q.id = a.quiz_id
         WHERE a.user_id = ",
    );
    builder.push_bind(params.user_id);

    if let Some(quiz_id) = params.quiz_id {
        builder.push(" AND a.quiz_id = ");
        builder.push_bind(quiz_id);
    }
    if let Some(quiz_title) = params.quiz_title {
        builder.push(" AND q.title ILIKE ");
        builder.push_bind(format!("%{quiz_title}%"));
    }
    if let Some(min_score) = params.min_score {
        builder.push(" AND a.score >= ");
        builder.push_bind(min_score);
    }
    if let Some(max_score) = params.max_score {
        builder.push(" AND a.score <= ");
        builder.push_bind(max_score);
    }
    if let Some(min_percentage) = params.min_percentage {
        builder.push(
            " AND (CASE WHEN a.total_questions = 0 THEN 0
                        ELSE a.score * 100.0 / a.total_questions END)::float8 >= ",
        );
        builder.push_bind(min_percentage);
    }
    if let Some(attempted_after) = params.attempted_after {
        builder.push(" AND a.completed_at >= ");
        builder.push_bind(attempted_after);
    }
    if let Some(attempted_before) = params.attempted_before {
        builder.push(" AND a.completed_at <= ");
        builder.push_bind(attempted_before);
    }

    builder.push(" ORDER BY a.completed_at DESC, a.id OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<AttemptListRow>().fetch_all(pool).await
}
