use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{Choice, Question, Quiz};
use crate::db::types::GenerationMethod;
use crate::services::quiz_generation::QuestionDraft;

pub(crate) const COLUMNS: &str = "id, document_id, title, generation_method, created_at";
pub(crate) const QUESTION_COLUMNS: &str = "\
    id, quiz_id, order_index, question_text, question_type, correct_answer, explanation, \
    created_at";
pub(crate) const CHOICE_COLUMNS: &str = "id, question_id, order_index, choice_text, is_correct";

#[derive(Debug, Error)]
pub(crate) enum QuizStoreError {
    #[error("a quiz needs at least one question")]
    EmptyQuiz,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub(crate) struct QuestionWithChoices {
    pub(crate) question: Question,
    pub(crate) choices: Vec<Choice>,
}

/// A quiz with its questions in `order_index` order and each question's choices in display order.
#[derive(Debug, Clone)]
pub(crate) struct QuizWithQuestions {
    pub(crate) quiz: Quiz,
    pub(crate) questions: Vec<QuestionWithChoices>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct QuizListRow {
    pub(crate) id: String,
    pub(crate) document_id: String,
    pub(crate) document_title: String,
    pub(crate) title: String,
    pub(crate) generation_method: GenerationMethod,
    pub(crate) question_count: i64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) total_count: i64,
}

pub(crate) struct CreateQuizBatch<'a> {
    pub(crate) document_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) generation_method: GenerationMethod,
    pub(crate) drafts: &'a [QuestionDraft],
    pub(crate) now: PrimitiveDateTime,
}

/// Writes the quiz, its questions and their choices in one transaction.
pub(crate) async fn create_batch(
    pool: &PgPool,
    params: CreateQuizBatch<'_>,
) -> Result<QuizWithQuestions, QuizStoreError> {
    if params.drafts.is_empty() {
        return Err(QuizStoreError::EmptyQuiz);
    }

    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (id, document_id, title, generation_method, created_at)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(params.document_id)
    .bind(params.title)
    .bind(params.generation_method)
    .bind(params.now)
    .fetch_one(&mut *tx)
    .await?;

    let mut questions = Vec::with_capacity(params.drafts.len());
    for (order_index, draft) in params.drafts.iter().enumerate() {
        let question = sqlx::query_as::<_, Question>(&format!(
            "INSERT INTO questions (
                id, quiz_id, order_index, question_text, question_type, correct_answer,
                explanation, created_at
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&quiz.id)
        .bind(order_index as i32)
        .bind(&draft.question)
        .bind(draft.question_type())
        .bind(draft.correct_answer())
        .bind(&draft.explanation)
        .bind(params.now)
        .fetch_one(&mut *tx)
        .await?;

        let mut choices = Vec::new();
        for (choice_index, choice) in draft.choices().into_iter().enumerate() {
            let stored = sqlx::query_as::<_, Choice>(&format!(
                "INSERT INTO choices (id, question_id, order_index, choice_text, is_correct)
                 VALUES ($1,$2,$3,$4,$5)
                 RETURNING {CHOICE_COLUMNS}"
            ))
            .bind(Uuid::new_v4().to_string())
            .bind(&question.id)
            .bind(choice_index as i32)
            .bind(choice.text)
            .bind(choice.is_correct)
            .fetch_one(&mut *tx)
            .await?;
            choices.push(stored);
        }

        questions.push(QuestionWithChoices { question, choices });
    }

    tx.commit().await?;

    Ok(QuizWithQuestions { quiz, questions })
}

/// Resolves a quiz only when its source document belongs to `user_id`.
pub(crate) async fn find_for_user(
    pool: &PgPool,
    quiz_id: &str,
    user_id: &str,
) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(
        "SELECT q.id, q.document_id, q.title, q.generation_method, q.created_at
         FROM quizzes q
         JOIN documents d ON d.id = q.document_id
         WHERE q.id = $1 AND d.user_id = $2",
    )
    .bind(quiz_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn load_for_user(
    pool: &PgPool,
    quiz_id: &str,
    user_id: &str,
) -> Result<Option<QuizWithQuestions>, sqlx::Error> {
    let Some(quiz) = find_for_user(pool, quiz_id, user_id).await? else {
        return Ok(None);
    };

    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY order_index"
    ))
    .bind(&quiz.id)
    .fetch_all(pool)
    .await?;

    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let mut choices_by_question: HashMap<String, Vec<Choice>> = HashMap::new();
    for choice in list_choices(pool, &question_ids).await? {
        choices_by_question.entry(choice.question_id.clone()).or_default().push(choice);
    }

    let questions = questions
        .into_iter()
        .map(|question| {
            let choices = choices_by_question.remove(&question.id).unwrap_or_default();
            QuestionWithChoices { question, choices }
        })
        .collect();

    Ok(Some(QuizWithQuestions { quiz, questions }))
}

async fn list_choices(pool: &PgPool, question_ids: &[String]) -> Result<Vec<Choice>, sqlx::Error> {
    if question_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Choice>(&format!(
        "SELECT {CHOICE_COLUMNS}
         FROM choices
         WHERE question_id = ANY($1)
         ORDER BY question_id, order_index"
    ))
    .bind(question_ids)
    .fetch_all(pool)
    .await
}

pub(crate) struct ListQuizzesParams {
    pub(crate) user_id: String,
    pub(crate) title: Option<String>,
    pub(crate) document_title: Option<String>,
    pub(crate) document_id: Option<String>,
    pub(crate) created_after: Option<PrimitiveDateTime>,
    pub(crate) created_before: Option<PrimitiveDateTime>,
    pub(crate) min_questions: Option<i64>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    params: ListQuizzesParams,
) -> Result<Vec<QuizListRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT q.id,
                q.document_id,
                d.title AS document_title,
                q.title,
                q.generation_method,
                COALESCE(qc.question_count, 0) AS question_count,
                q.created_at,
                COUNT(*) OVER() AS total_count
         FROM quizzes q
         JOIN documents d ON d.id = q.document_id
         LEFT JOIN (
             SELECT quiz_id, COUNT(*) AS question_count
             FROM questions
             GROUP BY quiz_id
         ) qc ON qc.quiz_id = q.id
         WHERE d.user_id = ",
    );
    builder.push_bind(params.user_id);

    if let Some(title) = params.title {
        builder.push(" AND q.title ILIKE ");
        builder.push_bind(format!("%{title}%"));
    }
    if let Some(document_title) = params.document_title {
        builder.push(" AND d.title ILIKE ");
        builder.push_bind(format!("%{document_title}%"));
    }
    if let Some(document_id) = params.document_id {
        builder.push(" AND q.document_id = ");
        builder.push_bind(document_id);
    }
    if let Some(created_after) = params.created_after {
        builder.push(" AND q.created_at >= ");
        builder.push_bind(created_after);
    }
    if let Some(created_before) = params.created_before {
        builder.push(" AND q.created_at <= ");
        builder.push_bind(created_before);
    }
    if let Some(min_questions) = params.min_questions {
        builder.push(" AND COALESCE(qc.question_count, 0) >= ");
        builder.push_bind(min_questions);
    }

    builder.push(" ORDER BY q.created_at DESC, q.id OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    builder.build_query_as::<QuizListRow>().fetch_all(pool).await
}

pub(crate) async fn delete_for_user(
    pool: &PgPool,
    quiz_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM quizzes q
         USING documents d
         WHERE q.id = $1
           AND d.id = q.document_id
           AND d.user_id = $2",
    )
    .bind(quiz_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
