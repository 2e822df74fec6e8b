use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::QuizAttempt;
use crate::db::types::QuestionType;
use crate::repositories::{attempts, quizzes};
use crate::repositories::quizzes::{QuestionWithChoices, QuizWithQuestions};

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum GradingInputError {
    #[error("answers must be a JSON object keyed by question id")]
    NotAnObject,
    #[error("answer for question {0} must be a string, number or boolean")]
    InvalidValue(String),
}

#[derive(Debug, Error)]
pub(crate) enum GradeError {
    #[error("quiz not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuestionResult {
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) user_answer: String,
    pub(crate) correct_answer: String,
    pub(crate) is_correct: bool,
    pub(crate) explanation: String,
}

#[derive(Debug, Clone)]
pub(crate) struct GradeOutcome {
    pub(crate) score: usize,
    pub(crate) total_questions: usize,
    pub(crate) percentage: f64,
    pub(crate) results: Vec<QuestionResult>,
}

#[derive(Debug)]
pub(crate) struct GradedAttempt {
    pub(crate) attempt: QuizAttempt,
    pub(crate) outcome: GradeOutcome,
}

/// Reads a submission's `answers` object. Strings are kept as is, numbers and booleans are
/// rendered as text, and `null` means "not answered".
pub(crate) fn parse_answers(value: &Value) -> Result<HashMap<String, String>, GradingInputError> {
    let Value::Object(map) = value else {
        return Err(GradingInputError::NotAnObject);
    };

    let mut answers = HashMap::with_capacity(map.len());
    for (question_id, answer) in map {
        let text = match answer {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => if *flag { "True" } else { "False" }.to_string(),
            Value::Null => continue,
            Value::Array(_) | Value::Object(_) => {
                return Err(GradingInputError::InvalidValue(question_id.clone()));
            }
        };
        answers.insert(question_id.clone(), text);
    }
    Ok(answers)
}

pub(crate) fn percentage(score: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (score as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn is_correct(entry: &QuestionWithChoices, user_answer: &str) -> bool {
    let question = &entry.question;
    match question.question_type {
        // Exact text of the flagged choice; no fuzzy matching.
        QuestionType::Mcq => entry
            .choices
            .iter()
            .find(|choice| choice.choice_text == user_answer)
            .is_some_and(|choice| choice.is_correct),
        QuestionType::Tf | QuestionType::Fill => {
            normalize(user_answer) == normalize(&question.correct_answer)
        }
    }
}

/// Scores every question of the quiz in order. Missing answers count as incorrect and
/// answers for ids outside the quiz are ignored.
pub(crate) fn score_submission(
    quiz: &QuizWithQuestions,
    answers: &HashMap<String, String>,
) -> GradeOutcome {
    let results: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .map(|entry| {
            let user_answer = answers.get(&entry.question.id).cloned().unwrap_or_default();
            QuestionResult {
                question_id: entry.question.id.clone(),
                question: entry.question.question_text.clone(),
                is_correct: is_correct(entry, &user_answer),
                user_answer,
                correct_answer: entry.question.correct_answer.clone(),
                explanation: entry.question.explanation.clone(),
            }
        })
        .collect();

    let score = results.iter().filter(|result| result.is_correct).count();
    let total_questions = results.len();

    GradeOutcome { score, total_questions, percentage: percentage(score, total_questions), results }
}

/// Resolves the quiz in the caller's scope, scores it and appends exactly one attempt.
/// Nothing is written when the quiz cannot be resolved.
pub(crate) async fn grade(
    pool: &PgPool,
    quiz_id: &str,
    user_id: &str,
    answers: &HashMap<String, String>,
) -> Result<GradedAttempt, GradeError> {
    let quiz =
        quizzes::load_for_user(pool, quiz_id, user_id).await?.ok_or(GradeError::NotFound)?;

    let outcome = score_submission(&quiz, answers);

    let attempt_id = Uuid::new_v4().to_string();
    let attempt = attempts::create(
        pool,
        attempts::CreateAttempt {
            id: &attempt_id,
            quiz_id: &quiz.quiz.id,
            user_id,
            score: outcome.score as i32,
            total_questions: outcome.total_questions as i32,
            now: primitive_now_utc(),
        },
    )
    .await?;

    metrics::counter!("quiz_attempts_total").increment(1);
    tracing::info!(
        quiz_id = %quiz.quiz.id,
        attempt_id = %attempt.id,
        score = outcome.score,
        total = outcome.total_questions,
        "Quiz attempt graded"
    );

    Ok(GradedAttempt { attempt, outcome })
}
