use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Choice;
use crate::db::types::{GenerationMethod, QuestionType};
use crate::repositories::quizzes::{QuestionWithChoices, QuizListRow, QuizWithQuestions};
use crate::services::quiz_grading::QuestionResult;

const fn default_num_questions() -> usize {
    5
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizGenerate {
    #[serde(alias = "documentId", alias = "note_id")]
    #[validate(length(min = 1, message = "document_id must not be empty"))]
    pub(crate) document_id: String,
    #[serde(default = "default_num_questions")]
    #[serde(alias = "numQuestions")]
    #[validate(range(min = 1, max = 20, message = "num_questions must be between 1 and 20"))]
    pub(crate) num_questions: usize,
    #[serde(default)]
    pub(crate) method: GenerationMethod,
    #[serde(default)]
    #[serde(alias = "questionTypes")]
    pub(crate) question_types: Vec<QuestionType>,
    #[serde(default)]
    pub(crate) seed: Option<u64>,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub(crate) title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuizSubmit {
    pub(crate) answers: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChoiceResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) order_index: i32,
    pub(crate) question: String,
    pub(crate) question_type: QuestionType,
    pub(crate) choices: Vec<ChoiceResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResponse {
    pub(crate) id: String,
    pub(crate) document_id: String,
    pub(crate) title: String,
    pub(crate) generation_method: GenerationMethod,
    pub(crate) question_count: usize,
    pub(crate) created_at: String,
    pub(crate) questions: Vec<QuestionResponse>,
}

impl QuizResponse {
    /// Answer keys and explanations are only included when `reveal_answers` is set.
    pub(crate) fn from_quiz(quiz: QuizWithQuestions, reveal_answers: bool) -> Self {
        let questions: Vec<QuestionResponse> = quiz
            .questions
            .into_iter()
            .map(|entry| question_response(entry, reveal_answers))
            .collect();

        Self {
            id: quiz.quiz.id,
            document_id: quiz.quiz.document_id,
            title: quiz.quiz.title,
            generation_method: quiz.quiz.generation_method,
            question_count: questions.len(),
            created_at: format_primitive(quiz.quiz.created_at),
            questions,
        }
    }
}

fn question_response(entry: QuestionWithChoices, reveal_answers: bool) -> QuestionResponse {
    let QuestionWithChoices { question, choices } = entry;
    QuestionResponse {
        id: question.id,
        order_index: question.order_index,
        question: question.question_text,
        question_type: question.question_type,
        choices: choices
            .into_iter()
            .map(|choice: Choice| ChoiceResponse {
                id: choice.id,
                text: choice.choice_text,
                is_correct: reveal_answers.then_some(choice.is_correct),
            })
            .collect(),
        correct_answer: reveal_answers.then_some(question.correct_answer),
        explanation: reveal_answers.then_some(question.explanation),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizSummaryResponse {
    pub(crate) id: String,
    pub(crate) document_id: String,
    pub(crate) document_title: String,
    pub(crate) title: String,
    pub(crate) generation_method: GenerationMethod,
    pub(crate) question_count: i64,
    pub(crate) created_at: String,
}

impl From<QuizListRow> for QuizSummaryResponse {
    fn from(row: QuizListRow) -> Self {
        Self {
            id: row.id,
            document_id: row.document_id,
            document_title: row.document_title,
            title: row.title,
            generation_method: row.generation_method,
            question_count: row.question_count,
            created_at: format_primitive(row.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) quiz_id: String,
    pub(crate) score: usize,
    pub(crate) total_questions: usize,
    pub(crate) percentage: f64,
    pub(crate) completed_at: String,
    pub(crate) results: Vec<QuestionResult>,
}
