use serde::Serialize;

use crate::core::time::format_primitive;
use crate::repositories::attempts::AttemptListRow;
use crate::services::quiz_grading::percentage;

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSummaryResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) quiz_title: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) percentage: f64,
    pub(crate) completed_at: String,
}

impl From<AttemptListRow> for AttemptSummaryResponse {
    fn from(row: AttemptListRow) -> Self {
        Self {
            percentage: percentage(row.score.max(0) as usize, row.total_questions.max(0) as usize),
            id: row.id,
            quiz_id: row.quiz_id,
            quiz_title: row.quiz_title,
            score: row.score,
            total_questions: row.total_questions,
            completed_at: format_primitive(row.completed_at),
        }
    }
}
