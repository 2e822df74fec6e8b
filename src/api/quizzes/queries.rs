use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct ListQuizzesQuery {
    #[serde(default)]
    pub(super) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(super) limit: i64,
    #[serde(default)]
    pub(super) title: Option<String>,
    #[serde(default)]
    pub(super) document_title: Option<String>,
    #[serde(default)]
    pub(super) document_id: Option<String>,
    #[serde(default)]
    pub(super) created_after: Option<String>,
    #[serde(default)]
    pub(super) created_before: Option<String>,
    #[serde(default)]
    pub(super) min_questions: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct QuizDetailQuery {
    #[serde(default)]
    #[serde(alias = "revealAnswers")]
    pub(super) reveal_answers: bool,
}
