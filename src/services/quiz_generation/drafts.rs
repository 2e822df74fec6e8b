use std::collections::HashSet;

use thiserror::Error;

use crate::db::types::QuestionType;

pub(crate) const TRUE_LABEL: &str = "True";
pub(crate) const FALSE_LABEL: &str = "False";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChoiceDraft {
    pub(crate) text: String,
    pub(crate) is_correct: bool,
}

impl ChoiceDraft {
    pub(crate) fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self { text: text.into(), is_correct }
    }
}

/// Type-specific part of a question. True/false choices are derived, never stored on the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DraftBody {
    MultipleChoice { choices: Vec<ChoiceDraft> },
    TrueFalse { answer: bool },
    FillBlank { answer: String },
}

/// A question produced by any generation strategy, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QuestionDraft {
    pub(crate) question: String,
    pub(crate) body: DraftBody,
    pub(crate) explanation: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum DraftError {
    #[error("question text is empty")]
    EmptyQuestion,
    #[error("correct answer is empty")]
    EmptyAnswer,
    #[error("multiple-choice question has {0} distinct choices, at least 2 required")]
    TooFewChoices(usize),
}

impl QuestionDraft {
    pub(crate) fn question_type(&self) -> QuestionType {
        match self.body {
            DraftBody::MultipleChoice { .. } => QuestionType::Mcq,
            DraftBody::TrueFalse { .. } => QuestionType::Tf,
            DraftBody::FillBlank { .. } => QuestionType::Fill,
        }
    }

    /// Canonical answer text. For multiple-choice this is the text of the correct choice.
    pub(crate) fn correct_answer(&self) -> String {
        match &self.body {
            DraftBody::MultipleChoice { choices } => choices
                .iter()
                .find(|choice| choice.is_correct)
                .map(|choice| choice.text.clone())
                .unwrap_or_default(),
            DraftBody::TrueFalse { answer } => {
                let label = if *answer { TRUE_LABEL } else { FALSE_LABEL };
                label.to_string()
            }
            DraftBody::FillBlank { answer } => answer.clone(),
        }
    }

    /// Choices in display order; empty for fill-in-the-blank.
    pub(crate) fn choices(&self) -> Vec<ChoiceDraft> {
        match &self.body {
            DraftBody::MultipleChoice { choices } => choices.clone(),
            DraftBody::TrueFalse { answer } => vec![
                ChoiceDraft::new(TRUE_LABEL, *answer),
                ChoiceDraft::new(FALSE_LABEL, !*answer),
            ],
            DraftBody::FillBlank { .. } => Vec::new(),
        }
    }

    /// Normalises a draft so it satisfies the stored-question invariants: trimmed non-empty
    /// text and answer, at least two distinct choices and exactly one correct choice for
    /// multiple-choice. A missing or ambiguous correct flag is repaired, not rejected.
    pub(crate) fn validate(self) -> Result<Self, DraftError> {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err(DraftError::EmptyQuestion);
        }
        let explanation = self.explanation.trim().to_string();

        let body = match self.body {
            DraftBody::MultipleChoice { choices } => {
                DraftBody::MultipleChoice { choices: normalize_choices(&question, choices)? }
            }
            DraftBody::TrueFalse { answer } => DraftBody::TrueFalse { answer },
            DraftBody::FillBlank { answer } => {
                let answer = answer.trim().to_string();
                if answer.is_empty() {
                    return Err(DraftError::EmptyAnswer);
                }
                DraftBody::FillBlank { answer }
            }
        };

        Ok(Self { question, body, explanation })
    }
}

fn normalize_choices(
    question: &str,
    choices: Vec<ChoiceDraft>,
) -> Result<Vec<ChoiceDraft>, DraftError> {
    let mut seen = HashSet::new();
    let mut normalized: Vec<ChoiceDraft> = Vec::with_capacity(choices.len());

    for choice in choices {
        let text = choice.text.trim().to_string();
        if text.is_empty() {
            continue;
        }
        if !seen.insert(text.clone()) {
            if choice.is_correct {
                if let Some(existing) = normalized.iter_mut().find(|item| item.text == text) {
                    existing.is_correct = true;
                }
            }
            continue;
        }
        normalized.push(ChoiceDraft { text, is_correct: choice.is_correct });
    }

    if normalized.len() < 2 {
        return Err(DraftError::TooFewChoices(normalized.len()));
    }

    let correct = normalized.iter().filter(|choice| choice.is_correct).count();
    match correct {
        1 => {}
        0 => {
            tracing::warn!(question, "No choice marked correct; marking the first one");
            normalized[0].is_correct = true;
        }
        _ => {
            tracing::warn!(question, correct, "Several choices marked correct; keeping the first");
            let mut kept = false;
            for choice in &mut normalized {
                if choice.is_correct && kept {
                    choice.is_correct = false;
                }
                kept |= choice.is_correct;
            }
        }
    }

    Ok(normalized)
}

/// Ordered collection of validated drafts that drops case-insensitive duplicate questions.
#[derive(Debug, Default)]
pub(crate) struct DraftSet {
    drafts: Vec<QuestionDraft>,
    seen: HashSet<String>,
}

impl DraftSet {
    /// Returns `true` when the draft was valid and new.
    pub(crate) fn push(&mut self, draft: QuestionDraft) -> bool {
        let draft = match draft.validate() {
            Ok(draft) => draft,
            Err(err) => {
                tracing::debug!(error = %err, "Discarding unusable question draft");
                return false;
            }
        };

        if !self.seen.insert(draft.question.to_lowercase()) {
            tracing::debug!(question = %draft.question, "Discarding duplicate question");
            return false;
        }

        self.drafts.push(draft);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.drafts.len()
    }

    pub(crate) fn into_vec(self) -> Vec<QuestionDraft> {
        self.drafts
    }
}
