use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::drafts::{ChoiceDraft, DraftBody, QuestionDraft};
use crate::db::types::QuestionType;

const RECOVERED_EXPLANATION: &str = "Recovered from an unstructured model response";

/// Outcome of reading a provider response. Parsing never fails: unusable output is `Empty`.
#[derive(Debug)]
pub(crate) enum ParsedQuestions {
    Parsed(Vec<QuestionDraft>),
    Empty,
}

pub(crate) fn parse_response(question_type: QuestionType, content: &str) -> ParsedQuestions {
    let mut drafts = parse_structured(question_type, content);
    if drafts.is_empty() && question_type == QuestionType::Mcq {
        drafts = parse_mcq_text(content);
        if !drafts.is_empty() {
            tracing::debug!(recovered = drafts.len(), "Recovered questions from plain-text response");
        }
    }

    // Drafts that cannot be repaired do not count as parsed.
    let drafts: Vec<QuestionDraft> =
        drafts.into_iter().filter_map(|draft| draft.validate().ok()).collect();
    if drafts.is_empty() {
        ParsedQuestions::Empty
    } else {
        ParsedQuestions::Parsed(drafts)
    }
}

fn parse_structured(question_type: QuestionType, content: &str) -> Vec<QuestionDraft> {
    let Some(value) = locate_json(content) else {
        return Vec::new();
    };

    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("questions") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => std::slice::from_ref(&value),
        },
        _ => return Vec::new(),
    };

    items.iter().filter_map(|item| structured_item(question_type, item)).collect()
}

/// Strips Markdown code fences, then parses the outermost `{...}` (or `[...]`) span.
fn locate_json(content: &str) -> Option<Value> {
    let unfenced = strip_code_fence(content);

    if let Ok(value) = serde_json::from_str::<Value>(unfenced.trim()) {
        return Some(value);
    }

    [('{', '}'), ('[', ']')].into_iter().find_map(|(open, close)| {
        let start = unfenced.find(open)?;
        let end = unfenced.rfind(close)?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<Value>(&unfenced[start..=end]).ok()
    })
}

fn strip_code_fence(content: &str) -> &str {
    let Some(start) = content.find("```") else {
        return content;
    };
    let after_fence = &content[start + 3..];
    let body_start = after_fence.find('\n').map(|index| index + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    }
}

fn structured_item(question_type: QuestionType, item: &Value) -> Option<QuestionDraft> {
    let explanation = text_field(item, &["explanation"]).unwrap_or_default();

    match question_type {
        QuestionType::Mcq => {
            let question = text_field(item, &["question", "question_text"])?;
            let marker = text_field(item, &["correct_answer", "answer", "correct"]);
            let choices = item
                .get("choices")
                .or_else(|| item.get("options"))
                .and_then(Value::as_array)?
                .iter()
                .filter_map(|choice| match choice {
                    Value::Object(_) => {
                        let text = text_field(choice, &["text", "choice_text"])?;
                        let flagged = choice.get("is_correct").and_then(Value::as_bool);
                        Some((text, flagged))
                    }
                    other => scalar_text(other).map(|text| (text, None)),
                })
                .map(|(raw, flagged)| {
                    let is_correct = flagged.unwrap_or_else(|| {
                        marker.as_deref().is_some_and(|marker| choice_matches(&raw, marker))
                    });
                    ChoiceDraft::new(strip_choice_label(&raw), is_correct)
                })
                .collect();

            Some(QuestionDraft { question, body: DraftBody::MultipleChoice { choices }, explanation })
        }
        QuestionType::Tf => {
            let question = text_field(item, &["statement", "question"])?;
            let answer = match item.get("correct_answer").or_else(|| item.get("answer"))? {
                Value::Bool(flag) => *flag,
                Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "yes" => true,
                    "false" | "f" | "no" => false,
                    _ => return None,
                },
                _ => return None,
            };

            Some(QuestionDraft { question, body: DraftBody::TrueFalse { answer }, explanation })
        }
        QuestionType::Fill => {
            let question = text_field(item, &["question", "question_text"])?;
            let answer = text_field(item, &["correct_answer", "answer"])?;

            Some(QuestionDraft { question, body: DraftBody::FillBlank { answer }, explanation })
        }
    }
}

fn text_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| item.get(*key).and_then(scalar_text))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn choice_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\(?([A-Ha-h])[\).:]\s*(.*)$").expect("valid choice label regex")
    })
}

fn question_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:(?:q|question)\s*)?\d+\s*[\).:]\s*").expect("valid numbering regex")
    })
}

fn choice_label(raw: &str) -> Option<char> {
    choice_label_regex()
        .captures(raw.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|label| label.as_str().chars().next())
        .map(|label| label.to_ascii_uppercase())
}

/// `"B) Paris"` -> `"Paris"`. Text without a label is returned trimmed.
fn strip_choice_label(raw: &str) -> String {
    let trimmed = raw.trim();
    match choice_label_regex().captures(trimmed).and_then(|caps| caps.get(2)) {
        Some(rest) if !rest.as_str().trim().is_empty() => rest.as_str().trim().to_string(),
        _ => trimmed.to_string(),
    }
}

/// A correct-answer marker matches a choice by full text, by text without the label,
/// or by the bare letter label.
fn choice_matches(raw_choice: &str, marker: &str) -> bool {
    let marker = marker.trim();
    if marker.is_empty() {
        return false;
    }
    if raw_choice.trim().eq_ignore_ascii_case(marker)
        || strip_choice_label(raw_choice).eq_ignore_ascii_case(&strip_choice_label(marker))
    {
        return true;
    }

    let bare = marker.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());
    bare.len() == 1
        && choice_label(raw_choice).is_some_and(|label| bare.eq_ignore_ascii_case(&label.to_string()))
}

/// Pattern pass over the reply line by line: a question line, lettered choice lines
/// and an optional line naming the correct answer.
fn parse_mcq_text(content: &str) -> Vec<QuestionDraft> {
    let mut drafts = Vec::new();
    let mut current: Option<TextQuestion> = None;

    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if choice_label(line).is_some() {
            if let Some(question) = current.as_mut() {
                question.raw_choices.push(line.to_string());
            }
            continue;
        }

        let has_choices = current.as_ref().is_some_and(|question| !question.raw_choices.is_empty());
        if has_choices && !is_question_line(line) && is_marker_line(line) {
            if let Some(question) = current.as_mut() {
                question.marker = line.split_whitespace().last().map(str::to_string);
            }
            continue;
        }

        if !has_choices {
            // Before any choice the last question-looking line wins over preamble text.
            if let Some(question) = current.as_mut() {
                if is_question_line(line) || !is_question_line(&question.line) {
                    question.line = line.to_string();
                }
                continue;
            }
        }

        if let Some(finished) = current.take() {
            drafts.extend(finished.into_draft());
        }
        current = Some(TextQuestion::new(line));
    }

    if let Some(finished) = current {
        drafts.extend(finished.into_draft());
    }
    drafts
}

fn is_question_line(line: &str) -> bool {
    question_number_regex().is_match(line) || line.ends_with('?')
}

fn is_marker_line(line: &str) -> bool {
    let lowered = line.to_lowercase();
    lowered.contains("correct") || lowered.starts_with("answer")
}

struct TextQuestion {
    line: String,
    raw_choices: Vec<String>,
    marker: Option<String>,
}

impl TextQuestion {
    fn new(line: &str) -> Self {
        Self { line: line.to_string(), raw_choices: Vec::new(), marker: None }
    }

    fn into_draft(self) -> Option<QuestionDraft> {
        if self.raw_choices.len() < 2 {
            return None;
        }

        let question = question_number_regex().replace(&self.line, "").trim().to_string();
        let marker = self.marker;
        let mut matched = false;
        let choices = self
            .raw_choices
            .iter()
            .map(|raw| {
                let is_correct = !matched
                    && marker.as_deref().is_some_and(|marker| {
                        choice_matches(raw, marker)
                            || (marker.len() > 1
                                && raw.to_lowercase().contains(&marker.to_lowercase()))
                    });
                matched |= is_correct;
                ChoiceDraft::new(strip_choice_label(raw), is_correct)
            })
            .collect();

        Some(QuestionDraft {
            question,
            body: DraftBody::MultipleChoice { choices },
            explanation: RECOVERED_EXPLANATION.to_string(),
        })
    }
}
