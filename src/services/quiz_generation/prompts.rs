use crate::db::types::QuestionType;

pub(super) struct Prompt {
    pub(super) system: String,
    pub(super) max_tokens: u32,
    pub(super) temperature: f32,
}

pub(super) fn for_type(question_type: QuestionType, count: usize) -> Prompt {
    match question_type {
        QuestionType::Mcq => Prompt {
            system: format!(
                r#"Create {count} multiple choice questions from the text. Return only JSON in this format:
{{
  "questions": [
    {{
      "question": "Question text?",
      "choices": ["Option 1", "Option 2", "Option 3", "Option 4"],
      "correct_answer": "Option 1",
      "explanation": "Why this is correct"
    }}
  ]
}}
Exactly one choice must equal correct_answer."#
            ),
            max_tokens: 800,
            temperature: 0.4,
        },
        QuestionType::Tf => Prompt {
            system: format!(
                r#"Create {count} true/false questions from the text. Return only JSON in this format:
{{
  "questions": [
    {{
      "statement": "Statement to evaluate",
      "correct_answer": true,
      "explanation": "Why this is true or false"
    }}
  ]
}}"#
            ),
            max_tokens: 600,
            temperature: 0.3,
        },
        QuestionType::Fill => Prompt {
            system: format!(
                r#"Create {count} fill-in-the-blank questions from the text. Mark the blank with _____. Return only JSON in this format:
{{
  "questions": [
    {{
      "question": "The _____ is responsible for thinking.",
      "correct_answer": "brain",
      "explanation": "Explanation of the answer"
    }}
  ]
}}"#
            ),
            max_tokens: 600,
            temperature: 0.3,
        },
    }
}

/// `Text: ` followed by at most `char_limit` characters of the source.
pub(super) fn user_content(source: &str, char_limit: usize) -> String {
    let excerpt: String = source.chars().take(char_limit).collect();
    format!("Text: {excerpt}")
}
