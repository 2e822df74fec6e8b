use std::collections::HashSet;
use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use super::drafts::{ChoiceDraft, DraftBody, QuestionDraft};
use crate::db::types::QuestionType;

const BLANK: &str = "_____";
const MIN_SENTENCE_CHARS: usize = 20;
const MAX_DISTRACTORS: usize = 3;
const PLACEHOLDER_CHOICES: [&str; 3] = ["Option B", "Option C", "Option D"];

/// Capitalised words that start sentences without naming anything.
const SENTENCE_STARTERS: &[&str] = &[
    "A", "After", "All", "Also", "Although", "An", "And", "Are", "As", "At", "Because", "Before",
    "But", "By", "During", "Each", "For", "From", "He", "Her", "Here", "His", "How", "However",
    "If", "In", "Is", "It", "Its", "Many", "Most", "Of", "On", "Or", "She", "Since", "So", "Some",
    "That", "The", "Their", "Then", "There", "These", "They", "This", "Those", "To", "Was", "We",
    "Were", "What", "When", "Which", "While", "Who", "Why", "With", "You",
];

fn sentence_split_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("valid sentence regex"))
}

fn term_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]+\b|\b\d+\b").expect("valid term regex"))
}

/// Sentences of length > 20 characters, in document order.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    sentence_split_regex()
        .split(text)
        .map(|sentence| sentence.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|sentence| sentence.chars().count() > MIN_SENTENCE_CHARS)
        .collect()
}

/// Capitalised words and numbers of `text`, first occurrence order, sentence starters excluded.
pub(crate) fn key_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    term_regex()
        .find_iter(text)
        .map(|found| found.as_str())
        .filter(|term| !SENTENCE_STARTERS.contains(term))
        .filter(|term| seen.insert(*term))
        .map(str::to_string)
        .collect()
}

/// Deterministic, sentence-driven question builder. Every draft consumes one sentence,
/// so a source shared between strategies never yields the same sentence twice.
pub(crate) struct HeuristicSource {
    sentences: Vec<String>,
    pool: Vec<String>,
    cursor: usize,
}

impl HeuristicSource {
    pub(crate) fn new(text: &str) -> Self {
        Self { sentences: split_sentences(text), pool: key_terms(text), cursor: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.sentences.len().saturating_sub(self.cursor)
    }

    /// Next draft of `question_type`, skipping sentences it cannot be built from.
    pub(crate) fn next_draft(
        &mut self,
        question_type: QuestionType,
        rng: &mut StdRng,
    ) -> Option<QuestionDraft> {
        while self.cursor < self.sentences.len() {
            let sentence = self.sentences[self.cursor].clone();
            self.cursor += 1;

            let draft = match question_type {
                QuestionType::Fill => fill_blank(&sentence, rng),
                QuestionType::Mcq => multiple_choice(&sentence, &self.pool, rng),
                QuestionType::Tf => Some(true_false(&sentence, &self.pool, rng)),
            };
            if draft.is_some() {
                return draft;
            }
        }
        None
    }

    pub(crate) fn drafts(
        &mut self,
        question_type: QuestionType,
        count: usize,
        rng: &mut StdRng,
    ) -> Vec<QuestionDraft> {
        let mut drafts = Vec::with_capacity(count);
        while drafts.len() < count {
            match self.next_draft(question_type, rng) {
                Some(draft) => drafts.push(draft),
                None => break,
            }
        }
        drafts
    }
}

fn explanation_for(sentence: &str) -> String {
    format!("Based on: {sentence}")
}

fn core_word(token: &str) -> &str {
    token.trim_matches(|ch: char| !ch.is_alphanumeric())
}

fn alphanumeric_len(token: &str) -> usize {
    token.chars().filter(|ch| ch.is_alphanumeric()).count()
}

fn fill_blank(sentence: &str, rng: &mut StdRng) -> Option<QuestionDraft> {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    if words.len() <= 5 {
        return None;
    }

    let candidates: Vec<usize> = (2..words.len() - 2)
        .filter(|index| alphanumeric_len(words[*index]) >= 3)
        .collect();
    let chosen = *candidates.choose(rng)?;
    let answer = core_word(words[chosen]).to_string();

    let question = words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            if index == chosen {
                word.replacen(answer.as_str(), BLANK, 1)
            } else {
                (*word).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    Some(QuestionDraft {
        question,
        body: DraftBody::FillBlank { answer },
        explanation: explanation_for(sentence),
    })
}

fn replace_term(sentence: &str, term: &str, replacement: &str) -> String {
    match Regex::new(&format!(r"\b{}\b", regex::escape(term))) {
        Ok(pattern) => pattern.replacen(sentence, 1, regex::NoExpand(replacement)).into_owned(),
        Err(_) => sentence.replacen(term, replacement, 1),
    }
}

fn multiple_choice(sentence: &str, pool: &[String], rng: &mut StdRng) -> Option<QuestionDraft> {
    let terms = key_terms(sentence);
    let (correct, trailing) = terms.split_first()?;

    let mut options: Vec<String> = vec![correct.clone()];
    for term in trailing.iter().chain(pool.iter()) {
        if options.len() > MAX_DISTRACTORS {
            break;
        }
        if !options.contains(term) {
            options.push(term.clone());
        }
    }
    for placeholder in PLACEHOLDER_CHOICES {
        if options.len() > MAX_DISTRACTORS {
            break;
        }
        if !options.iter().any(|option| option == placeholder) {
            options.push(placeholder.to_string());
        }
    }

    let mut choices: Vec<ChoiceDraft> = options
        .into_iter()
        .enumerate()
        .map(|(index, text)| ChoiceDraft::new(text, index == 0))
        .collect();
    choices.shuffle(rng);

    let blanked = replace_term(sentence, correct, BLANK);
    Some(QuestionDraft {
        question: format!("Which term completes the statement: \"{blanked}\"?"),
        body: DraftBody::MultipleChoice { choices },
        explanation: explanation_for(sentence),
    })
}

fn true_false(sentence: &str, pool: &[String], rng: &mut StdRng) -> QuestionDraft {
    let explanation = explanation_for(sentence);
    let terms = key_terms(sentence);

    if rng.gen_bool(0.5) {
        if let Some(original) = terms.choose(rng) {
            let substitutes: Vec<&String> = pool.iter().filter(|term| !terms.contains(term)).collect();
            if let Some(substitute) = substitutes.choose(rng) {
                return QuestionDraft {
                    question: replace_term(sentence, original, substitute),
                    body: DraftBody::TrueFalse { answer: false },
                    explanation,
                };
            }
        }
    }

    QuestionDraft {
        question: sentence.to_string(),
        body: DraftBody::TrueFalse { answer: true },
        explanation,
    }
}
