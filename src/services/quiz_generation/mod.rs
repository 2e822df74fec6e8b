mod drafts;
mod heuristics;
mod parsing;
mod prompts;

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub(crate) use drafts::QuestionDraft;

use crate::core::config::Settings;
use crate::db::types::QuestionType;
use crate::services::provider::TextGenerationProvider;
use drafts::DraftSet;
use heuristics::HeuristicSource;
use parsing::ParsedQuestions;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum GenerationError {
    #[error("source text has {found} characters of content, at least {required} are required")]
    InsufficientContent { found: usize, required: usize },
    #[error("at least one question must be requested")]
    InvalidCount,
    #[error("no usable questions could be generated from this text")]
    NoQuestions,
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationOptions {
    pub(crate) max_questions: usize,
    pub(crate) min_source_chars: usize,
    pub(crate) prompt_char_limit: usize,
    pub(crate) provider_timeout: Duration,
    pub(crate) max_concurrency: usize,
}

impl GenerationOptions {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            max_questions: settings.quiz().max_questions,
            min_source_chars: settings.quiz().min_source_chars,
            prompt_char_limit: settings.quiz().prompt_char_limit,
            provider_timeout: Duration::from_secs(settings.ai().request_timeout_seconds),
            max_concurrency: settings.ai().max_concurrency.max(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct GenerationRequest {
    pub(crate) desired_count: usize,
    pub(crate) question_types: Vec<QuestionType>,
    pub(crate) seed: Option<u64>,
}

/// Drafts plus how many came from each strategy.
#[derive(Debug)]
pub(crate) struct GeneratedQuiz {
    pub(crate) drafts: Vec<QuestionDraft>,
    pub(crate) from_provider: usize,
    pub(crate) from_heuristics: usize,
}

/// Builds question drafts from source text with an optional provider and heuristic fallbacks.
pub(crate) struct QuizGenerator {
    options: GenerationOptions,
    provider: Option<Arc<dyn TextGenerationProvider>>,
}

struct Tally {
    set: DraftSet,
    from_provider: usize,
    from_heuristics: usize,
}

impl Tally {
    fn push_provider(&mut self, draft: QuestionDraft) -> bool {
        let accepted = self.set.push(draft);
        self.from_provider += usize::from(accepted);
        accepted
    }

    fn push_heuristic(&mut self, draft: QuestionDraft) -> bool {
        let accepted = self.set.push(draft);
        self.from_heuristics += usize::from(accepted);
        accepted
    }
}

impl QuizGenerator {
    pub(crate) fn new(
        options: GenerationOptions,
        provider: Option<Arc<dyn TextGenerationProvider>>,
    ) -> Self {
        Self { options, provider }
    }

    pub(crate) async fn generate(
        &self,
        source_text: &str,
        request: GenerationRequest,
    ) -> Result<GeneratedQuiz, GenerationError> {
        let meaningful = source_text.split_whitespace().collect::<Vec<_>>().join(" ");
        let found = meaningful.chars().count();
        if found < self.options.min_source_chars {
            return Err(GenerationError::InsufficientContent {
                found,
                required: self.options.min_source_chars,
            });
        }
        if request.desired_count == 0 {
            return Err(GenerationError::InvalidCount);
        }

        let desired = request.desired_count.min(self.options.max_questions);
        let types = normalize_types(&request.question_types);
        let per_type = desired / types.len();
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut heuristics = HeuristicSource::new(source_text);
        let mut tally = Tally { set: DraftSet::default(), from_provider: 0, from_heuristics: 0 };

        tracing::debug!(
            desired,
            per_type,
            types = ?types,
            provider = self.provider.is_some(),
            sentences = heuristics.remaining(),
            "Generating quiz"
        );

        let user_content = prompts::user_content(source_text, self.options.prompt_char_limit);
        let provider_results = match &self.provider {
            Some(provider) if per_type > 0 => {
                self.request_per_type(provider, &types, per_type, &user_content).await
            }
            _ => types.iter().map(|_| Vec::new()).collect(),
        };

        for (question_type, provider_drafts) in types.iter().copied().zip(provider_results) {
            let mut accepted = 0;
            for draft in provider_drafts {
                if accepted == per_type {
                    break;
                }
                if tally.push_provider(draft) {
                    accepted += 1;
                }
            }

            if accepted == 0 && per_type > 0 {
                if self.provider.is_some() {
                    tracing::info!(
                        question_type = question_type.as_str(),
                        "Provider produced no usable questions, using heuristics"
                    );
                }
                for draft in heuristics.drafts(question_type, per_type, &mut rng) {
                    tally.push_heuristic(draft);
                }
            }
        }

        if let Some(provider) = &self.provider {
            let mut rounds = 0;
            while tally.set.len() < desired && rounds < desired {
                rounds += 1;
                let drafts = request_drafts(
                    provider.as_ref(),
                    QuestionType::Mcq,
                    1,
                    &user_content,
                    self.options.provider_timeout,
                )
                .await;
                let accepted = match drafts.into_iter().next() {
                    Some(draft) => tally.push_provider(draft),
                    None => false,
                };
                if !accepted {
                    break;
                }
            }
        }

        while tally.set.len() < desired {
            match heuristics.next_draft(QuestionType::Mcq, &mut rng) {
                Some(draft) => {
                    tally.push_heuristic(draft);
                }
                None => break,
            }
        }

        let Tally { set, from_provider, from_heuristics } = tally;
        let mut drafts = set.into_vec();
        drafts.truncate(desired);
        if drafts.is_empty() {
            return Err(GenerationError::NoQuestions);
        }

        metrics::counter!("quiz_questions_generated_total", "source" => "provider")
            .increment(from_provider as u64);
        metrics::counter!("quiz_questions_generated_total", "source" => "heuristic")
            .increment(from_heuristics as u64);

        Ok(GeneratedQuiz { drafts, from_provider, from_heuristics })
    }

    /// One provider call per type, bounded by the concurrency limit. Results are indexed
    /// by the type's position so the output order does not depend on completion order.
    async fn request_per_type(
        &self,
        provider: &Arc<dyn TextGenerationProvider>,
        types: &[QuestionType],
        per_type: usize,
        user_content: &str,
    ) -> Vec<Vec<QuestionDraft>> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency));
        let user_content: Arc<str> = Arc::from(user_content);
        let mut tasks = JoinSet::new();

        for (position, question_type) in types.iter().copied().enumerate() {
            let provider = Arc::clone(provider);
            let semaphore = Arc::clone(&semaphore);
            let user_content = Arc::clone(&user_content);
            let timeout = self.options.provider_timeout;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let drafts = request_drafts(
                    provider.as_ref(),
                    question_type,
                    per_type,
                    &user_content,
                    timeout,
                )
                .await;
                (position, drafts)
            });
        }

        let mut results: Vec<Vec<QuestionDraft>> = types.iter().map(|_| Vec::new()).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, drafts)) => results[position] = drafts,
                Err(err) => tracing::error!(error = %err, "Provider task failed"),
            }
        }
        results
    }
}

async fn request_drafts(
    provider: &dyn TextGenerationProvider,
    question_type: QuestionType,
    count: usize,
    user_content: &str,
    timeout: Duration,
) -> Vec<QuestionDraft> {
    let prompt = prompts::for_type(question_type, count);
    let call = provider.complete(&prompt.system, user_content, prompt.max_tokens, prompt.temperature);

    let content = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(content)) => content,
        Ok(Err(err)) => {
            tracing::warn!(question_type = question_type.as_str(), error = %err, "Provider request failed");
            return Vec::new();
        }
        Err(_) => {
            tracing::warn!(
                question_type = question_type.as_str(),
                timeout_secs = timeout.as_secs_f64(),
                "Provider request timed out"
            );
            return Vec::new();
        }
    };

    match parsing::parse_response(question_type, &content) {
        ParsedQuestions::Parsed(drafts) => drafts,
        ParsedQuestions::Empty => {
            tracing::info!(
                question_type = question_type.as_str(),
                chars = content.len(),
                "Provider response contained no usable questions"
            );
            Vec::new()
        }
    }
}

/// Requested types in first-seen order without duplicates; empty means all types.
pub(crate) fn normalize_types(requested: &[QuestionType]) -> Vec<QuestionType> {
    let mut types = Vec::with_capacity(QuestionType::ALL.len());
    for question_type in requested {
        if !types.contains(question_type) {
            types.push(*question_type);
        }
    }
    if types.is_empty() {
        types.extend(QuestionType::ALL);
    }
    types
}
