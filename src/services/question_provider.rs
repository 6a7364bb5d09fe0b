//! Seam to the external question generator, plus the fallback policy that keeps games moving
//! when it misbehaves.

use std::{collections::HashSet, time::Duration};

use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::state::question::{ANSWERS_PER_QUESTION, Answer, Difficulty, Question};

/// Result alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure reported by a question provider, or detected on its output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider could not be reached or refused the request.
    #[error("question provider unavailable: {0}")]
    Unavailable(String),
    /// The provider answered with data that does not satisfy the question contract.
    #[error("malformed provider output: {0}")]
    Malformed(String),
    /// The provider did not answer in time.
    #[error("question provider timed out after {0:?}")]
    Timeout(Duration),
}

/// Parameters of a question batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRequest {
    /// Topic picked by the players.
    pub topic: String,
    /// Difficulty of the round.
    pub difficulty: Difficulty,
    /// Exact number of questions wanted.
    pub count: usize,
    /// Question texts already used in the game.
    pub exclude_texts: Vec<String>,
}

/// External generator of questions and topics.
pub trait QuestionProvider: Send + Sync {
    /// Generate `request.count` questions.
    fn generate_questions(&self, request: QuestionRequest)
    -> BoxFuture<'static, ProviderResult<Vec<Question>>>;
    /// Generate `count` topic suggestions.
    fn generate_topics(&self, count: usize) -> BoxFuture<'static, ProviderResult<Vec<String>>>;
}

/// Topics offered when the provider cannot suggest any.
pub const FALLBACK_TOPICS: [&str; 18] = [
    "World History",
    "Science & Nature",
    "Geography",
    "Literature",
    "Movies & TV",
    "Sports",
    "Technology",
    "Music",
    "Art & Culture",
    "Food & Cooking",
    "Space & Astronomy",
    "Animals",
    "Politics",
    "Philosophy",
    "Mathematics",
    "Medicine",
    "Architecture",
    "Religion",
];

/// Provider used when no generator service is wired in.
///
/// Topics come from the built-in list in random order; questions are the placeholder set.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineQuestionProvider;

impl QuestionProvider for OfflineQuestionProvider {
    fn generate_questions(
        &self,
        request: QuestionRequest,
    ) -> BoxFuture<'static, ProviderResult<Vec<Question>>> {
        Box::pin(async move {
            Ok(fallback_questions(
                &request.topic,
                request.difficulty,
                request.count,
            ))
        })
    }

    fn generate_topics(&self, count: usize) -> BoxFuture<'static, ProviderResult<Vec<String>>> {
        Box::pin(async move {
            let mut topics: Vec<String> = FALLBACK_TOPICS.iter().map(|t| t.to_string()).collect();
            topics.shuffle(&mut rand::rng());
            topics.truncate(count);
            Ok(topics)
        })
    }
}

/// Fetch a validated question batch, substituting the placeholder set on any failure.
pub async fn fetch_questions(
    provider: &dyn QuestionProvider,
    request: QuestionRequest,
    limit: Duration,
) -> Vec<Question> {
    let topic = request.topic.clone();
    let difficulty = request.difficulty;
    let count = request.count;

    let outcome = match timeout(limit, provider.generate_questions(request)).await {
        Ok(result) => result.and_then(|questions| validate_questions(questions, count)),
        Err(_) => Err(ProviderError::Timeout(limit)),
    };

    match outcome {
        Ok(questions) => {
            debug!(topic = %topic, count, "question batch accepted");
            questions
        }
        Err(err) => {
            warn!(error = %err, topic = %topic, "using fallback questions");
            fallback_questions(&topic, difficulty, count)
        }
    }
}

/// Fetch topic suggestions, substituting the built-in list on any failure.
pub async fn fetch_topics(
    provider: &dyn QuestionProvider,
    count: usize,
    limit: Duration,
) -> Vec<String> {
    let outcome = match timeout(limit, provider.generate_topics(count)).await {
        Ok(result) => result.and_then(|topics| validate_topics(topics, count)),
        Err(_) => Err(ProviderError::Timeout(limit)),
    };

    outcome.unwrap_or_else(|err| {
        warn!(error = %err, "using fallback topics");
        fallback_topics(count)
    })
}

/// Check that a batch holds exactly `count` questions with four answers and one correct each.
///
/// The correct index is re-derived from the answer flags.
pub fn validate_questions(
    questions: Vec<Question>,
    count: usize,
) -> ProviderResult<Vec<Question>> {
    if questions.len() != count {
        return Err(ProviderError::Malformed(format!(
            "expected {count} questions, got {}",
            questions.len()
        )));
    }

    questions
        .into_iter()
        .enumerate()
        .map(|(position, mut question)| {
            if question.text.trim().is_empty() {
                return Err(ProviderError::Malformed(format!(
                    "question {position} has no text"
                )));
            }
            if question.answers.len() != ANSWERS_PER_QUESTION {
                return Err(ProviderError::Malformed(format!(
                    "question {position} has {} answers",
                    question.answers.len()
                )));
            }
            let correct: Vec<usize> = question
                .answers
                .iter()
                .enumerate()
                .filter(|(_, answer)| answer.is_correct)
                .map(|(index, _)| index)
                .collect();
            let [index] = correct.as_slice() else {
                return Err(ProviderError::Malformed(format!(
                    "question {position} has {} correct answers",
                    correct.len()
                )));
            };
            question.correct_answer_index = *index;
            Ok(question)
        })
        .collect()
}

fn validate_topics(topics: Vec<String>, count: usize) -> ProviderResult<Vec<String>> {
    let mut seen = HashSet::new();
    let topics: Vec<String> = topics
        .into_iter()
        .map(|topic| topic.trim().to_string())
        .filter(|topic| !topic.is_empty() && seen.insert(topic.to_lowercase()))
        .take(count)
        .collect();

    if topics.is_empty() {
        return Err(ProviderError::Malformed("no usable topic".into()));
    }
    Ok(topics)
}

/// Placeholder questions used when the provider fails.
pub fn fallback_questions(topic: &str, difficulty: Difficulty, count: usize) -> Vec<Question> {
    (0..count)
        .map(|_| {
            Question::new(
                format!("What is a key fact about {topic}?"),
                vec![
                    Answer {
                        text: "This is a fallback question".into(),
                        is_correct: true,
                    },
                    Answer {
                        text: "The question service is temporarily unavailable".into(),
                        is_correct: false,
                    },
                    Answer {
                        text: "Please try again later".into(),
                        is_correct: false,
                    },
                    Answer {
                        text: "System is experiencing issues".into(),
                        is_correct: false,
                    },
                ],
                "This is a fallback question generated when the question service is unavailable.",
                difficulty,
                topic,
            )
        })
        .collect()
}

/// Built-in topics, first `count` entries.
pub fn fallback_topics(count: usize) -> Vec<String> {
    FALLBACK_TOPICS
        .iter()
        .take(count.max(1))
        .map(|topic| topic.to_string())
        .collect()
}
