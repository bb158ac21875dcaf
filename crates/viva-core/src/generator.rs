//! Question generation from source content.
//!
//! One completion call asks for a numbered list; the reply is then parsed
//! line by line, discarding anything that does not look like a list item.

use std::sync::Arc;

use tracing::{info, warn};

use crate::content::truncate_chars;
use crate::model::Question;
use crate::traits::{CompletionProvider, CompletionRequest};

/// Smallest and largest number of questions a session may ask for.
pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 10;

/// Separators that split a list marker from the question text.
pub const LIST_SEPARATORS: [&str; 4] = [". ", ") ", ": ", "- "];

const GENERATOR_SYSTEM_PROMPT: &str = "You're an examiner generating oral viva questions.";

/// Settings for the generation call.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Content is cut to this many characters before it is sent.
    pub content_char_limit: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 512,
            temperature: 0.2,
            content_char_limit: 1500,
        }
    }
}

/// The questions produced for one session.
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    pub questions: Vec<Question>,
    pub requested: usize,
}

impl QuestionSet {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// How many fewer questions were produced than requested.
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.questions.len())
    }
}

/// Clamp a requested question count into the supported range.
pub fn clamp_count(count: usize) -> usize {
    count.clamp(MIN_QUESTIONS, MAX_QUESTIONS)
}

/// Extract question texts from a numbered-list reply.
///
/// A line qualifies when a digit appears in its first five characters and
/// it contains one of [`LIST_SEPARATORS`]. The line is split at whichever
/// separator occurs first, so sentence breaks inside the question survive.
pub fn parse_question_lines(text: &str) -> Vec<String> {
    text.lines().filter_map(parse_question_line).collect()
}

fn parse_question_line(line: &str) -> Option<String> {
    let line = line.trim();
    if !line.chars().take(5).any(|c| c.is_ascii_digit()) {
        return None;
    }

    let (at, sep) = LIST_SEPARATORS
        .iter()
        .filter_map(|sep| line.find(sep).map(|at| (at, sep)))
        .min_by_key(|(at, _)| *at)?;
    let question = line[at + sep.len()..].trim();

    (!question.is_empty()).then(|| question.to_string())
}

/// Turns source content into an ordered list of questions.
pub struct QuestionGenerator {
    provider: Arc<dyn CompletionProvider>,
    config: GeneratorConfig,
}

impl QuestionGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: GeneratorConfig) -> Self {
        Self { provider, config }
    }

    fn build_request(&self, content: &str, count: usize) -> CompletionRequest {
        let excerpt = truncate_chars(content, self.config.content_char_limit);
        CompletionRequest {
            model: self.config.model.clone(),
            system_prompt: GENERATOR_SYSTEM_PROMPT.to_string(),
            prompt: format!(
                "Generate {count} short viva-style questions based on this content. \
                 Reply with a numbered list, one question per line, and nothing else.\n\n{excerpt}"
            ),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Generate up to `count` questions (clamped to 1..=10).
    ///
    /// A provider failure yields an empty set; the caller decides whether
    /// that is fatal.
    pub async fn generate(&self, content: &str, count: usize) -> QuestionSet {
        let requested = clamp_count(count);
        let request = self.build_request(content, requested);

        let response = match self.provider.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("question generation via {} failed: {e:#}", self.provider.name());
                return QuestionSet {
                    questions: Vec::new(),
                    requested,
                };
            }
        };

        let questions: Vec<Question> = parse_question_lines(&response.content)
            .into_iter()
            .take(requested)
            .enumerate()
            .map(|(i, text)| Question { index: i + 1, text })
            .collect();

        let set = QuestionSet {
            questions,
            requested,
        };

        if set.shortfall() > 0 && !set.is_empty() {
            warn!(
                "requested {} questions but only {} could be parsed",
                set.requested,
                set.len()
            );
        }
        info!("generated {} questions", set.len());

        set
    }
}
