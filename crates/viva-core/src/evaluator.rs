//! Answer evaluation.
//!
//! The judge is asked to reply with exactly two tagged lines:
//!
//! ```text
//! SCORE: <0|0.5|1>
//! FEEDBACK: <text>
//! ```
//!
//! [`ScoringPolicy::parse`] reads that contract when it is honoured and
//! falls back to ordered keyword rules when no score line exists at all.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Answer, Evaluation, EvaluationSource, Question, Score};
use crate::traits::{CompletionProvider, CompletionRequest};

const JUDGE_SYSTEM_PROMPT: &str = "You're a friendly and encouraging teacher.";

/// A keyword classification rule for replies that ignore the score tag.
///
/// Matches when any `any_of` term occurs in the lowercased reply and no
/// `none_of` term does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub score: Score,
    pub any_of: Vec<String>,
    #[serde(default)]
    pub none_of: Vec<String>,
}

impl KeywordRule {
    pub fn matches(&self, lowered: &str) -> bool {
        self.any_of.iter().any(|k| lowered.contains(k.as_str()))
            && !self.none_of.iter().any(|k| lowered.contains(k.as_str()))
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

/// Parsing and messaging policy for evaluations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub score_tag: String,
    pub feedback_tag: String,
    /// Checked in order; the first match wins.
    pub rules: Vec<KeywordRule>,
    pub default_feedback: String,
    pub skip_message: String,
    pub unavailable_message: String,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let affirmative = words(&["correct", "right", "exactly", "perfect"]);
        let partial = words(&["partially", "somewhat", "partly", "close"]);
        Self::with_keywords(affirmative, partial)
    }
}

impl ScoringPolicy {
    /// Build the two-rule policy: affirmative terms score 1 unless hedged by
    /// a partial term; partial terms score 0.5.
    pub fn with_keywords(affirmative: Vec<String>, partial: Vec<String>) -> Self {
        Self {
            score_tag: "SCORE:".to_string(),
            feedback_tag: "FEEDBACK:".to_string(),
            rules: vec![
                KeywordRule {
                    score: Score::Full,
                    any_of: affirmative,
                    none_of: partial.clone(),
                },
                KeywordRule {
                    score: Score::Half,
                    any_of: partial,
                    none_of: Vec::new(),
                },
            ],
            default_feedback: "Good effort! Keep practicing.".to_string(),
            skip_message: "Let's skip this one and move to the next question.".to_string(),
            unavailable_message: "Sorry, I couldn't evaluate that answer right now.".to_string(),
        }
    }

    /// Parse a judge reply into an evaluation.
    pub fn parse(&self, response: &str) -> Evaluation {
        match self.tagged_value(response, &self.score_tag) {
            Some(raw_score) => self.parse_structured(raw_score, response),
            None => self.classify(response),
        }
    }

    fn tagged_value<'a>(&self, response: &'a str, tag: &str) -> Option<&'a str> {
        response
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(tag))
            .map(str::trim)
    }

    fn parse_structured(&self, raw_score: &str, response: &str) -> Evaluation {
        let score = raw_score
            .parse::<f64>()
            .ok()
            .and_then(Score::from_value)
            .unwrap_or_else(|| {
                debug!("unusable score value {raw_score:?}, treating as 0");
                Score::Zero
            });

        let feedback = self
            .tagged_value(response, &self.feedback_tag)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_feedback.clone());

        Evaluation {
            score,
            feedback,
            source: EvaluationSource::Structured,
        }
    }

    /// Score a reply that has no score line by keyword rules.
    pub fn classify(&self, response: &str) -> Evaluation {
        let lowered = response.to_lowercase();
        let score = self
            .rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.score)
            .unwrap_or(Score::Zero);

        Evaluation {
            score,
            feedback: response.to_string(),
            source: EvaluationSource::Heuristic,
        }
    }

    pub fn skipped(&self) -> Evaluation {
        Evaluation {
            score: Score::Zero,
            feedback: self.skip_message.clone(),
            source: EvaluationSource::Skipped,
        }
    }

    pub fn unavailable(&self) -> Evaluation {
        Evaluation {
            score: Score::Zero,
            feedback: self.unavailable_message.clone(),
            source: EvaluationSource::Unavailable,
        }
    }
}

/// Settings for the judging call.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub policy: ScoringPolicy,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 256,
            temperature: 0.0,
            policy: ScoringPolicy::default(),
        }
    }
}

/// Scores answers with a language-model judge.
pub struct Evaluator {
    provider: Arc<dyn CompletionProvider>,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: EvaluatorConfig) -> Self {
        Self { provider, config }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.config.policy
    }

    fn build_request(&self, question: &Question, answer: &str) -> CompletionRequest {
        let policy = &self.config.policy;
        CompletionRequest {
            model: self.config.model.clone(),
            system_prompt: JUDGE_SYSTEM_PROMPT.to_string(),
            prompt: format!(
                "This is a viva question: '{question}'. The student answered: '{answer}'.\n\
                 Judge the answer and reply with exactly two lines and nothing else:\n\
                 {score_tag} <0, 0.5 or 1>  (1 = correct, 0.5 = partially correct, 0 = incorrect)\n\
                 {feedback_tag} <one or two sentences of gentle, encouraging feedback>",
                question = question.text,
                score_tag = policy.score_tag,
                feedback_tag = policy.feedback_tag,
            ),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Evaluate one answer. Never fails: skips and service errors score 0.
    pub async fn evaluate(&self, question: &Question, answer: &Answer) -> Evaluation {
        let Some(text) = answer.content() else {
            debug!(question = question.index, "no answer given, skipping judge");
            return self.config.policy.skipped();
        };

        let request = self.build_request(question, text);
        match self.provider.complete(&request).await {
            Ok(response) => {
                let evaluation = self.config.policy.parse(&response.content);
                if evaluation.source == EvaluationSource::Heuristic {
                    warn!(
                        question = question.index,
                        "judge reply had no score line, used keyword fallback"
                    );
                }
                evaluation
            }
            Err(e) => {
                warn!(
                    question = question.index,
                    "evaluation via {} failed: {e:#}",
                    self.provider.name()
                );
                self.config.policy.unavailable()
            }
        }
    }
}
