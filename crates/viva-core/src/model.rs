//! Core data model types for viva.
//!
//! Questions, answers, scores and evaluations are created once per exam
//! turn and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single exam question. `index` is 1-based exam order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub index: usize,
    pub text: String,
}

/// How an answer was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Audio,
    Text,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Audio => write!(f, "audio"),
            Modality::Text => write!(f, "text"),
        }
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audio" | "voice" | "speech" => Ok(Modality::Audio),
            "text" | "typed" | "keyboard" => Ok(Modality::Text),
            other => Err(format!("unknown answer mode: {other}")),
        }
    }
}

/// Why an answer carries no text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// No speech began before the start timeout.
    NoSpeech,
    /// Speech was heard but could not be recognized.
    Unintelligible,
    /// The recognition service failed.
    ServiceError(String),
    /// Typed input was empty, cancelled, or unreadable.
    NoInput,
}

impl MissReason {
    /// Whether asking the candidate again could plausibly help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MissReason::NoSpeech | MissReason::Unintelligible)
    }
}

/// The candidate's response to one question. Absent text is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: Option<String>,
    pub modality: Modality,
    #[serde(default)]
    pub miss: Option<MissReason>,
}

impl Answer {
    pub fn given(text: impl Into<String>, modality: Modality) -> Self {
        Self {
            text: Some(text.into()),
            modality,
            miss: None,
        }
    }

    pub fn absent(modality: Modality, reason: MissReason) -> Self {
        Self {
            text: None,
            modality,
            miss: Some(reason),
        }
    }

    /// Returns the trimmed answer text, or `None` if absent or blank.
    pub fn content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// A per-question score. Only the three exam values exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub enum Score {
    Zero,
    Half,
    Full,
}

impl Score {
    pub fn value(self) -> f64 {
        match self {
            Score::Zero => 0.0,
            Score::Half => 0.5,
            Score::Full => 1.0,
        }
    }

    /// Accepts exactly 0, 0.5 or 1 and nothing else.
    pub fn from_value(value: f64) -> Option<Self> {
        if value == 0.0 {
            Some(Score::Zero)
        } else if value == 0.5 {
            Some(Score::Half)
        } else if value == 1.0 {
            Some(Score::Full)
        } else {
            None
        }
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> f64 {
        score.value()
    }
}

impl TryFrom<f64> for Score {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Score::from_value(value).ok_or_else(|| format!("invalid score: {value}"))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Zero => write!(f, "0"),
            Score::Half => write!(f, "0.5"),
            Score::Full => write!(f, "1"),
        }
    }
}

/// Which path produced an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSource {
    /// No answer was given; the judge was not called.
    Skipped,
    /// The judge followed the `SCORE:`/`FEEDBACK:` contract.
    Structured,
    /// The judge ignored the contract; keyword rules decided.
    Heuristic,
    /// The judge could not be reached.
    Unavailable,
}

/// Score and feedback for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: Score,
    pub feedback: String,
    pub source: EvaluationSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_accepts_only_exam_values() {
        assert_eq!(Score::from_value(0.0), Some(Score::Zero));
        assert_eq!(Score::from_value(0.5), Some(Score::Half));
        assert_eq!(Score::from_value(1.0), Some(Score::Full));
        assert_eq!(Score::from_value(0.75), None);
        assert_eq!(Score::from_value(2.0), None);
        assert_eq!(Score::from_value(f64::NAN), None);
    }

    #[test]
    fn score_serializes_as_number() {
        let json = serde_json::to_string(&Score::Half).unwrap();
        assert_eq!(json, "0.5");
        let back: Score = serde_json::from_str("1.0").unwrap();
        assert_eq!(back, Score::Full);
        assert!(serde_json::from_str::<Score>("0.3").is_err());
    }

    #[test]
    fn blank_answer_has_no_content() {
        let answer = Answer::given("   ", Modality::Text);
        assert_eq!(answer.content(), None);
        let answer = Answer::given("  photosynthesis ", Modality::Audio);
        assert_eq!(answer.content(), Some("photosynthesis"));
        assert_eq!(Answer::absent(Modality::Audio, MissReason::NoSpeech).content(), None);
    }

    #[test]
    fn modality_parse() {
        assert_eq!("voice".parse::<Modality>().unwrap(), Modality::Audio);
        assert_eq!("TEXT".parse::<Modality>().unwrap(), Modality::Text);
        assert!("telepathy".parse::<Modality>().is_err());
    }

    #[test]
    fn only_silence_is_retryable() {
        assert!(MissReason::NoSpeech.is_retryable());
        assert!(MissReason::Unintelligible.is_retryable());
        assert!(!MissReason::NoInput.is_retryable());
        assert!(!MissReason::ServiceError("down".into()).is_retryable());
    }
}
