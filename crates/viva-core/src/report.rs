//! Session report with JSON export.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::GradeReport;
use crate::engine::SessionOutcome;
use crate::model::{EvaluationSource, MissReason, Modality, Score};

/// A complete record of one viva session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Where the exam content came from.
    pub source: String,
    /// Provider that generated and judged the questions.
    pub provider: String,
    /// Model used for generation and judging.
    pub model: String,
    /// Number of questions requested (before any under-delivery).
    pub requested: usize,
    /// One entry per asked question, in exam order.
    pub entries: Vec<ReportEntry>,
    pub grade: GradeReport,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// One question of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub index: usize,
    pub question: String,
    pub answer: Option<String>,
    pub modality: Modality,
    #[serde(default)]
    pub miss: Option<MissReason>,
    pub score: Score,
    pub feedback: String,
    pub evaluated_by: EvaluationSource,
}

impl SessionReport {
    pub fn from_outcome(outcome: &SessionOutcome, source: &str, provider: &str, model: &str) -> Self {
        let entries = outcome
            .records
            .iter()
            .map(|r| ReportEntry {
                index: r.question.index,
                question: r.question.text.clone(),
                answer: r.answer.content().map(str::to_string),
                modality: r.answer.modality,
                miss: r.answer.miss.clone(),
                score: r.evaluation.score,
                feedback: r.evaluation.feedback.clone(),
                evaluated_by: r.evaluation.source,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: source.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            requested: outcome.requested,
            entries,
            grade: outcome.grade.clone(),
            duration_ms: outcome.duration.as_millis() as u64,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::aggregate::SessionAggregator;
    use crate::engine::QuestionRecord;
    use crate::model::{Answer, Evaluation, Question};

    fn outcome() -> SessionOutcome {
        let records = vec![
            QuestionRecord {
                question: Question {
                    index: 1,
                    text: "What is X?".into(),
                },
                answer: Answer::given("x", Modality::Text),
                evaluation: Evaluation {
                    score: Score::Half,
                    feedback: "close".into(),
                    source: EvaluationSource::Structured,
                },
            },
            QuestionRecord {
                question: Question {
                    index: 2,
                    text: "Explain Y".into(),
                },
                answer: Answer::absent(Modality::Audio, MissReason::NoSpeech),
                evaluation: Evaluation {
                    score: Score::Zero,
                    feedback: "skip".into(),
                    source: EvaluationSource::Skipped,
                },
            },
        ];
        let mut agg = SessionAggregator::new();
        for r in &records {
            agg.record(&r.evaluation);
        }
        SessionOutcome {
            grade: agg.finish(records.len()),
            records,
            requested: 3,
            duration: Duration::from_millis(1234),
        }
    }

    #[test]
    fn report_mirrors_outcome() {
        let report = SessionReport::from_outcome(&outcome(), "notes.txt", "openai", "gpt-3.5-turbo");
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[1].answer, None);
        assert_eq!(report.entries[1].miss, Some(MissReason::NoSpeech));
        assert_eq!(report.grade.percentage, 25.0);
        assert_eq!(report.requested, 3);
        assert_eq!(report.duration_ms, 1234);
    }

    #[test]
    fn save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let report = SessionReport::from_outcome(&outcome(), "notes.txt", "mock", "mock-model");

        report.save_json(&path).unwrap();
        let loaded = SessionReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.entries[0].score, Score::Half);
        assert_eq!(loaded.grade.grade, report.grade.grade);
    }
}
