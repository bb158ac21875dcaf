//! Score aggregation and grading.

use serde::{Deserialize, Serialize};

use crate::model::{Evaluation, Score};

/// One row of the grade table: percentages at or above `min_percentage` earn `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeTier {
    pub min_percentage: f64,
    pub label: String,
}

/// Ordered, non-overlapping grade boundaries. The last tier is the catch-all.
///
/// Never empty; deserialization rejects an empty tier list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<GradeTier>", try_from = "Vec<GradeTier>")]
pub struct GradeTable {
    tiers: Vec<GradeTier>,
}

impl Default for GradeTable {
    fn default() -> Self {
        let tiers = [
            (90.0, "A+ (Excellent)"),
            (80.0, "A (Very Good)"),
            (70.0, "B (Good)"),
            (60.0, "C (Satisfactory)"),
            (50.0, "D (Pass)"),
            (0.0, "F (Needs Improvement)"),
        ]
        .into_iter()
        .map(|(min_percentage, label)| GradeTier {
            min_percentage,
            label: label.to_string(),
        })
        .collect();
        Self { tiers }
    }
}

impl GradeTable {
    /// Build a table from tiers, sorting them from highest threshold down.
    ///
    /// Returns `None` if `tiers` is empty.
    pub fn new(mut tiers: Vec<GradeTier>) -> Option<Self> {
        if tiers.is_empty() {
            return None;
        }
        tiers.sort_by(|a, b| b.min_percentage.total_cmp(&a.min_percentage));
        Some(Self { tiers })
    }

    pub fn tiers(&self) -> &[GradeTier] {
        &self.tiers
    }

    /// The first tier whose threshold `percentage` reaches, else the lowest tier.
    pub fn grade(&self, percentage: f64) -> &GradeTier {
        self.tiers
            .iter()
            .find(|tier| percentage >= tier.min_percentage)
            .unwrap_or_else(|| &self.tiers[self.tiers.len() - 1])
    }
}

impl TryFrom<Vec<GradeTier>> for GradeTable {
    type Error = String;

    fn try_from(tiers: Vec<GradeTier>) -> Result<Self, Self::Error> {
        GradeTable::new(tiers).ok_or_else(|| "grade table needs at least one tier".to_string())
    }
}

impl From<GradeTable> for Vec<GradeTier> {
    fn from(table: GradeTable) -> Self {
        table.tiers
    }
}

/// Spoken closing line, chosen by percentage band.
pub fn summary_sentence(total: f64, question_count: usize, percentage: f64) -> String {
    let opener = if percentage >= 80.0 {
        "Excellent work!"
    } else if percentage >= 60.0 {
        "Good job!"
    } else if percentage >= 40.0 {
        "Not bad, but there is room to improve."
    } else {
        "Keep studying, you will get there."
    };
    format!(
        "{opener} You scored {} out of {question_count}, that is {percentage:.1} percent.",
        format_points(total)
    )
}

/// Format a total so whole numbers print without a fraction.
pub fn format_points(total: f64) -> String {
    if total.fract() == 0.0 {
        format!("{total:.0}")
    } else {
        format!("{total:.1}")
    }
}

/// The final result of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    /// Per-question scores in exam order.
    pub breakdown: Vec<Score>,
    pub total: f64,
    pub question_count: usize,
    pub percentage: f64,
    pub grade: String,
    pub summary: String,
}

/// Running score accumulator.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    scores: Vec<Score>,
    total: f64,
    table: GradeTable,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grade_table(table: GradeTable) -> Self {
        Self {
            table,
            ..Self::default()
        }
    }

    /// Record an evaluation and return the running total.
    pub fn record(&mut self, evaluation: &Evaluation) -> f64 {
        self.record_score(evaluation.score)
    }

    pub fn record_score(&mut self, score: Score) -> f64 {
        self.scores.push(score);
        self.total += score.value();
        self.total
    }

    pub fn running_total(&self) -> f64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn scores(&self) -> &[Score] {
        &self.scores
    }

    /// Compute percentage, grade and summary over `question_count` questions.
    pub fn finish(&self, question_count: usize) -> GradeReport {
        let percentage = if question_count == 0 {
            0.0
        } else {
            self.total / question_count as f64 * 100.0
        };
        let grade = self.table.grade(percentage).label.clone();

        GradeReport {
            breakdown: self.scores.clone(),
            total: self.total,
            question_count,
            percentage,
            grade,
            summary: summary_sentence(self.total, question_count, percentage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_and_percentage() {
        let mut agg = SessionAggregator::new();
        let mut running = Vec::new();
        for score in [Score::Full, Score::Half, Score::Zero, Score::Full] {
            running.push(agg.record_score(score));
        }
        assert_eq!(running, vec![1.0, 1.5, 1.5, 2.5]);

        let report = agg.finish(4);
        assert_eq!(report.total, 2.5);
        assert_eq!(report.percentage, 62.5);
        assert_eq!(report.grade, "C (Satisfactory)");
        assert_eq!(report.breakdown.len(), 4);
    }

    #[test]
    fn grade_boundaries() {
        let table = GradeTable::default();
        assert_eq!(table.grade(100.0).label, "A+ (Excellent)");
        assert_eq!(table.grade(90.0).label, "A+ (Excellent)");
        assert_eq!(table.grade(89.9).label, "A (Very Good)");
        assert_eq!(table.grade(85.0).label, "A (Very Good)");
        assert_eq!(table.grade(70.0).label, "B (Good)");
        assert_eq!(table.grade(60.0).label, "C (Satisfactory)");
        assert_eq!(table.grade(50.0).label, "D (Pass)");
        assert_eq!(table.grade(49.0).label, "F (Needs Improvement)");
        assert_eq!(table.grade(0.0).label, "F (Needs Improvement)");
    }

    #[test]
    fn custom_table_is_sorted_and_lowest_is_catch_all() {
        let table = GradeTable::new(vec![
            GradeTier {
                min_percentage: 40.0,
                label: "Fail".into(),
            },
            GradeTier {
                min_percentage: 75.0,
                label: "Pass".into(),
            },
        ])
        .unwrap();
        assert_eq!(table.grade(80.0).label, "Pass");
        assert_eq!(table.grade(50.0).label, "Fail");
        assert_eq!(table.grade(10.0).label, "Fail");
        assert!(GradeTable::new(Vec::new()).is_none());
    }

    #[test]
    fn table_deserializes_only_with_tiers() {
        let json = r#"[{"min_percentage": 50.0, "label": "Pass"}, {"min_percentage": 0.0, "label": "Fail"}]"#;
        let table: GradeTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.grade(55.0).label, "Pass");
        assert_eq!(table.tiers().len(), 2);

        assert!(serde_json::from_str::<GradeTable>("[]").is_err());

        let round = serde_json::to_string(&GradeTable::default()).unwrap();
        assert_eq!(serde_json::from_str::<GradeTable>(&round).unwrap(), GradeTable::default());
    }

    #[test]
    fn aggregator_uses_its_grade_table() {
        let table = GradeTable::new(vec![
            GradeTier {
                min_percentage: 50.0,
                label: "Pass".into(),
            },
            GradeTier {
                min_percentage: 0.0,
                label: "Fail".into(),
            },
        ])
        .unwrap();
        let mut agg = SessionAggregator::with_grade_table(table);
        agg.record_score(Score::Half);
        assert_eq!(agg.finish(1).grade, "Pass");
    }

    #[test]
    fn summary_wording_follows_bands() {
        assert!(summary_sentence(4.0, 5, 80.0).starts_with("Excellent"));
        assert!(summary_sentence(3.0, 5, 60.0).starts_with("Good job"));
        assert!(summary_sentence(2.0, 5, 40.0).starts_with("Not bad"));
        assert!(summary_sentence(1.5, 5, 30.0).starts_with("Keep studying"));
        assert!(summary_sentence(2.5, 4, 62.5).contains("2.5 out of 4"));
        assert!(summary_sentence(3.0, 4, 75.0).contains("3 out of 4"));
    }

    #[test]
    fn empty_session_scores_zero() {
        let report = SessionAggregator::new().finish(0);
        assert_eq!(report.percentage, 0.0);
        assert_eq!(report.grade, "F (Needs Improvement)");
    }
}
