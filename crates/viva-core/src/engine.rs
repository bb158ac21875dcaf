//! Central exam session orchestrator.
//!
//! Drives one viva from source content to a final grade:
//! generate questions, then for each question ask, capture, evaluate and
//! report, then summarize. Everything runs sequentially on the caller's task.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::aggregate::{GradeReport, GradeTable, SessionAggregator};
use crate::capture::AnswerChannel;
use crate::error::SessionError;
use crate::evaluator::Evaluator;
use crate::generator::QuestionGenerator;
use crate::model::{Answer, Evaluation, MissReason, Question};
use crate::speech::SpeechOutput;

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of questions to request (clamped to 1..=10).
    pub question_count: usize,
    /// Capture attempts per question when the candidate was silent or unclear.
    pub capture_attempts: u32,
    pub grade_table: GradeTable,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            question_count: 3,
            capture_attempts: 3,
            grade_table: GradeTable::default(),
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Generating,
    Asking,
    Capturing,
    Evaluating,
    Reporting,
    Summarizing,
    Done,
    Aborted,
}

impl SessionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Done, _) | (Aborted, _) => false,
            (_, Aborted) => true,
            (Idle, Loading)
            | (Loading, Generating)
            | (Generating, Asking)
            | (Asking, Capturing)
            | (Capturing, Evaluating)
            | (Evaluating, Reporting)
            | (Reporting, Asking)
            | (Reporting, Summarizing)
            | (Summarizing, Done) => true,
            _ => false,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_questions_ready(&self, questions: &[Question], requested: usize);
    fn on_question_start(&self, question: &Question, total: usize);
    fn on_answer(&self, question: &Question, answer: &Answer);
    fn on_evaluation(&self, question: &Question, evaluation: &Evaluation, running_total: f64);
    fn on_session_complete(&self, outcome: &SessionOutcome);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_questions_ready(&self, _: &[Question], _: usize) {}
    fn on_question_start(&self, _: &Question, _: usize) {}
    fn on_answer(&self, _: &Question, _: &Answer) {}
    fn on_evaluation(&self, _: &Question, _: &Evaluation, _: f64) {}
    fn on_session_complete(&self, _: &SessionOutcome) {}
}

/// One asked question with its answer and evaluation.
#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub question: Question,
    pub answer: Answer,
    pub evaluation: Evaluation,
}

/// The result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub records: Vec<QuestionRecord>,
    pub requested: usize,
    pub grade: GradeReport,
    pub duration: Duration,
}

/// A single viva session.
pub struct VivaSession {
    generator: QuestionGenerator,
    evaluator: Evaluator,
    channel: Box<dyn AnswerChannel>,
    speech: SpeechOutput,
    config: SessionConfig,
    state: SessionState,
}

impl VivaSession {
    pub fn new(
        generator: QuestionGenerator,
        evaluator: Evaluator,
        channel: Box<dyn AnswerChannel>,
        speech: SpeechOutput,
        config: SessionConfig,
    ) -> Self {
        Self {
            generator,
            evaluator,
            channel,
            speech,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn speech(&self) -> &SpeechOutput {
        &self.speech
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal session transition {:?} -> {next:?}",
            self.state
        );
        debug!("session state {:?} -> {next:?}", self.state);
        self.state = next;
    }

    /// Run the session until it finishes or `interrupt` resolves.
    ///
    /// A session runs once. Calling `run` again returns
    /// [`SessionError::AlreadyFinished`] without touching any service.
    /// The voice resource is released on every exit path.
    pub async fn run<F>(
        &mut self,
        content: &str,
        progress: &dyn ProgressReporter,
        interrupt: F,
    ) -> Result<SessionOutcome, SessionError>
    where
        F: Future<Output = ()>,
    {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyFinished(format!("{:?}", self.state)));
        }

        let result = tokio::select! {
            biased;
            _ = interrupt => Err(SessionError::Interrupted),
            result = self.run_inner(content, progress) => result,
        };

        if let Err(e) = &result {
            error!("session aborted: {e}");
            self.transition(SessionState::Aborted);
        }
        self.speech.release().await;
        result
    }

    async fn run_inner(
        &mut self,
        content: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<SessionOutcome, SessionError> {
        let start = Instant::now();

        self.transition(SessionState::Loading);
        if content.trim().is_empty() {
            return Err(SessionError::Content("source content is empty".into()));
        }
        self.speech.init().await;

        self.transition(SessionState::Generating);
        self.speech.speak("Generating viva questions.").await;
        let set = self
            .generator
            .generate(content, self.config.question_count)
            .await;
        if set.is_empty() {
            return Err(SessionError::Generation(
                "no questions could be generated from the content".into(),
            ));
        }
        progress.on_questions_ready(&set.questions, set.requested);

        let total = set.len();
        let mut aggregator =
            SessionAggregator::with_grade_table(self.config.grade_table.clone());
        let mut records = Vec::with_capacity(total);

        for question in set.questions {
            self.transition(SessionState::Asking);
            progress.on_question_start(&question, total);
            self.speech
                .speak(&format!("Question {}. {}", question.index, question.text))
                .await;

            self.transition(SessionState::Capturing);
            let answer = self.capture_answer(&question).await;
            progress.on_answer(&question, &answer);

            self.transition(SessionState::Evaluating);
            let evaluation = self.evaluator.evaluate(&question, &answer).await;

            self.transition(SessionState::Reporting);
            self.speech.speak(&evaluation.feedback).await;
            let running_total = aggregator.record(&evaluation);
            info!(
                question = question.index,
                score = %evaluation.score,
                running_total,
                "question scored"
            );
            progress.on_evaluation(&question, &evaluation, running_total);

            records.push(QuestionRecord {
                question,
                answer,
                evaluation,
            });
        }

        self.transition(SessionState::Summarizing);
        let grade = aggregator.finish(total);
        self.speech.speak(&grade.summary).await;

        let outcome = SessionOutcome {
            records,
            requested: set.requested,
            grade,
            duration: start.elapsed(),
        };
        self.transition(SessionState::Done);
        progress.on_session_complete(&outcome);
        info!(
            percentage = outcome.grade.percentage,
            grade = %outcome.grade.grade,
            "session complete"
        );

        Ok(outcome)
    }

    async fn capture_answer(&mut self, question: &Question) -> Answer {
        let attempts = self.config.capture_attempts.max(1);
        let mut attempt = 1;
        loop {
            let answer = self.channel.capture(question).await;
            let retry = match &answer.miss {
                Some(reason) if answer.content().is_none() => reason.is_retryable(),
                _ => false,
            };
            if !retry || attempt >= attempts {
                return answer;
            }

            warn!(
                question = question.index,
                attempt, "no usable answer, asking again"
            );
            let reprompt = match answer.miss {
                Some(MissReason::NoSpeech) => "No response detected. Try again.",
                _ => "Sorry, I could not understand. Try again.",
            };
            self.speech.speak(reprompt).await;
            attempt += 1;
        }
    }
}
