//! The `viva run` command.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use viva_core::aggregate::format_points;
use viva_core::capture::{AnswerChannel, AudioCapture, TextCapture};
use viva_core::content::load_content;
use viva_core::engine::{ProgressReporter, SessionConfig, SessionOutcome, VivaSession};
use viva_core::evaluator::Evaluator;
use viva_core::generator::{QuestionGenerator, MAX_QUESTIONS, MIN_QUESTIONS};
use viva_core::model::{Answer, Evaluation, MissReason, Modality, Question};
use viva_core::report::SessionReport;
use viva_core::speech::SpeechOutput;
use viva_providers::config::{load_config_from, VivaConfig};
use viva_voice::{CommandRecognizer, CommandSpec, CommandSpeechEngine};

/// Question count used when `--count` is not a number.
const DEFAULT_QUESTION_COUNT: usize = 3;

/// Table cells are clipped to this many characters.
const CELL_WIDTH: usize = 60;

/// Arguments of `viva run`.
pub struct RunOptions {
    pub source: PathBuf,
    pub count: String,
    pub mode: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub config: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub mute: bool,
}

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_questions_ready(&self, questions: &[Question], requested: usize) {
        if questions.len() < requested {
            eprintln!(
                "Note: only {} of {requested} questions could be generated.",
                questions.len()
            );
        }
        eprintln!("Starting viva with {} questions.", questions.len());
    }

    fn on_question_start(&self, question: &Question, total: usize) {
        eprintln!("\n--- Question {}/{total} ---", question.index);
    }

    fn on_answer(&self, _question: &Question, answer: &Answer) {
        match (answer.content(), &answer.miss) {
            (Some(text), _) => eprintln!("  Answer ({}): {text}", answer.modality),
            (None, Some(reason)) => eprintln!("  No answer: {}", describe_miss(reason)),
            (None, None) => eprintln!("  No answer"),
        }
    }

    fn on_evaluation(&self, _question: &Question, evaluation: &Evaluation, running_total: f64) {
        eprintln!(
            "  Score: {} (running total {})",
            evaluation.score,
            format_points(running_total)
        );
    }

    fn on_session_complete(&self, outcome: &SessionOutcome) {
        eprintln!(
            "\nViva complete in {:.1}s.",
            outcome.duration.as_secs_f64()
        );
    }
}

fn describe_miss(reason: &MissReason) -> String {
    match reason {
        MissReason::NoSpeech => "no speech detected".to_string(),
        MissReason::Unintelligible => "could not understand the audio".to_string(),
        MissReason::ServiceError(message) => format!("recognition failed ({message})"),
        MissReason::NoInput => "nothing was typed".to_string(),
    }
}

/// Parse `--count`, warning and substituting when it is unusable.
fn parse_count(raw: &str) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(n) if (MIN_QUESTIONS..=MAX_QUESTIONS).contains(&n) => n,
        Ok(n) => {
            let clamped = n.clamp(MIN_QUESTIONS, MAX_QUESTIONS);
            eprintln!(
                "Warning: question count must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}, using {clamped}."
            );
            clamped
        }
        Err(_) => {
            eprintln!(
                "Warning: invalid question count '{raw}', using {DEFAULT_QUESTION_COUNT}."
            );
            DEFAULT_QUESTION_COUNT
        }
    }
}

fn answer_channel(mode: Modality, config: &VivaConfig) -> Box<dyn AnswerChannel> {
    match (mode, &config.listen.command) {
        (Modality::Audio, Some(program)) => {
            let recognizer =
                CommandRecognizer::new(CommandSpec::new(program, config.listen.args.clone()));
            Box::new(AudioCapture::new(recognizer, config.listen.capture_config()))
        }
        (Modality::Audio, None) => {
            warn!("no [listen] command configured, answers will be typed");
            Box::new(TextCapture::stdin())
        }
        (Modality::Text, _) => Box::new(TextCapture::stdin()),
    }
}

fn speech_output(config: &VivaConfig, mute: bool) -> SpeechOutput {
    let engine = CommandSpeechEngine::new(CommandSpec::new(
        &config.voice.command,
        config.voice.args.clone(),
    ));
    let output = SpeechOutput::new(Box::new(engine), config.voice.speech_config());
    if mute {
        output.muted()
    } else {
        output
    }
}

/// Wait for Ctrl-C. If the handler cannot be installed, never resolve.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

pub async fn execute(options: RunOptions) -> Result<()> {
    let config = load_config_from(options.config.as_deref())?;

    let count = parse_count(&options.count);
    let mode = Modality::from_str(&options.mode).map_err(anyhow::Error::msg)?;
    let content = load_content(&options.source)?;

    let provider_name = options
        .provider
        .unwrap_or_else(|| config.default_provider.clone());
    let model = options
        .model
        .unwrap_or_else(|| config.default_model.clone());
    let provider = config.provider(&provider_name)?;

    eprintln!(
        "viva v{} - {count} questions from {} via {provider_name}/{model} ({mode} answers)",
        env!("CARGO_PKG_VERSION"),
        options.source.display(),
    );

    let session_config = SessionConfig {
        question_count: count,
        capture_attempts: config.listen.attempts,
        grade_table: config.scoring.grades.clone(),
    };
    let mut session = VivaSession::new(
        QuestionGenerator::new(Arc::clone(&provider), config.generator_config(&model)),
        Evaluator::new(Arc::clone(&provider), config.evaluator_config(&model)),
        answer_channel(mode, &config),
        speech_output(&config, options.mute),
        session_config,
    );

    let outcome = session.run(&content, &ConsoleReporter, ctrl_c()).await?;
    print_summary(&outcome);

    if let Some(path) = &options.report {
        let report = SessionReport::from_outcome(
            &outcome,
            &options.source.display().to_string(),
            provider.name(),
            &model,
        );
        report
            .save_json(path)
            .with_context(|| format!("failed to save report to {}", path.display()))?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn print_summary(outcome: &SessionOutcome) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Answer", "Score", "Feedback"]);

    for record in &outcome.records {
        table.add_row(vec![
            Cell::new(record.question.index),
            Cell::new(clip(&record.question.text, CELL_WIDTH)),
            Cell::new(clip(record.answer.content().unwrap_or("-"), CELL_WIDTH)),
            Cell::new(record.evaluation.score),
            Cell::new(clip(&record.evaluation.feedback, CELL_WIDTH)),
        ]);
    }

    let grade = &outcome.grade;
    eprintln!("\n{table}");
    eprintln!(
        "Total: {} / {} ({:.1}%)  Grade: {}",
        format_points(grade.total),
        grade.question_count,
        grade.percentage,
        grade.grade
    );
    eprintln!("{}", grade.summary);
}
