//! Answer capture by voice or typed text.
//!
//! Capture never fails from the engine's point of view: every problem is
//! folded into an [`Answer`] with no text and a [`MissReason`].

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::{debug, info, warn};

use crate::error::RecognitionError;
use crate::model::{Answer, MissReason, Modality, Question};
use crate::traits::{ListenLimits, SpeechRecognizer};

/// Captures one answer per question.
#[async_trait]
pub trait AnswerChannel: Send {
    fn modality(&self) -> Modality;

    async fn capture(&mut self, question: &Question) -> Answer;
}

/// Settings for microphone capture.
#[derive(Debug, Clone, Copy)]
pub struct AudioCaptureConfig {
    /// Ambient-noise sampling before each listen.
    pub calibration: Duration,
    pub limits: ListenLimits,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self {
            calibration: Duration::from_millis(500),
            limits: ListenLimits::default(),
        }
    }
}

/// Answers spoken into a microphone and transcribed by a recognizer.
pub struct AudioCapture<R> {
    recognizer: R,
    config: AudioCaptureConfig,
}

impl<R: SpeechRecognizer> AudioCapture<R> {
    pub fn new(recognizer: R, config: AudioCaptureConfig) -> Self {
        Self { recognizer, config }
    }
}

#[async_trait]
impl<R: SpeechRecognizer> AnswerChannel for AudioCapture<R> {
    fn modality(&self) -> Modality {
        Modality::Audio
    }

    async fn capture(&mut self, question: &Question) -> Answer {
        if let Err(e) = self.recognizer.calibrate(self.config.calibration).await {
            debug!("ambient calibration failed, continuing: {e:#}");
        }

        info!(question = question.index, "listening for answer");
        match self.recognizer.listen(self.config.limits).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(question = question.index, "heard: {}", text.trim());
                Answer::given(text.trim(), Modality::Audio)
            }
            Ok(_) | Err(RecognitionError::Unintelligible) => {
                warn!(question = question.index, "could not understand audio");
                Answer::absent(Modality::Audio, MissReason::Unintelligible)
            }
            Err(RecognitionError::Timeout) => {
                warn!(question = question.index, "no speech before timeout");
                Answer::absent(Modality::Audio, MissReason::NoSpeech)
            }
            Err(RecognitionError::Service(message)) => {
                warn!(question = question.index, "recognition service error: {message}");
                Answer::absent(Modality::Audio, MissReason::ServiceError(message))
            }
        }
    }
}

/// Answers typed as a single line.
pub struct TextCapture<R> {
    reader: R,
    prompt: String,
    console: Box<dyn Write + Send>,
}

impl TextCapture<BufReader<Stdin>> {
    /// Read answers from standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> TextCapture<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            prompt: "✍️  Your answer: ".to_string(),
            console: Box::new(std::io::stdout()),
        }
    }

    /// Redirect the prompt (stdout by default).
    pub fn with_console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = console;
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> AnswerChannel for TextCapture<R> {
    fn modality(&self) -> Modality {
        Modality::Text
    }

    async fn capture(&mut self, question: &Question) -> Answer {
        if !self.prompt.is_empty() {
            let printed = write!(self.console, "{}", self.prompt).and_then(|()| self.console.flush());
            if let Err(e) = printed {
                debug!("failed to print answer prompt: {e}");
            }
        }

        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(question = question.index, "input closed");
                Answer::absent(Modality::Text, MissReason::NoInput)
            }
            Ok(_) if line.trim().is_empty() => Answer::absent(Modality::Text, MissReason::NoInput),
            Ok(_) => Answer::given(line.trim(), Modality::Text),
            Err(e) => {
                warn!(question = question.index, "failed to read typed answer: {e}");
                Answer::absent(Modality::Text, MissReason::NoInput)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::testing::SharedBuffer;

    fn question() -> Question {
        Question {
            index: 1,
            text: "What is osmosis?".into(),
        }
    }

    struct QueuedRecognizer {
        results: VecDeque<Result<String, RecognitionError>>,
        calibrations: Arc<AtomicU32>,
        fail_calibration: bool,
        seen_limits: Option<ListenLimits>,
    }

    impl QueuedRecognizer {
        fn new(results: Vec<Result<String, RecognitionError>>) -> Self {
            Self {
                results: results.into(),
                calibrations: Arc::new(AtomicU32::new(0)),
                fail_calibration: false,
                seen_limits: None,
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for QueuedRecognizer {
        async fn calibrate(&mut self, _duration: Duration) -> anyhow::Result<()> {
            self.calibrations.fetch_add(1, Ordering::Relaxed);
            if self.fail_calibration {
                anyhow::bail!("no microphone gain control");
            }
            Ok(())
        }

        async fn listen(&mut self, limits: ListenLimits) -> Result<String, RecognitionError> {
            self.seen_limits = Some(limits);
            self.results
                .pop_front()
                .unwrap_or(Err(RecognitionError::Timeout))
        }
    }

    #[tokio::test]
    async fn audio_returns_trimmed_transcript() {
        let recognizer = QueuedRecognizer::new(vec![Ok("  water moving across a membrane ".into())]);
        let calibrations = recognizer.calibrations.clone();
        let mut channel = AudioCapture::new(recognizer, AudioCaptureConfig::default());

        let answer = channel.capture(&question()).await;
        assert_eq!(answer.text.as_deref(), Some("water moving across a membrane"));
        assert_eq!(answer.modality, Modality::Audio);
        assert_eq!(calibrations.load(Ordering::Relaxed), 1);
        assert_eq!(
            channel.recognizer.seen_limits,
            Some(ListenLimits {
                start_timeout: Duration::from_secs(15),
                phrase_limit: Duration::from_secs(20),
            })
        );
    }

    #[tokio::test]
    async fn audio_failures_collapse_to_absent_with_reason() {
        let recognizer = QueuedRecognizer::new(vec![
            Err(RecognitionError::Timeout),
            Err(RecognitionError::Unintelligible),
            Err(RecognitionError::Service("503".into())),
            Ok("   ".into()),
        ]);
        let mut channel = AudioCapture::new(recognizer, AudioCaptureConfig::default());

        let reasons: Vec<_> = {
            let mut out = Vec::new();
            for _ in 0..4 {
                let answer = channel.capture(&question()).await;
                assert!(answer.text.is_none());
                out.push(answer.miss.unwrap());
            }
            out
        };
        assert_eq!(
            reasons,
            vec![
                MissReason::NoSpeech,
                MissReason::Unintelligible,
                MissReason::ServiceError("503".into()),
                MissReason::Unintelligible,
            ]
        );
    }

    #[tokio::test]
    async fn calibration_failure_does_not_block_listening() {
        let mut recognizer = QueuedRecognizer::new(vec![Ok("diffusion".into())]);
        recognizer.fail_calibration = true;
        let mut channel = AudioCapture::new(recognizer, AudioCaptureConfig::default());
        let answer = channel.capture(&question()).await;
        assert_eq!(answer.content(), Some("diffusion"));
    }

    #[tokio::test]
    async fn text_reads_one_line_per_question() {
        let input: &[u8] = b"first answer\n\nthird\n";
        let mut channel = TextCapture::new(input).with_prompt("");

        let first = channel.capture(&question()).await;
        assert_eq!(first.content(), Some("first answer"));

        let blank = channel.capture(&question()).await;
        assert_eq!(blank.text, None);
        assert_eq!(blank.miss, Some(MissReason::NoInput));

        let third = channel.capture(&question()).await;
        assert_eq!(third.content(), Some("third"));

        let closed = channel.capture(&question()).await;
        assert_eq!(closed.miss, Some(MissReason::NoInput));
        assert_eq!(closed.modality, Modality::Text);
    }

    #[tokio::test]
    async fn text_prompt_goes_to_console() {
        let console = SharedBuffer::default();
        let input: &[u8] = b"osmosis\n";
        let mut channel = TextCapture::new(input)
            .with_prompt("> ")
            .with_console(Box::new(console.clone()));

        channel.capture(&question()).await;
        assert_eq!(console.contents(), "> ");
    }
}
