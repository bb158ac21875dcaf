//! Speech recognition through an external transcriber command.
//!
//! The transcriber records one utterance from the default microphone and
//! prints its transcript on stdout. It is invoked as
//!
//! ```text
//! <program> <args...> --start-timeout <secs> --phrase-limit <secs> [--calibrate-ms <ms>]
//! ```
//!
//! Exit status 0 with text is a transcript, 0 with no text means the audio
//! was unintelligible, 2 means no speech began before the start timeout.
//! Anything else is a service failure.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use viva_core::error::RecognitionError;
use viva_core::traits::{ListenLimits, SpeechRecognizer};

use crate::process::{self, CommandSpec, ProcessError};

/// Exit status the transcriber uses for "no speech before timeout".
pub const EXIT_NO_SPEECH: i32 = 2;

const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Recognizer that shells out once per listen.
pub struct CommandRecognizer {
    spec: CommandSpec,
    /// Extra wall-clock time beyond the listen limits before the
    /// transcriber is considered hung.
    grace: Duration,
    calibration: Option<Duration>,
}

impl CommandRecognizer {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            grace: DEFAULT_GRACE,
            calibration: None,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    /// Calibration happens inside the transcriber; the duration is passed
    /// along with the next listen.
    async fn calibrate(&mut self, duration: Duration) -> anyhow::Result<()> {
        self.calibration = Some(duration);
        Ok(())
    }

    async fn listen(&mut self, limits: ListenLimits) -> Result<String, RecognitionError> {
        let mut cmd = self.spec.command();
        cmd.arg("--start-timeout")
            .arg(limits.start_timeout.as_secs().to_string())
            .arg("--phrase-limit")
            .arg(limits.phrase_limit.as_secs().to_string());
        if let Some(calibration) = self.calibration.take() {
            cmd.arg("--calibrate-ms")
                .arg(calibration.as_millis().to_string());
        }

        let wall_clock = limits.start_timeout + limits.phrase_limit + self.grace;
        let output = process::run(&self.spec, cmd, None, wall_clock)
            .await
            .map_err(|e: ProcessError| RecognitionError::Service(e.to_string()))?;

        match output.status.code() {
            Some(0) => {
                let transcript = output.stdout.trim();
                if transcript.is_empty() {
                    Err(RecognitionError::Unintelligible)
                } else {
                    debug!("transcript: {transcript}");
                    Ok(transcript.to_string())
                }
            }
            Some(EXIT_NO_SPEECH) => Err(RecognitionError::Timeout),
            _ => Err(RecognitionError::Service(format!(
                "'{}' exited with {}: {}",
                self.spec.program,
                output.status,
                output.stderr_tail()
            ))),
        }
    }
}
