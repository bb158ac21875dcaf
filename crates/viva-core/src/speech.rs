//! Resilient voice output.
//!
//! [`SpeechOutput`] owns a [`SpeechEngine`] and tracks it through an explicit
//! state machine:
//!
//! ```text
//! Uninitialized --init ok--> Ready --all retries fail--> Degraded
//!       |                      ^  \
//!       +----init fails--------|---+--> Degraded (sticky)
//!                              +-- reinitialize (only inside a speak retry)
//! ```
//!
//! Every `speak` echoes its text to the console before touching audio, so
//! the console remains the channel of last resort once audio is gone.

use std::io::Write;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::VoiceError;
use crate::traits::{SpeechEngine, VoiceSettings};

/// Lifecycle of the voice resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Uninitialized,
    Ready,
    /// Audio is off for the rest of the session.
    Degraded,
}

/// What to do between failed playback attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Release and fully reinitialize the engine.
    Reinitialize,
    /// Try again without touching the engine.
    None,
}

/// Bounded retry policy for playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub recovery: Recovery,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            recovery: Recovery::Reinitialize,
        }
    }
}

impl RetryPolicy {
    /// Recovery action to run before attempt number `attempt` (1-based).
    pub fn recovery_before(&self, attempt: u32) -> Recovery {
        if attempt <= 1 {
            Recovery::None
        } else {
            self.recovery
        }
    }
}

/// Configuration for [`SpeechOutput`].
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub settings: VoiceSettings,
    pub retry: RetryPolicy,
    /// Pause after each successful utterance.
    pub settle_delay: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            settings: VoiceSettings::default(),
            retry: RetryPolicy::default(),
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// Voice output with console echo, bounded retries and sticky degradation.
pub struct SpeechOutput {
    engine: Box<dyn SpeechEngine>,
    console: Box<dyn Write + Send>,
    config: SpeechConfig,
    state: VoiceState,
    /// Set once the engine has been initialized and not yet released.
    acquired: bool,
}

impl SpeechOutput {
    pub fn new(engine: Box<dyn SpeechEngine>, config: SpeechConfig) -> Self {
        Self {
            engine,
            console: Box::new(std::io::stdout()),
            config,
            state: VoiceState::Uninitialized,
            acquired: false,
        }
    }

    /// Redirect the console echo (stdout by default).
    pub fn with_console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = console;
        self
    }

    /// Start text-only: the engine is never touched and `speak` only echoes.
    pub fn muted(mut self) -> Self {
        self.state = VoiceState::Degraded;
        self
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.state == VoiceState::Ready
    }

    /// Bring the engine up. Failure degrades to text-only and is not an error
    /// for the caller.
    pub async fn init(&mut self) -> VoiceState {
        if self.state == VoiceState::Degraded {
            return self.state;
        }
        match self.acquire().await {
            Ok(()) => {
                info!("voice output ready ({})", self.engine.name());
                self.state = VoiceState::Ready;
            }
            Err(e) => {
                warn!("voice output unavailable, continuing in text-only mode: {e}");
                self.state = VoiceState::Degraded;
            }
        }
        self.state
    }

    async fn acquire(&mut self) -> Result<(), VoiceError> {
        let voices = self
            .engine
            .initialize()
            .await
            .map_err(|e| VoiceError::Engine(format!("{e:#}")))?;
        self.acquired = true;
        if voices.is_empty() {
            return Err(VoiceError::NoVoices);
        }
        debug!("{} voices available", voices.len());
        self.engine
            .configure(&self.config.settings)
            .await
            .map_err(|e| VoiceError::Engine(format!("{e:#}")))
    }

    async fn reinitialize(&mut self) -> Result<(), VoiceError> {
        if let Err(e) = self.engine.release().await {
            debug!("release before reinitialize failed: {e:#}");
        }
        self.acquired = false;
        self.acquire().await
    }

    /// Echo `text` to the console, then play it if audio is available.
    pub async fn speak(&mut self, text: &str) {
        let _ = writeln!(self.console, "🔊 {text}");
        let _ = self.console.flush();
        info!(target: "viva::speech", "{text}");

        if self.state != VoiceState::Ready {
            return;
        }

        for attempt in 1..=self.config.retry.max_attempts {
            if self.config.retry.recovery_before(attempt) == Recovery::Reinitialize {
                if let Err(e) = self.reinitialize().await {
                    warn!("voice reinitialize before attempt {attempt} failed: {e}");
                    continue;
                }
            }

            match self.play(text).await {
                Ok(()) => {
                    tokio::time::sleep(self.config.settle_delay).await;
                    return;
                }
                Err(e) => warn!("speech attempt {attempt} failed: {e}"),
            }
        }

        warn!(
            "voice output failed {} times, switching to text-only for this session",
            self.config.retry.max_attempts
        );
        self.state = VoiceState::Degraded;
    }

    async fn play(&mut self, text: &str) -> Result<(), VoiceError> {
        self.engine
            .stop()
            .await
            .map_err(|e| VoiceError::Engine(format!("{e:#}")))?;
        self.engine
            .speak(text)
            .await
            .map_err(|e| VoiceError::Engine(format!("{e:#}")))
    }

    /// Release the engine. Failures are logged and swallowed.
    pub async fn release(&mut self) {
        if self.acquired {
            if let Err(e) = self.engine.release().await {
                debug!("voice release failed (ignored): {e:#}");
            }
            self.acquired = false;
        }
        if self.state != VoiceState::Degraded {
            self.state = VoiceState::Uninitialized;
        }
    }
}
