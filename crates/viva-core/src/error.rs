//! Error types shared across the engine and its drivers.
//!
//! Only the session-fatal kinds surface from [`crate::engine::VivaSession::run`].
//! Capture, evaluation and voice failures are absorbed locally by the
//! component that hits them.

use thiserror::Error;

/// Errors that can occur when interacting with a completion provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Fatal session errors. No grade is produced when one of these is returned.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The source content could not be read or was empty.
    #[error("content error: {0}")]
    Content(String),

    /// Question generation failed or produced no questions.
    #[error("question generation failed: {0}")]
    Generation(String),

    /// The session was interrupted before it finished.
    #[error("session interrupted")]
    Interrupted,

    /// `run` was called on a session that already ran.
    #[error("session already ran (state {0})")]
    AlreadyFinished(String),
}

/// Failure reported by a speech recognition service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// No speech started before the start timeout elapsed.
    #[error("no speech detected before timeout")]
    Timeout,

    /// Speech was captured but could not be transcribed.
    #[error("speech was unintelligible")]
    Unintelligible,

    /// The recognition backend itself failed.
    #[error("recognition service error: {0}")]
    Service(String),
}

/// Failure of the voice output resource.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// The engine initialized but exposes no voices.
    #[error("speech engine reported no available voices")]
    NoVoices,

    /// The engine failed to initialize, configure, or play.
    #[error("speech engine error: {0}")]
    Engine(String),
}
