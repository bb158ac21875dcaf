//! Trait definitions for the external services the engine consumes.
//!
//! Completion providers live in `viva-providers`; speech engines and
//! recognizers in `viva-voice`. Tests substitute in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RecognitionError;

// ---------------------------------------------------------------------------
// Completion provider trait
// ---------------------------------------------------------------------------

/// Trait for language-model backends that turn a prompt into free text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Human-readable provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Run a single completion.
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<CompletionResponse>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Request for a single completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (e.g. "gpt-3.5-turbo").
    pub model: String,
    /// System instructions.
    pub system_prompt: String,
    /// User content.
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Free-text response from a completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The raw response content.
    pub content: String,
    /// Model that actually produced the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub estimated_cost_usd: f64,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
    /// Cost per 1K input tokens in USD.
    pub cost_per_1k_input: f64,
    /// Cost per 1K output tokens in USD.
    pub cost_per_1k_output: f64,
}

// ---------------------------------------------------------------------------
// Speech output
// ---------------------------------------------------------------------------

/// A voice exposed by a speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
}

/// Playback settings applied after initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Speaking rate in words per minute.
    pub rate: u32,
    /// Volume in `0.0..=1.0`.
    pub volume: f32,
    /// Preferred voice, matched against id or name. `None` keeps the first voice.
    #[serde(default)]
    pub voice: Option<String>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 150,
            volume: 0.9,
            voice: None,
        }
    }
}

/// A text-to-speech backend. Playback is awaited to completion.
#[async_trait]
pub trait SpeechEngine: Send {
    fn name(&self) -> &str;

    /// Acquire the engine and report the voices it offers.
    async fn initialize(&mut self) -> anyhow::Result<Vec<VoiceInfo>>;

    /// Apply rate, volume and voice selection.
    async fn configure(&mut self, settings: &VoiceSettings) -> anyhow::Result<()>;

    /// Speak `text`, returning once playback has finished.
    async fn speak(&mut self, text: &str) -> anyhow::Result<()>;

    /// Stop any pending utterance.
    async fn stop(&mut self) -> anyhow::Result<()>;

    /// Release the engine.
    async fn release(&mut self) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Speech recognition
// ---------------------------------------------------------------------------

/// Bounds for a single listen call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenLimits {
    /// How long to wait for speech to begin.
    pub start_timeout: Duration,
    /// Maximum length of the utterance once it has begun.
    pub phrase_limit: Duration,
}

impl Default for ListenLimits {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(15),
            phrase_limit: Duration::from_secs(20),
        }
    }
}

/// A speech-to-text backend.
#[async_trait]
pub trait SpeechRecognizer: Send {
    /// Sample ambient noise to set the energy threshold.
    async fn calibrate(&mut self, duration: Duration) -> anyhow::Result<()>;

    /// Capture one utterance and return its transcript.
    async fn listen(&mut self, limits: ListenLimits) -> Result<String, RecognitionError>;
}
