//! Configuration loading and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use viva_core::aggregate::GradeTable;
use viva_core::capture::AudioCaptureConfig;
use viva_core::evaluator::{EvaluatorConfig, ScoringPolicy};
use viva_core::generator::GeneratorConfig;
use viva_core::speech::{Recovery, RetryPolicy, SpeechConfig};
use viva_core::traits::{CompletionProvider, ListenLimits, VoiceSettings};

use crate::anthropic::AnthropicProvider;
use crate::error::ConfigError;
use crate::openai::OpenAiProvider;

/// Local config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "viva.toml";

/// Configuration for a single completion provider.
///
/// `Debug` masks API keys.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                base_url, org_id, ..
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic { base_url, .. } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

impl ProviderConfig {
    fn api_key(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { api_key, .. } | ProviderConfig::Anthropic { api_key, .. } => {
                api_key
            }
        }
    }
}

/// `[voice]`: text-to-speech output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// espeak-ng compatible synthesizer binary.
    pub command: String,
    /// Arguments placed before the synthesizer flags.
    pub args: Vec<String>,
    /// Words per minute.
    pub rate: u32,
    /// `0.0..=1.0`.
    pub volume: f32,
    pub voice: Option<String>,
    /// Pause after each utterance, in milliseconds.
    pub settle_ms: u64,
    /// Playback attempts before audio is switched off for the session.
    pub max_attempts: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            command: "espeak-ng".to_string(),
            args: Vec::new(),
            rate: 150,
            volume: 0.9,
            voice: None,
            settle_ms: 500,
            max_attempts: 2,
        }
    }
}

impl VoiceConfig {
    pub fn speech_config(&self) -> SpeechConfig {
        SpeechConfig {
            settings: VoiceSettings {
                rate: self.rate,
                volume: self.volume.clamp(0.0, 1.0),
                voice: self.voice.clone(),
            },
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                recovery: Recovery::Reinitialize,
            },
            settle_delay: Duration::from_millis(self.settle_ms),
        }
    }
}

/// `[listen]`: spoken answer capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Transcriber program. Voice answers are unavailable when unset.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub start_timeout_secs: u64,
    pub phrase_limit_secs: u64,
    pub calibration_ms: u64,
    /// Capture attempts per question for silent or unclear answers.
    pub attempts: u32,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            start_timeout_secs: 15,
            phrase_limit_secs: 20,
            calibration_ms: 500,
            attempts: 3,
        }
    }
}

impl ListenConfig {
    pub fn limits(&self) -> ListenLimits {
        ListenLimits {
            start_timeout: Duration::from_secs(self.start_timeout_secs),
            phrase_limit: Duration::from_secs(self.phrase_limit_secs),
        }
    }

    pub fn capture_config(&self) -> AudioCaptureConfig {
        AudioCaptureConfig {
            calibration: Duration::from_millis(self.calibration_ms),
            limits: self.limits(),
        }
    }
}

/// `[scoring]`: how judge replies are read and totals are graded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub score_tag: String,
    pub feedback_tag: String,
    pub affirmative: Vec<String>,
    pub partial: Vec<String>,
    /// `[[scoring.grades]]` tiers; at least one is required when given.
    pub grades: GradeTable,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let policy = ScoringPolicy::default();
        let keywords = |i: usize| {
            policy
                .rules
                .get(i)
                .map(|rule| rule.any_of.clone())
                .unwrap_or_default()
        };
        Self {
            affirmative: keywords(0),
            partial: keywords(1),
            score_tag: policy.score_tag,
            feedback_tag: policy.feedback_tag,
            grades: GradeTable::default(),
        }
    }
}

impl ScoringConfig {
    pub fn policy(&self) -> ScoringPolicy {
        let lower =
            |words: &[String]| -> Vec<String> { words.iter().map(|w| w.to_lowercase()).collect() };
        ScoringPolicy {
            score_tag: self.score_tag.clone(),
            feedback_tag: self.feedback_tag.clone(),
            ..ScoringPolicy::with_keywords(lower(&self.affirmative), lower(&self.partial))
        }
    }
}

/// Top-level viva configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VivaConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Sampling temperature for question generation. Judging always uses 0.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Characters of source content sent to the generator.
    #[serde(default = "default_content_char_limit")]
    pub content_char_limit: usize,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_tokens() -> u32 {
    512
}
fn default_content_char_limit() -> usize {
    1500
}

impl Default for VivaConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            content_char_limit: default_content_char_limit(),
            voice: VoiceConfig::default(),
            listen: ListenConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl VivaConfig {
    pub fn generator_config(&self, model: &str) -> GeneratorConfig {
        GeneratorConfig {
            model: model.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            content_char_limit: self.content_char_limit,
        }
    }

    pub fn evaluator_config(&self, model: &str) -> EvaluatorConfig {
        EvaluatorConfig {
            model: model.to_string(),
            policy: self.scoring.policy(),
            ..EvaluatorConfig::default()
        }
    }

    /// Build the named provider from its configuration entry.
    pub fn provider(&self, name: &str) -> Result<Arc<dyn CompletionProvider>> {
        let config = self
            .providers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProvider(name.to_string()))?;
        create_provider(name, config)
    }
}

/// Resolve `${VAR_NAME}` references from the environment. Unset variables
/// resolve to the empty string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    let resolve_opt = |v: &Option<String>| v.as_deref().map(resolve_env_vars);
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
            org_id: resolve_opt(org_id),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
        },
    }
}

/// Apply `VIVA_OPENAI_KEY` / `VIVA_ANTHROPIC_KEY` style overrides, creating
/// the provider entry when it does not exist yet.
fn apply_key_overrides(config: &mut VivaConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup("VIVA_OPENAI_KEY") {
        let entry = config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let ProviderConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Some(key) = lookup("VIVA_ANTHROPIC_KEY") {
        let entry = config
            .providers
            .entry("anthropic".into())
            .or_insert(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without a path:
/// 1. `viva.toml` in the current directory
/// 2. `~/.config/viva/config.toml`
///
/// Falls back to defaults when neither exists.
pub fn load_config_from(path: Option<&Path>) -> Result<VivaConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() {
                Some(local)
            } else {
                global_config_path().filter(|p| p.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<VivaConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => VivaConfig::default(),
    };

    apply_key_overrides(&mut config, |name| std::env::var(name).ok());
    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    Ok(config)
}

fn global_config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("viva").join("config.toml"))
}

/// Create a provider instance from its configuration.
pub fn create_provider(name: &str, config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>> {
    if config.api_key().trim().is_empty() {
        return Err(ConfigError::MissingApiKey(name.to_string()).into());
    }
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Ok(Arc::new(OpenAiProvider::new(
            api_key,
            base_url.clone(),
            org_id.clone(),
        )?)),
        ProviderConfig::Anthropic { api_key, base_url } => {
            Ok(Arc::new(AnthropicProvider::new(api_key, base_url.clone())?))
        }
    }
}
