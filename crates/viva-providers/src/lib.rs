//! viva-providers — Completion provider integrations.
//!
//! Implements the `CompletionProvider` trait for OpenAI and Anthropic and
//! loads the `viva.toml` configuration that selects between them.

pub mod anthropic;
pub mod config;
pub mod error;
pub mod mock;
pub mod openai;

pub use config::{create_provider, load_config_from, ProviderConfig, VivaConfig};
pub use error::{ConfigError, ProviderError};
