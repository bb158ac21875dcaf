//! The `viva init` command.

use std::path::Path;

use anyhow::{Context, Result};

use viva_providers::config::CONFIG_FILE_NAME;

pub fn execute() -> Result<()> {
    if Path::new(CONFIG_FILE_NAME).exists() {
        println!("{CONFIG_FILE_NAME} already exists, skipping.");
    } else {
        std::fs::write(CONFIG_FILE_NAME, SAMPLE_CONFIG)
            .with_context(|| format!("failed to write {CONFIG_FILE_NAME}"))?;
        println!("Created {CONFIG_FILE_NAME}");
    }

    println!("\nNext steps:");
    println!("  1. Set OPENAI_API_KEY (or edit {CONFIG_FILE_NAME})");
    println!("  2. Check speech output: viva voice-check");
    println!("  3. Run: viva run --source notes.txt --count 3 --mode text");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# viva configuration

default_provider = "openai"
default_model = "gpt-3.5-turbo"
temperature = 0.2
max_tokens = 512
content_char_limit = 1500

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[voice]
command = "espeak-ng"
rate = 150
volume = 0.9
settle_ms = 500
max_attempts = 2

[listen]
# Transcriber that prints one recognised utterance on stdout.
# Without it, voice mode falls back to typed answers.
# command = "viva-listen"
start_timeout_secs = 15
phrase_limit_secs = 20
calibration_ms = 500
attempts = 3

[scoring]
score_tag = "SCORE:"
feedback_tag = "FEEDBACK:"
"#;
