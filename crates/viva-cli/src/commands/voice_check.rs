//! The `viva voice-check` command: a text-to-speech self-test.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use viva_core::traits::{SpeechEngine, VoiceInfo};
use viva_providers::config::load_config_from;
use viva_voice::{CommandSpec, CommandSpeechEngine};

/// Outcome of one check step.
struct Step {
    name: &'static str,
    result: Result<()>,
}

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let settings = config.voice.speech_config().settings;
    let mut engine = CommandSpeechEngine::new(CommandSpec::new(
        &config.voice.command,
        config.voice.args.clone(),
    ));

    println!("Checking speech output via '{}'", config.voice.command);
    let mut steps = Vec::new();

    steps.push(Step {
        name: "basic utterance",
        result: basic_utterance(&mut engine).await,
    });

    steps.push(Step {
        name: "repeated utterances",
        result: async {
            engine.configure(&settings).await?;
            engine.speak("Test two").await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
            engine.speak("Test three").await
        }
        .await,
    });

    let voices = engine.initialize().await;
    if let Ok(voices) = &voices {
        print_voices(voices);
    }
    steps.push(Step {
        name: "available voices",
        result: voices.map(|_| ()),
    });

    if let Err(e) = engine.release().await {
        tracing::debug!("release after voice check failed: {e:#}");
    }

    let mut failed = 0;
    for step in &steps {
        match &step.result {
            Ok(()) => println!("PASS  {}", step.name),
            Err(e) => {
                failed += 1;
                println!("FAIL  {}: {e:#}", step.name);
            }
        }
    }

    anyhow::ensure!(
        failed == 0,
        "{failed} of {} voice checks failed; sessions will continue in text-only mode",
        steps.len()
    );
    Ok(())
}

async fn basic_utterance(engine: &mut CommandSpeechEngine) -> Result<()> {
    engine.initialize().await?;
    engine.speak("Test one").await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    Ok(())
}

fn print_voices(voices: &[VoiceInfo]) {
    println!("Found {} voices:", voices.len());
    for (i, voice) in voices.iter().enumerate() {
        println!("  {i}: {} ({})", voice.name, voice.id);
    }
}
