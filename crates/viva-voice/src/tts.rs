//! Text-to-speech through an espeak-ng compatible command.
//!
//! The synthesizer is expected to understand:
//!
//! * `--voices` to print its voice table (one header line, then
//!   `<priority> <language> <age/gender> <name> ...` rows),
//! * `-s <wpm> -a <amplitude> [-v <voice>] --stdin` to speak text read from
//!   standard input, exiting once playback has finished.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tracing::{debug, warn};

use viva_core::traits::{SpeechEngine, VoiceInfo, VoiceSettings};

use crate::process::{self, CommandSpec};

const VOICE_LIST_TIMEOUT: Duration = Duration::from_secs(10);
/// Playback bound: a fixed allowance plus time per character.
const SPEAK_BASE_TIMEOUT: Duration = Duration::from_secs(10);
const SPEAK_PER_CHAR: Duration = Duration::from_millis(150);

/// Parse the voice table printed by `--voices`.
pub fn parse_voice_list(output: &str) -> Vec<VoiceInfo> {
    output
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            match cols.as_slice() {
                [_, language, _, name, ..] => Some(VoiceInfo {
                    id: language.to_string(),
                    name: name.replace('_', " "),
                }),
                _ => None,
            }
        })
        .collect()
}

/// Speech engine driving an external synthesizer process per utterance.
pub struct CommandSpeechEngine {
    spec: CommandSpec,
    voices: Vec<VoiceInfo>,
    settings: VoiceSettings,
    /// Resolved voice id passed with `-v`.
    voice: Option<String>,
    initialized: bool,
    /// The utterance currently playing, if its `speak` call was cancelled
    /// before the child exited.
    current: Option<Child>,
}

impl CommandSpeechEngine {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            voices: Vec::new(),
            settings: VoiceSettings::default(),
            voice: None,
            initialized: false,
            current: None,
        }
    }

    pub fn voices(&self) -> &[VoiceInfo] {
        &self.voices
    }

    /// espeak amplitude is 0..=200 with 100 as normal volume.
    fn amplitude(&self) -> u32 {
        (self.settings.volume.clamp(0.0, 1.0) * 100.0).round() as u32
    }

    fn resolve_voice(&self, wanted: &str) -> Option<String> {
        self.voices
            .iter()
            .find(|v| v.id.eq_ignore_ascii_case(wanted) || v.name.eq_ignore_ascii_case(wanted))
            .map(|v| v.id.clone())
    }

    async fn kill_current(&mut self) -> Result<()> {
        if let Some(mut child) = self.current.take() {
            debug!("stopping pending utterance");
            child.start_kill().ok();
            child.wait().await.context("failed to reap synthesizer")?;
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    fn name(&self) -> &str {
        &self.spec.program
    }

    async fn initialize(&mut self) -> Result<Vec<VoiceInfo>> {
        let mut cmd = self.spec.command();
        cmd.arg("--voices");
        let output = process::run(&self.spec, cmd, None, VOICE_LIST_TIMEOUT).await?;
        if !output.status.success() {
            bail!(
                "'{} --voices' failed ({}): {}",
                self.spec.program,
                output.status,
                output.stderr_tail()
            );
        }

        self.voices = parse_voice_list(&output.stdout);
        self.initialized = true;
        debug!("{} lists {} voices", self.spec.program, self.voices.len());
        Ok(self.voices.clone())
    }

    async fn configure(&mut self, settings: &VoiceSettings) -> Result<()> {
        self.settings = settings.clone();
        self.voice = match &settings.voice {
            Some(wanted) => {
                let resolved = self.resolve_voice(wanted);
                if resolved.is_none() {
                    warn!("voice '{wanted}' not found, using the default voice");
                }
                resolved
            }
            None => None,
        };
        Ok(())
    }

    async fn speak(&mut self, text: &str) -> Result<()> {
        if !self.initialized {
            bail!("speech engine is not initialized");
        }

        let mut cmd = self.spec.command();
        cmd.arg("-s")
            .arg(self.settings.rate.to_string())
            .arg("-a")
            .arg(self.amplitude().to_string());
        if let Some(voice) = &self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to start '{}'", self.spec.program))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        let child = self.current.insert(child);

        let limit = SPEAK_BASE_TIMEOUT + SPEAK_PER_CHAR * text.chars().count() as u32;
        let status = match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status.context("failed to wait for synthesizer")?,
            Err(_) => {
                self.kill_current().await?;
                bail!("'{}' did not finish within {}s", self.spec.program, limit.as_secs());
            }
        };
        self.current = None;

        if !status.success() {
            bail!("'{}' exited with {status}", self.spec.program);
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.kill_current().await
    }

    async fn release(&mut self) -> Result<()> {
        self.initialized = false;
        self.kill_current().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESPEAK_VOICES: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-gb           --/M      English_(Great_Britain) gmw/en            (en 2)
 2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
";

    #[test]
    fn parses_espeak_voice_table() {
        let voices = parse_voice_list(ESPEAK_VOICES);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[2].id, "en-us");
        assert_eq!(voices[2].name, "English (America)");
        assert!(parse_voice_list("").is_empty());
    }

    #[cfg(unix)]
    mod process_backed {
        use super::*;

        /// A stand-in synthesizer: lists voices and appends spoken text to `log`.
        fn fake_synth(dir: &std::path::Path, exit_code: i32) -> (CommandSpec, std::path::PathBuf) {
            let log = dir.join("spoken.log");
            let script = format!(
                "if [ \"$1\" = \"--voices\" ]; then printf '%s' '{ESPEAK_VOICES}'; exit 0; fi\n\
                 echo \"$@\" >> '{log}.args'\n\
                 cat >> '{log}'; echo >> '{log}'\n\
                 exit {exit_code}\n",
                log = log.display()
            );
            let spec = CommandSpec::new("sh", vec!["-c".into(), script, "fake-espeak".into()]);
            (spec, log)
        }

        #[tokio::test]
        async fn speaks_through_child_process() {
            let dir = tempfile::tempdir().unwrap();
            let (spec, log) = fake_synth(dir.path(), 0);
            let mut engine = CommandSpeechEngine::new(spec);

            let voices = engine.initialize().await.unwrap();
            assert_eq!(voices.len(), 3);
            engine
                .configure(&VoiceSettings {
                    rate: 170,
                    volume: 0.9,
                    voice: Some("English (America)".into()),
                })
                .await
                .unwrap();

            engine.stop().await.unwrap();
            engine.speak("Question 1. What is X?").await.unwrap();

            let spoken = std::fs::read_to_string(&log).unwrap();
            assert_eq!(spoken.trim(), "Question 1. What is X?");
            let args = std::fs::read_to_string(format!("{}.args", log.display())).unwrap();
            assert_eq!(args.trim(), "-s 170 -a 90 -v en-us --stdin");
        }

        #[tokio::test]
        async fn unknown_voice_falls_back_to_default() {
            let dir = tempfile::tempdir().unwrap();
            let (spec, log) = fake_synth(dir.path(), 0);
            let mut engine = CommandSpeechEngine::new(spec);
            engine.initialize().await.unwrap();
            engine
                .configure(&VoiceSettings {
                    voice: Some("klingon".into()),
                    ..VoiceSettings::default()
                })
                .await
                .unwrap();

            engine.speak("hi").await.unwrap();
            let args = std::fs::read_to_string(format!("{}.args", log.display())).unwrap();
            assert_eq!(args.trim(), "-s 150 -a 90 --stdin");
        }

        #[tokio::test]
        async fn failing_synthesizer_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            let (spec, _) = fake_synth(dir.path(), 1);
            let mut engine = CommandSpeechEngine::new(spec);
            engine.initialize().await.unwrap();
            assert!(engine.speak("hello").await.is_err());
        }

        #[tokio::test]
        async fn missing_synthesizer_fails_initialize() {
            let mut engine =
                CommandSpeechEngine::new(CommandSpec::new("viva-no-such-synth", vec![]));
            assert!(engine.initialize().await.is_err());
        }

        #[tokio::test]
        async fn speak_before_initialize_fails_and_release_is_idempotent() {
            let dir = tempfile::tempdir().unwrap();
            let (spec, _) = fake_synth(dir.path(), 0);
            let mut engine = CommandSpeechEngine::new(spec);
            assert!(engine.speak("x").await.is_err());
            engine.release().await.unwrap();
            engine.release().await.unwrap();
        }
    }
}
