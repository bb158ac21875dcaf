//! viva-voice — Speech drivers backed by external commands.
//!
//! [`tts::CommandSpeechEngine`] speaks through an espeak-ng compatible
//! synthesizer and [`stt::CommandRecognizer`] listens through a transcriber
//! program. Both run one child process per call with a bounded wait and a
//! scrubbed environment.

pub mod process;
pub mod stt;
pub mod tts;

pub use process::CommandSpec;
pub use stt::CommandRecognizer;
pub use tts::CommandSpeechEngine;
