//! In-memory service fakes shared by the unit tests.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::capture::AnswerChannel;
use crate::model::{Answer, Modality, Question};
use crate::traits::{
    CompletionProvider, CompletionRequest, CompletionResponse, ModelInfo, SpeechEngine,
    TokenUsage, VoiceInfo, VoiceSettings,
};

/// Provider that replays queued replies, then a default one.
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<String, String>>>,
    default: Result<String, String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn with_fixed_response(response: &str) -> Self {
        Self::build(Ok(response.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::build(Err(message.to_string()))
    }

    fn build(default: Result<String, String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn then(self, reply: Result<&str, &str>) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push_back(reply.map(str::to_string).map_err(str::to_string));
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<CompletionResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let reply = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match reply {
            Ok(content) => Ok(CompletionResponse {
                content,
                model: request.model.clone(),
                token_usage: TokenUsage::default(),
                latency_ms: 1,
            }),
            Err(message) => Err(anyhow::anyhow!(message)),
        }
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        Vec::new()
    }
}

/// Counters observed by tests after the engine has been moved into a `SpeechOutput`.
#[derive(Debug, Default)]
pub struct EngineCalls {
    pub initialize: AtomicU32,
    pub speak: AtomicU32,
    pub stop: AtomicU32,
    pub release: AtomicU32,
}

impl EngineCalls {
    pub fn total(&self) -> u32 {
        self.initialize.load(Ordering::Relaxed)
            + self.speak.load(Ordering::Relaxed)
            + self.stop.load(Ordering::Relaxed)
            + self.release.load(Ordering::Relaxed)
    }
}

/// Speech engine whose behaviour is fixed at construction.
pub struct FakeEngine {
    pub calls: Arc<EngineCalls>,
    pub voices: Vec<VoiceInfo>,
    pub fail_speak: bool,
    pub fail_release: bool,
    /// Fail only the first N speak calls.
    pub speak_failures_left: u32,
    pub spoken: Arc<Mutex<Vec<String>>>,
}

impl FakeEngine {
    pub fn working() -> Self {
        Self {
            calls: Arc::new(EngineCalls::default()),
            voices: vec![VoiceInfo {
                id: "en".into(),
                name: "English".into(),
            }],
            fail_speak: false,
            fail_release: false,
            speak_failures_left: 0,
            spoken: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn broken() -> Self {
        Self {
            fail_speak: true,
            ..Self::working()
        }
    }

    pub fn voiceless() -> Self {
        Self {
            voices: Vec::new(),
            ..Self::working()
        }
    }
}

#[async_trait]
impl SpeechEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn initialize(&mut self) -> anyhow::Result<Vec<VoiceInfo>> {
        self.calls.initialize.fetch_add(1, Ordering::Relaxed);
        Ok(self.voices.clone())
    }

    async fn configure(&mut self, _settings: &VoiceSettings) -> anyhow::Result<()> {
        Ok(())
    }

    async fn speak(&mut self, text: &str) -> anyhow::Result<()> {
        self.calls.speak.fetch_add(1, Ordering::Relaxed);
        if self.speak_failures_left > 0 {
            self.speak_failures_left -= 1;
            anyhow::bail!("audio device busy");
        }
        if self.fail_speak {
            anyhow::bail!("audio device unavailable");
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.calls.stop.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn release(&mut self) -> anyhow::Result<()> {
        self.calls.release.fetch_add(1, Ordering::Relaxed);
        if self.fail_release {
            anyhow::bail!("driver crashed on shutdown");
        }
        Ok(())
    }
}

/// Console sink that tests can read back.
#[derive(Clone, Default)]
pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Answer channel that replays a fixed list of answers.
pub struct ScriptedChannel {
    pub answers: VecDeque<Answer>,
    pub modality: Modality,
}

impl ScriptedChannel {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: answers.into(),
            modality: Modality::Text,
        }
    }
}

#[async_trait]
impl AnswerChannel for ScriptedChannel {
    fn modality(&self) -> Modality {
        self.modality
    }

    async fn capture(&mut self, _question: &Question) -> Answer {
        self.answers
            .pop_front()
            .unwrap_or_else(|| Answer::absent(self.modality, crate::model::MissReason::NoInput))
    }
}
