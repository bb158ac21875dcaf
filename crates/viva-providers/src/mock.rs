//! Mock provider for testing sessions without real API calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use viva_core::traits::{
    CompletionProvider, CompletionRequest, CompletionResponse, ModelInfo, TokenUsage,
};

/// A scripted completion provider.
///
/// Queued replies are served first, in order; once the queue is empty every
/// call gets the fallback reply. A queued `Err` makes that call fail.
pub struct MockProvider {
    queue: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockProvider {
    /// A mock that always returns `response`.
    pub fn with_fixed_response(response: &str) -> Self {
        Self::with_fallback(Ok(response.to_string()))
    }

    /// A mock whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self::with_fallback(Err(message.to_string()))
    }

    /// A mock that serves `responses` in order, then repeats the last one.
    pub fn queued<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue: VecDeque<Result<String, String>> =
            responses.into_iter().map(|s| Ok(s.into())).collect();
        let fallback = queue.pop_back().unwrap_or_else(|| Ok(String::new()));
        let mock = Self::with_fallback(fallback);
        *mock.queue.lock().unwrap_or_else(|e| e.into_inner()) = queue;
        mock
    }

    fn with_fallback(fallback: Result<String, String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Queue one more reply ahead of the fallback.
    pub fn then(self, reply: Result<&str, &str>) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply.map(str::to_string).map_err(str::to_string));
        self
    }

    /// Number of calls made to this provider.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The last request made to this provider.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<CompletionResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        let reply = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        let content = reply.map_err(|message| anyhow::anyhow!(message))?;

        // Rough estimate: four characters per token.
        let prompt_tokens = (request.prompt.len() / 4) as u32;
        let completion_tokens = (content.len() / 4) as u32;

        Ok(CompletionResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
                estimated_cost_usd: 0.0,
            },
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
            cost_per_1k_input: 0.0,
            cost_per_1k_output: 0.0,
        }]
    }
}
