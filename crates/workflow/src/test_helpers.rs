//! Shared mock collaborators for node and orchestrator tests.

use async_trait::async_trait;
use rose_core::error::ProviderError;
use rose_core::provider::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crate::nodes::NodeContext;
use crate::settings::WorkflowSettings;
use crate::speech::SpeechService;

/// Which template a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Router,
    MemoryAnalysis,
    Scenario,
    Summary,
    Reply,
}

pub fn classify(request: &CompletionRequest) -> PromptKind {
    let text: String = request
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    if text.contains("You decide how") {
        PromptKind::Router
    } else if text.contains("Extract and format important personal facts") {
        PromptKind::MemoryAnalysis
    } else if text.contains("first-person narrative") {
        PromptKind::Scenario
    } else if text.contains("Summarize the conversation") || text.contains("Extend it with the new messages") {
        PromptKind::Summary
    } else {
        PromptKind::Reply
    }
}

/// An LLM that answers each prompt kind with a scripted reply.
pub struct MockLlm {
    route: String,
    reply: String,
    memory_reply: String,
    scenario: String,
    summary: String,
    failing: HashSet<PromptKind>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(PromptKind, CompletionRequest)>>,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self {
            route: r#"{"response_type": "conversation"}"#.into(),
            reply: "I'm right here with you.".into(),
            memory_reply: r#"{"is_important": false, "formatted_memory": null}"#.into(),
            scenario: r#"{"narrative": "Look at the greenhouse this morning!", "image_prompt": "sunlit greenhouse full of seedlings"}"#.into(),
            summary: "They talked about their week.".into(),
            failing: HashSet::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routing(mut self, raw: &str) -> Self {
        self.route = raw.into();
        self
    }

    pub fn replying(mut self, reply: &str) -> Self {
        self.reply = reply.into();
        self
    }

    pub fn remembering(mut self, memory: &str) -> Self {
        self.memory_reply = format!(r#"{{"is_important": true, "formatted_memory": "{memory}"}}"#);
        self
    }

    pub fn with_scenario(mut self, raw: &str) -> Self {
        self.scenario = raw.into();
        self
    }

    pub fn summarizing(mut self, summary: &str) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn failing_on(mut self, kind: PromptKind) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Every completion takes `delay` before answering.
    pub fn delaying(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls_of(&self, kind: PromptKind) -> usize {
        self.calls.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn last_request(&self, kind: PromptKind) -> Option<CompletionRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, r)| r.clone())
    }
}

#[async_trait]
impl TextGenerator for MockLlm {
    fn name(&self) -> &str {
        "mock_llm"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let kind = classify(&request);
        self.calls.lock().unwrap().push((kind, request));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&kind) {
            return Err(ProviderError::Network("mock outage".into()));
        }
        Ok(match kind {
            PromptKind::Router => self.route.clone(),
            PromptKind::MemoryAnalysis => self.memory_reply.clone(),
            PromptKind::Scenario => self.scenario.clone(),
            PromptKind::Summary => self.summary.clone(),
            PromptKind::Reply => self.reply.clone(),
        })
    }
}

enum SpeechMode {
    Working,
    Failing,
    Slow(Duration),
}

pub struct MockSpeech {
    mode: SpeechMode,
    calls: Mutex<u32>,
}

impl MockSpeech {
    fn with_mode(mode: SpeechMode) -> Self {
        Self {
            mode,
            calls: Mutex::new(0),
        }
    }

    pub fn working() -> Self {
        Self::with_mode(SpeechMode::Working)
    }

    pub fn failing() -> Self {
        Self::with_mode(SpeechMode::Failing)
    }

    pub fn slow(delay: Duration) -> Self {
        Self::with_mode(SpeechMode::Slow(delay))
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeech {
    fn name(&self) -> &str {
        "mock_tts"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        match self.mode {
            SpeechMode::Working => Ok(format!("AUDIO:{text}").into_bytes()),
            SpeechMode::Failing => Err(ProviderError::ApiError {
                status_code: 503,
                message: "tts unavailable".into(),
            }),
            SpeechMode::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(b"late".to_vec())
            }
        }
    }
}

pub struct MockTranscriber {
    reply: Result<String, ProviderError>,
}

impl MockTranscriber {
    pub fn hearing(text: &str) -> Self {
        Self { reply: Ok(text.into()) }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err(ProviderError::Network("stt down".into())),
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    fn name(&self) -> &str {
        "mock_stt"
    }

    async fn transcribe(&self, _audio: &[u8]) -> Result<String, ProviderError> {
        self.reply.clone()
    }
}

pub struct MockImage {
    result: Result<ImageArtifact, ProviderError>,
    prompts: Mutex<Vec<String>>,
}

impl MockImage {
    pub fn png() -> Self {
        Self {
            result: Ok(ImageArtifact::Bytes(b"\x89PNG\r\n".to_vec())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn at_url(url: &str) -> Self {
        Self {
            result: Ok(ImageArtifact::Path(PathBuf::from(url))),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(ProviderError::ApiError {
                status_code: 500,
                message: "image model down".into(),
            }),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for MockImage {
    fn name(&self) -> &str {
        "mock_image"
    }

    async fn generate_image(&self, prompt: &str) -> Result<ImageArtifact, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.result.clone()
    }
}

/// Deterministic embedder: one dimension per keyword.
pub struct KeywordEmbedder;

const KEYWORDS: [&str; 6] = ["dog", "nurse", "anxious", "coffee", "guitar", "paris"];

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = KEYWORDS
                    .iter()
                    .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                    .collect();
                v.push(0.1);
                v
            })
            .collect())
    }
}

/// Settings with an isolated image directory.
pub fn settings(image_dir: PathBuf) -> WorkflowSettings {
    WorkflowSettings {
        image_dir,
        ..WorkflowSettings::default()
    }
}

/// A node context over the given mocks, without memory.
pub fn context(
    llm: Arc<MockLlm>,
    image: Arc<MockImage>,
    tts: Arc<MockSpeech>,
    image_dir: PathBuf,
) -> NodeContext {
    let settings = settings(image_dir);
    let speech = SpeechService::new(
        Arc::new(MockTranscriber::hearing("hello")),
        tts,
        settings.tts_timeout,
    );
    NodeContext::new(llm, image, speech, settings)
}
