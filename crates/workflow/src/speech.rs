//! Speech subsystem: transcription in, synthesis out.
//!
//! Both directions absorb every failure: the caller gets `None` and a
//! warning is logged. Synthesis carries its own ceiling, shorter than the
//! general API timeout, because voice latency is what the user notices first.

use rose_core::provider::{SpeechSynthesizer, Transcriber};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SpeechService {
    stt: Arc<dyn Transcriber>,
    tts: Arc<dyn SpeechSynthesizer>,
    tts_timeout: Duration,
}

impl SpeechService {
    pub fn new(
        stt: Arc<dyn Transcriber>,
        tts: Arc<dyn SpeechSynthesizer>,
        tts_timeout: Duration,
    ) -> Self {
        Self {
            stt,
            tts,
            tts_timeout,
        }
    }

    pub fn mime_type(&self) -> &str {
        self.tts.mime_type()
    }

    /// Speech to text. `None` for empty input, failures, or silence.
    pub async fn transcribe(&self, audio: &[u8]) -> Option<String> {
        if audio.is_empty() {
            warn!("Received empty audio input");
            return None;
        }
        match self.stt.transcribe(audio).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(chars = text.len(), "Transcribed voice input");
                Some(text.trim().to_string())
            }
            Ok(_) => {
                warn!("Transcription was empty");
                None
            }
            Err(e) => {
                warn!(provider = %self.stt.name(), error = %e, "Transcription failed");
                None
            }
        }
    }

    /// Text to speech within the synthesis ceiling. `None` on any failure.
    pub async fn synthesize_reply(&self, text: &str) -> Option<Vec<u8>> {
        if text.trim().is_empty() {
            return None;
        }
        match tokio::time::timeout(self.tts_timeout, self.tts.synthesize(text)).await {
            Ok(Ok(audio)) if !audio.is_empty() => {
                debug!(bytes = audio.len(), "Synthesized reply");
                Some(audio)
            }
            Ok(Ok(_)) => {
                warn!(provider = %self.tts.name(), "Synthesis returned no audio, replying with text only");
                None
            }
            Ok(Err(e)) => {
                warn!(provider = %self.tts.name(), error = %e, "Synthesis failed, replying with text only");
                None
            }
            Err(_) => {
                warn!(
                    provider = %self.tts.name(),
                    timeout_secs = self.tts_timeout.as_secs_f32(),
                    "Synthesis timed out, replying with text only"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockSpeech, MockTranscriber};

    fn service(tts: MockSpeech, stt: MockTranscriber) -> SpeechService {
        SpeechService::new(Arc::new(stt), Arc::new(tts), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn synthesizes_audio() {
        let s = service(MockSpeech::working(), MockTranscriber::hearing("hi"));
        let audio = s.synthesize_reply("Hello there").await.unwrap();
        assert!(!audio.is_empty());
        assert_eq!(s.mime_type(), "audio/mpeg");
    }

    #[tokio::test]
    async fn synthesis_failure_is_none() {
        let s = service(MockSpeech::failing(), MockTranscriber::hearing("hi"));
        assert!(s.synthesize_reply("Hello").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn synthesis_timeout_is_none() {
        let s = service(
            MockSpeech::slow(Duration::from_secs(60)),
            MockTranscriber::hearing("hi"),
        );
        assert!(s.synthesize_reply("Hello").await.is_none());
    }

    #[tokio::test]
    async fn blank_text_is_not_synthesized() {
        let tts = Arc::new(MockSpeech::working());
        let s = SpeechService::new(
            Arc::new(MockTranscriber::hearing("hi")),
            tts.clone(),
            Duration::from_secs(10),
        );
        assert!(s.synthesize_reply("   ").await.is_none());
        assert_eq!(tts.calls(), 0);
    }

    #[tokio::test]
    async fn transcription_paths() {
        let s = service(MockSpeech::working(), MockTranscriber::hearing("  good morning "));
        assert_eq!(s.transcribe(b"RIFF").await.as_deref(), Some("good morning"));
        assert!(s.transcribe(b"").await.is_none());

        let s = service(MockSpeech::working(), MockTranscriber::failing());
        assert!(s.transcribe(b"RIFF").await.is_none());

        let s = service(MockSpeech::working(), MockTranscriber::hearing("   "));
        assert!(s.transcribe(b"RIFF").await.is_none());
    }
}
