//! Image node: Rose shows the user something.
//!
//! The small model writes a scenario (`narrative` + `image_prompt`), the image
//! model renders the prompt, and the bytes land in the image directory. If the
//! picture can't be made the narrative is still sent, with a short note.

use rose_core::json;
use rose_core::message::{Attachment, Message};
use rose_core::provider::ImageArtifact;
use rose_core::state::{ConversationState, StateUpdate};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use super::{NodeContext, NodeOutput, format_transcript, prompt_request};
use crate::prompts;

const SCENARIO_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    pub narrative: String,
    pub image_prompt: String,
}

async fn scenario(ctx: &NodeContext, state: &ConversationState) -> Option<Scenario> {
    let settings = &ctx.settings;
    let prompt = prompts::IMAGE_SCENARIO_PROMPT
        .replace("{name}", &settings.character_name)
        .replace(
            "{conversation}",
            &format_transcript(state.recent_messages(SCENARIO_WINDOW), &settings.character_name),
        );
    let request = prompt_request(prompt, settings.small_text_model.as_ref(), settings.temperature);

    let raw = match ctx.llm.complete(request).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Scenario generation failed");
            return None;
        }
    };
    match json::parse_embedded::<Scenario>(&raw) {
        Ok(s) if !s.image_prompt.trim().is_empty() => Some(s),
        Ok(_) => {
            warn!("Scenario has an empty image prompt");
            None
        }
        Err(e) => {
            warn!(error = %e, "Unparseable scenario");
            None
        }
    }
}

/// Give the artifact a stable location and return it.
async fn persist(artifact: ImageArtifact, image_dir: &Path) -> std::io::Result<String> {
    match artifact {
        ImageArtifact::Path(path) => Ok(path.to_string_lossy().into_owned()),
        ImageArtifact::Bytes(bytes) => {
            tokio::fs::create_dir_all(image_dir).await?;
            let path = image_dir.join(format!("{}.png", Uuid::new_v4()));
            tokio::fs::write(&path, bytes).await?;
            Ok(path.to_string_lossy().into_owned())
        }
    }
}

fn text_only(text: String) -> NodeOutput {
    NodeOutput::degraded(StateUpdate::AssistantReplied {
        message: Message::assistant(text),
        image_path: None,
    })
}

pub async fn generate(ctx: &NodeContext, state: &ConversationState) -> NodeOutput {
    let Some(scenario) = scenario(ctx, state).await else {
        return text_only(prompts::IMAGE_UNAVAILABLE.to_string());
    };

    let artifact = match ctx.image.generate_image(&scenario.image_prompt).await {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(error = %e, "Image generation failed, replying with text only");
            return text_only(format!("{}\n\n{}", scenario.narrative, prompts::IMAGE_UNAVAILABLE));
        }
    };

    match persist(artifact, &ctx.settings.image_dir).await {
        Ok(path) => {
            info!(path = %path, "Image generated");
            let message = Message::assistant(scenario.narrative)
                .with_attachment(Attachment::Image { path: path.clone() });
            NodeOutput::ok(StateUpdate::AssistantReplied {
                message,
                image_path: Some(path),
            })
        }
        Err(e) => {
            warn!(error = %e, "Could not save generated image, replying with text only");
            text_only(format!("{}\n\n{}", scenario.narrative, prompts::IMAGE_UNAVAILABLE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockImage, MockLlm, MockSpeech, PromptKind, context};
    use std::sync::Arc;

    fn state() -> ConversationState {
        let mut state = ConversationState::new();
        state.push_user(Message::user("show me what you're working on"));
        state
    }

    fn reply(out: &NodeOutput) -> (&Message, Option<&String>) {
        match &out.update {
            StateUpdate::AssistantReplied { message, image_path } => (message, image_path.as_ref()),
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[tokio::test]
    async fn writes_image_and_attaches_it() {
        let dir = tempfile::tempdir().unwrap();
        let image = Arc::new(MockImage::png());
        let ctx = context(
            Arc::new(MockLlm::new()),
            image.clone(),
            Arc::new(MockSpeech::working()),
            dir.path().join("images"),
        );

        let out = generate(&ctx, &state()).await;
        assert!(!out.degraded);
        let (message, path) = reply(&out);
        let path = path.unwrap();
        assert_eq!(message.content, "Look at the greenhouse this morning!");
        assert_eq!(message.image_path(), Some(path.as_str()));
        assert!(path.ends_with(".png"));
        assert_eq!(std::fs::read(path).unwrap(), b"\x89PNG\r\n");
        assert_eq!(image.prompts(), vec!["sunlit greenhouse full of seedlings".to_string()]);
    }

    #[tokio::test]
    async fn remote_artifact_is_referenced_as_is() {
        let ctx = context(
            Arc::new(MockLlm::new()),
            Arc::new(MockImage::at_url("https://cdn.example/greenhouse.png")),
            Arc::new(MockSpeech::working()),
            std::env::temp_dir(),
        );
        let out = generate(&ctx, &state()).await;
        let (_, path) = reply(&out);
        assert_eq!(path.map(String::as_str), Some("https://cdn.example/greenhouse.png"));
    }

    #[tokio::test]
    async fn image_failure_keeps_narrative_without_image() {
        let ctx = context(
            Arc::new(MockLlm::new()),
            Arc::new(MockImage::failing()),
            Arc::new(MockSpeech::working()),
            std::env::temp_dir(),
        );
        let out = generate(&ctx, &state()).await;
        assert!(out.degraded);
        let (message, path) = reply(&out);
        assert!(path.is_none());
        assert!(message.content.starts_with("Look at the greenhouse this morning!"));
        assert!(message.content.contains(prompts::IMAGE_UNAVAILABLE));
        assert!(message.image_path().is_none());
    }

    #[tokio::test]
    async fn scenario_failure_explains_limitation() {
        let image = Arc::new(MockImage::png());
        let ctx = context(
            Arc::new(MockLlm::new().failing_on(PromptKind::Scenario)),
            image.clone(),
            Arc::new(MockSpeech::working()),
            std::env::temp_dir(),
        );
        let out = generate(&ctx, &state()).await;
        assert!(out.degraded);
        assert_eq!(reply(&out).0.content, prompts::IMAGE_UNAVAILABLE);
        assert!(image.prompts().is_empty());
    }

    #[tokio::test]
    async fn malformed_scenario_explains_limitation() {
        let ctx = context(
            Arc::new(MockLlm::new().with_scenario("here's a nice picture")),
            Arc::new(MockImage::png()),
            Arc::new(MockSpeech::working()),
            std::env::temp_dir(),
        );
        assert!(generate(&ctx, &state()).await.degraded);
    }
}
