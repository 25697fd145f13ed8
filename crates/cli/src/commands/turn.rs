//! `rose turn`: one turn, from text or a recorded voice message.

use anyhow::Context;
use rose_core::message::SessionId;
use rose_workflow::UserInput;
use std::path::PathBuf;

use super::{build_orchestrator, load_config, print_reply, require_api_key};

pub async fn run(
    session: String,
    message: Option<String>,
    audio: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config()?;
    require_api_key(&config)?;

    let input = match (message, audio) {
        (Some(text), _) => UserInput::Text(text),
        (None, Some(path)) => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read audio file {}", path.display()))?;
            UserInput::Voice(bytes)
        }
        (None, None) => anyhow::bail!("Either --message or --audio is required"),
    };

    let orchestrator = build_orchestrator(&config).await?;
    let session = SessionId::from(session.as_str());
    let reply = orchestrator.run_turn(&session, input).await;
    print_reply(&config, &session, &reply).await
}
