pub mod chat;
pub mod end;
pub mod onboard;
pub mod status;
pub mod turn;

use anyhow::{Context, bail};
use chrono::Utc;
use rose_config::AppConfig;
use rose_core::checkpoint::CheckpointStore;
use rose_core::memory::VectorStore;
use rose_core::message::SessionId;
use rose_memory::{EmbeddingVectorStore, InMemoryCheckpointStore, SqliteCheckpointStore};
use rose_providers::ProviderSet;
use rose_workflow::{Orchestrator, TurnReply};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub(crate) fn load_config() -> anyhow::Result<AppConfig> {
    AppConfig::load().context("Failed to load config")
}

/// Fail early with setup instructions when no key is configured.
pub(crate) fn require_api_key(config: &AppConfig) -> anyhow::Result<()> {
    if config.has_api_key() {
        return Ok(());
    }
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    ROSE_API_KEY   (highest priority)");
    eprintln!("    GROQ_API_KEY");
    eprintln!("    OPENAI_API_KEY");
    eprintln!();
    eprintln!("  Or add `api_key` to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    bail!("No API key found. See above for setup instructions.")
}

pub(crate) async fn checkpoint_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CheckpointStore>> {
    match config.storage.checkpoint_backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryCheckpointStore::new())),
        _ => {
            let path = config.storage.checkpoint_path();
            let store = SqliteCheckpointStore::open(&path)
                .await
                .with_context(|| format!("Failed to open checkpoints at {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

/// Providers, long-term memory, and checkpoints wired from config.
pub(crate) async fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let providers = ProviderSet::from_config(config).context("Failed to configure providers")?;
    let memory: Arc<dyn VectorStore> = Arc::new(EmbeddingVectorStore::open(
        providers.embedder.clone(),
        config.storage.memory_path(),
    ));
    let checkpoints = checkpoint_store(config).await?;
    Ok(Orchestrator::from_config(config, &providers, Some(memory), checkpoints))
}

fn audio_extension(mime: &str) -> &'static str {
    match mime {
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "audio/flac" => "flac",
        _ => "mp3",
    }
}

/// A session id reduced to characters safe in a single path component.
fn file_stem(session: &SessionId) -> String {
    session
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Write reply audio under `dir`, returning the file path.
pub(crate) async fn save_audio(
    dir: &Path,
    session: &SessionId,
    reply: &TurnReply,
) -> anyhow::Result<Option<PathBuf>> {
    let Some(audio) = &reply.audio else {
        return Ok(None);
    };
    let ext = audio_extension(reply.audio_mime.as_deref().unwrap_or_default());
    tokio::fs::create_dir_all(dir).await?;
    let stamp = Utc::now().timestamp_millis();
    let path = dir.join(format!("{}-{stamp}.{ext}", file_stem(session)));
    tokio::fs::write(&path, audio)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(path))
}

/// Print a reply with its attachments.
pub(crate) async fn print_reply(
    config: &AppConfig,
    session: &SessionId,
    reply: &TurnReply,
) -> anyhow::Result<()> {
    if let Some(heard) = &reply.transcript {
        println!("  (heard) {heard}");
    }
    for line in reply.text.lines() {
        println!("  {} > {line}", config.character_name);
    }
    if let Some(image) = &reply.image_path {
        println!("  [image] {image}");
    }
    if let Some(path) = save_audio(&config.storage.audio_dir(), session, reply).await? {
        println!("  [audio] {}", path.display());
    }
    if !reply.degraded.is_empty() {
        let nodes: Vec<&str> = reply.degraded.iter().map(|n| n.as_str()).collect();
        tracing::debug!(nodes = %nodes.join(","), "Turn completed with degraded nodes");
    }
    Ok(())
}
