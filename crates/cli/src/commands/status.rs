//! `rose status`: configuration summary.

use rose_config::AppConfig;

use super::load_config;

pub async fn run() -> anyhow::Result<()> {
    let config = load_config()?;
    let storage = &config.storage;

    println!("Rose Status");
    println!("===========");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Character:     {}", config.character_name);
    println!("  Endpoint:      {}", config.api_base_url);
    println!("  Text model:    {}", config.models.text_model);
    println!("  Small model:   {}", config.models.small_text_model);
    println!("  Speech:        {} / {} ({})", config.models.stt_model, config.models.tts_model, config.models.tts_voice);
    println!("  Images:        {}", config.models.image_model);
    println!("  Embeddings:    {}", config.models.embedding_model);
    println!("  Checkpoints:   {} ({})", storage.checkpoint_backend, storage.checkpoint_path().display());
    println!("  Memories:      {}", storage.memory_path().display());
    println!(
        "  Resilience:    {} attempts, breaker opens after {} failures for {}s",
        config.resilience.max_attempts,
        config.resilience.failure_threshold,
        config.resilience.recovery_timeout_secs
    );

    for capability in ["llm", "stt", "tts", "image", "embeddings"] {
        if !config.providers.contains_key(capability) {
            continue;
        }
        let (url, key) = config.endpoint_for(capability);
        let key = if key.is_empty() { "no key" } else { "key set" };
        println!("  Override:      {capability} → {url} ({key})");
    }

    if config.has_api_key() {
        println!("\n  API key found");
    } else {
        println!("\n  No API key. Set ROSE_API_KEY or add api_key to the config");
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  No config file. Run `rose onboard` first");
    }
    Ok(())
}
