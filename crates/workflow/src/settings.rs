//! Tunables for one orchestrator, resolved from [`AppConfig`].

use rose_config::AppConfig;
use std::path::PathBuf;
use std::time::Duration;

const RECOVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub character_name: String,
    /// Model for replies; provider default when `None`.
    pub text_model: Option<String>,
    /// Model for routing, scenarios, and summaries.
    pub small_text_model: Option<String>,
    pub temperature: f32,
    pub summary_trigger: usize,
    pub messages_after_summary: usize,
    pub router_window: usize,
    pub workflow_timeout: Duration,
    pub tts_timeout: Duration,
    /// Deadline for recording the fallback turn once the workflow has failed.
    pub recovery_timeout: Duration,
    pub schedule_context: bool,
    pub image_dir: PathBuf,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            character_name: config.character_name.clone(),
            text_model: Some(config.models.text_model.clone()),
            small_text_model: Some(config.models.small_text_model.clone()),
            temperature: config.models.temperature,
            summary_trigger: config.workflow.total_messages_summary_trigger,
            messages_after_summary: config.workflow.total_messages_after_summary,
            router_window: config.workflow.router_messages_to_analyze,
            workflow_timeout: Duration::from_secs(config.workflow.workflow_timeout_secs),
            tts_timeout: Duration::from_secs(config.resilience.tts_timeout_secs),
            recovery_timeout: RECOVERY_TIMEOUT,
            schedule_context: config.workflow.schedule_context,
            image_dir: config.storage.image_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_config() {
        let s = WorkflowSettings::default();
        assert_eq!(s.character_name, "Rose");
        assert_eq!(s.summary_trigger, 20);
        assert_eq!(s.messages_after_summary, 5);
        assert_eq!(s.router_window, 3);
        assert_eq!(s.workflow_timeout, Duration::from_secs(55));
        assert_eq!(s.tts_timeout, Duration::from_secs(10));
        assert!(s.tts_timeout < s.workflow_timeout);
        assert!(s.recovery_timeout < s.workflow_timeout);
    }
}
