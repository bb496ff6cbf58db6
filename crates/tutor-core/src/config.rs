//! Tutor Configuration
//!
//! Persistent settings stored as JSON under the user's config directory
//! (`~/.config/ai-tutor/tutor_config.json` on Linux). Missing keys take their
//! defaults. An invalid configuration never takes effect.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::orchestrator::OrchestratorConfig;
use crate::provider::{ProviderConfig, ProviderKind};

/// Prompt roles understood by the prompt library
pub const ROLES: [&str; 3] = ["tutor", "simple", "short"];

/// Model identifier per provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub openai: String,
    pub claude: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            openai: ProviderKind::OpenAi.default_model().into(),
            claude: ProviderKind::Anthropic.default_model().into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Preferred provider
    pub ai_provider: ProviderKind,

    pub models: ModelConfig,

    /// Maximum tokens per response, 1 to 8192
    pub max_tokens: u32,

    /// Sampling temperature, 0.0 to 2.0
    pub temperature: f32,

    /// Messages sent as context per provider call, 1 to 100
    pub conversation_history_limit: usize,

    /// Tool-execution rounds per turn, 1 to 50
    pub max_tool_rounds: usize,

    /// Per-request provider timeout
    pub request_timeout_secs: u64,

    /// Prompt role ("tutor", "simple" or "short")
    pub role: String,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            ai_provider: ProviderKind::OpenAi,
            models: ModelConfig::default(),
            max_tokens: 1000,
            temperature: 0.7,
            conversation_history_limit: 10,
            max_tool_rounds: 10,
            request_timeout_secs: 60,
            role: "tutor".into(),
        }
    }
}

impl TutorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=8192).contains(&self.max_tokens) {
            return Err(TutorError::Validation(format!(
                "max_tokens must be between 1 and 8192 (got {})",
                self.max_tokens
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TutorError::Validation(format!(
                "temperature must be between 0.0 and 2.0 (got {})",
                self.temperature
            )));
        }
        if !(1..=100).contains(&self.conversation_history_limit) {
            return Err(TutorError::Validation(format!(
                "conversation_history_limit must be between 1 and 100 (got {})",
                self.conversation_history_limit
            )));
        }
        if !(1..=50).contains(&self.max_tool_rounds) {
            return Err(TutorError::Validation(format!(
                "max_tool_rounds must be between 1 and 50 (got {})",
                self.max_tool_rounds
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(TutorError::Validation(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        if !ROLES.contains(&self.role.as_str()) {
            return Err(TutorError::Validation(format!(
                "role must be one of {} (got '{}')",
                ROLES.join(", "),
                self.role
            )));
        }
        if self.models.openai.trim().is_empty() || self.models.claude.trim().is_empty() {
            return Err(TutorError::Validation("model names must not be empty".into()));
        }
        Ok(())
    }

    pub fn model_for(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::OpenAi => &self.models.openai,
            ProviderKind::Anthropic => &self.models.claude,
        }
    }

    /// Generation settings for one provider
    pub fn provider_config(&self, kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            kind,
            model: self.model_for(kind).to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout_secs: self.request_timeout_secs,
        }
    }

    pub const fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            history_limit: self.conversation_history_limit,
            max_rounds: self.max_tool_rounds,
        }
    }

    /// Apply a partial update, returning the candidate without validating it
    fn patched(&self, patch: &ConfigPatch) -> Self {
        let mut next = self.clone();
        if let Some(kind) = patch.ai_provider {
            next.ai_provider = kind;
        }
        if let Some(model) = &patch.openai_model {
            next.models.openai.clone_from(model);
        }
        if let Some(model) = &patch.claude_model {
            next.models.claude.clone_from(model);
        }
        if let Some(v) = patch.max_tokens {
            next.max_tokens = v;
        }
        if let Some(v) = patch.temperature {
            next.temperature = v;
        }
        if let Some(v) = patch.conversation_history_limit {
            next.conversation_history_limit = v;
        }
        if let Some(v) = patch.max_tool_rounds {
            next.max_tool_rounds = v;
        }
        if let Some(v) = patch.request_timeout_secs {
            next.request_timeout_secs = v;
        }
        if let Some(role) = &patch.role {
            next.role.clone_from(role);
        }
        next
    }
}

/// Partial update; absent fields keep their current value
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConfigPatch {
    pub ai_provider: Option<ProviderKind>,
    pub openai_model: Option<String>,
    pub claude_model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub conversation_history_limit: Option<usize>,
    pub max_tool_rounds: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub role: Option<String>,
}

/// A configuration bound to its file
#[derive(Clone, Debug)]
pub struct ConfigFile {
    path: Option<PathBuf>,
    config: TutorConfig,
}

impl ConfigFile {
    /// `~/.config/ai-tutor/tutor_config.json` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ai-tutor").join("tutor_config.json"))
    }

    /// Load from the default location
    pub fn load_default() -> Self {
        match Self::default_path() {
            Some(path) => Self::load(path),
            None => {
                tracing::warn!("No config directory available, settings will not persist");
                Self::in_memory(TutorConfig::default())
            }
        }
    }

    /// Load `path`, falling back to defaults when it is missing or invalid
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match read_config(&path) {
            Ok(Some(config)) => config,
            Ok(None) => TutorConfig::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config, using defaults");
                TutorConfig::default()
            }
        };

        Self {
            path: Some(path),
            config,
        }
    }

    /// A configuration that is never written to disk
    pub const fn in_memory(config: TutorConfig) -> Self {
        Self { path: None, config }
    }

    pub const fn config(&self) -> &TutorConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Validate and apply `patch`, then persist.
    ///
    /// On a validation failure the current configuration is kept.
    pub fn update(&mut self, patch: &ConfigPatch) -> Result<&TutorConfig> {
        let candidate = self.config.patched(patch);
        candidate.validate()?;
        self.config = candidate;
        self.save()?;
        tracing::info!("Configuration updated");
        Ok(&self.config)
    }

    /// Record the preferred provider
    pub fn set_provider(&mut self, kind: ProviderKind) -> Result<()> {
        self.update(&ConfigPatch {
            ai_provider: Some(kind),
            ..Default::default()
        })
        .map(|_| ())
    }

    pub fn save(&self) -> Result<()> {
        self.config.validate()?;

        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.config)?)?;
        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.config = TutorConfig::default();
        self.save()
    }
}

fn read_config(path: &Path) -> Result<Option<TutorConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let config: TutorConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(Some(config))
}
