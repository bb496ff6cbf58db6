//! Provider selection
//!
//! Picks the adapter for a turn: the configured preference when it is usable,
//! otherwise the first usable provider in priority order. Switching is
//! all-or-nothing and persisted to the config file.

use std::sync::Arc;

use tutor_core::{
    ConfigFile, ConfigPatch, LlmProvider, ProviderKind, Result, TutorConfig, TutorError,
};

use crate::anthropic::AnthropicProvider;
use crate::credentials::Credentials;
use crate::openai::OpenAiProvider;

/// Builds adapters for a provider kind
pub trait ProviderFactory: Send + Sync {
    fn build(&self, kind: ProviderKind, config: &TutorConfig) -> Arc<dyn LlmProvider>;
}

/// Production factory backed by the HTTP adapters
#[derive(Clone, Debug, Default)]
pub struct HttpProviderFactory {
    credentials: Credentials,
}

impl HttpProviderFactory {
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn from_env() -> Self {
        Self::new(Credentials::from_env())
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn build(&self, kind: ProviderKind, config: &TutorConfig) -> Arc<dyn LlmProvider> {
        let settings = config.provider_config(kind);
        let key = self.credentials.api_key(kind).map(str::to_string);
        let base_url = self.credentials.base_url(kind);

        match kind {
            ProviderKind::OpenAi => {
                let provider = OpenAiProvider::new(settings, key);
                Arc::new(match base_url {
                    Some(url) => provider.with_base_url(url),
                    None => provider,
                })
            }
            ProviderKind::Anthropic => {
                let provider = AnthropicProvider::new(settings, key);
                Arc::new(match base_url {
                    Some(url) => provider.with_base_url(url),
                    None => provider,
                })
            }
        }
    }
}

/// The adapter chosen for use
#[derive(Clone)]
pub struct Selection {
    pub kind: ProviderKind,
    pub provider: Arc<dyn LlmProvider>,
    /// Set when the preferred provider was unusable
    pub fallback_from: Option<ProviderKind>,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("kind", &self.kind)
            .field("model", &self.provider.model())
            .field("fallback_from", &self.fallback_from)
            .finish()
    }
}

/// Select `preferred`, falling back in priority order
pub fn select(
    factory: &dyn ProviderFactory,
    config: &TutorConfig,
    preferred: ProviderKind,
) -> Result<Selection> {
    let provider = factory.build(preferred, config);
    if provider.is_available() {
        tracing::info!(provider = %preferred, model = %provider.model(), "Provider selected");
        return Ok(Selection {
            kind: preferred,
            provider,
            fallback_from: None,
        });
    }

    for kind in ProviderKind::ALL.into_iter().filter(|k| *k != preferred) {
        let provider = factory.build(kind, config);
        if provider.is_available() {
            tracing::warn!(
                preferred = %preferred,
                fallback = %kind,
                "Preferred provider unavailable, falling back"
            );
            return Ok(Selection {
                kind,
                provider,
                fallback_from: Some(preferred),
            });
        }
    }

    Err(TutorError::ProviderUnavailable(format!(
        "No AI providers available. Set {} or {}.",
        ProviderKind::OpenAi.api_key_env(),
        ProviderKind::Anthropic.api_key_env()
    )))
}

/// Owns the active selection and the persisted preference
pub struct ProviderSelector {
    factory: Arc<dyn ProviderFactory>,
    config: ConfigFile,
    active: Selection,
}

impl ProviderSelector {
    /// Select the configured preference; fails only when nothing is usable
    pub fn new(factory: Arc<dyn ProviderFactory>, config: ConfigFile) -> Result<Self> {
        let active = select(factory.as_ref(), config.config(), config.config().ai_provider)?;
        Ok(Self {
            factory,
            config,
            active,
        })
    }

    pub const fn active(&self) -> &Selection {
        &self.active
    }

    pub fn provider(&self) -> Arc<dyn LlmProvider> {
        self.active.provider.clone()
    }

    pub const fn active_kind(&self) -> ProviderKind {
        self.active.kind
    }

    pub const fn config(&self) -> &TutorConfig {
        self.config.config()
    }

    /// Kinds whose adapter is currently usable, in priority order
    pub fn available_kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.factory.build(*kind, self.config.config()).is_available())
            .collect()
    }

    /// Switch to the provider called `name`.
    ///
    /// Returns false and changes nothing if the name is unknown, the
    /// provider is unusable or the preference cannot be saved.
    pub fn switch(&mut self, name: &str) -> bool {
        let kind = match name.parse::<ProviderKind>() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(provider = %name, error = %e, "Unknown provider");
                return false;
            }
        };

        let provider = self.factory.build(kind, self.config.config());
        if !provider.is_available() {
            tracing::warn!(provider = %kind, "Cannot switch, provider unavailable");
            return false;
        }

        let previous = self.config.clone();
        if let Err(e) = self.config.set_provider(kind) {
            tracing::warn!(provider = %kind, error = %e, "Cannot switch, preference not saved");
            self.config = previous;
            return false;
        }

        self.active = Selection {
            kind,
            provider,
            fallback_from: None,
        };
        tracing::info!(provider = %kind, "Switched provider");
        true
    }

    /// Validate and apply a configuration change, then rebuild the adapter
    /// so new model and generation settings take effect
    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<&TutorConfig> {
        let previous = self.config.clone();
        self.config.update(patch)?;

        let preferred = if patch.ai_provider.is_some() {
            self.config.config().ai_provider
        } else {
            self.active.kind
        };

        match select(self.factory.as_ref(), self.config.config(), preferred) {
            Ok(selection) => {
                self.active = selection;
                Ok(self.config.config())
            }
            Err(e) => {
                self.config = previous;
                if let Err(save) = self.config.save() {
                    tracing::warn!(error = %save, "Could not restore previous configuration");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tutor_core::{Message, ProviderResponse, ToolDefinition};

    struct StubProvider {
        kind: ProviderKind,
        model: String,
        available: bool,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            self.kind.display_name()
        }

        fn model(&self) -> &str {
            &self.model
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _system_prompt: &str,
            _tools: &[ToolDefinition],
        ) -> Result<ProviderResponse> {
            Ok(ProviderResponse::text(format!("from {}", self.kind)))
        }
    }

    struct StubFactory {
        available: Vec<ProviderKind>,
    }

    impl ProviderFactory for StubFactory {
        fn build(&self, kind: ProviderKind, config: &TutorConfig) -> Arc<dyn LlmProvider> {
            Arc::new(StubProvider {
                kind,
                model: config.model_for(kind).to_string(),
                available: self.available.contains(&kind),
            })
        }
    }

    fn factory(available: &[ProviderKind]) -> Arc<dyn ProviderFactory> {
        Arc::new(StubFactory {
            available: available.to_vec(),
        })
    }

    #[test]
    fn test_preferred_provider_is_used() {
        let config = TutorConfig::default();
        let selection = select(
            factory(&ProviderKind::ALL).as_ref(),
            &config,
            ProviderKind::Anthropic,
        )
        .unwrap();
        assert_eq!(selection.kind, ProviderKind::Anthropic);
        assert!(selection.fallback_from.is_none());
    }

    #[tokio::test]
    async fn test_fallback_when_preferred_unavailable() {
        let config = TutorConfig::default();
        let selection = select(
            factory(&[ProviderKind::Anthropic]).as_ref(),
            &config,
            ProviderKind::OpenAi,
        )
        .unwrap();

        assert_eq!(selection.kind, ProviderKind::Anthropic);
        assert_eq!(selection.fallback_from, Some(ProviderKind::OpenAi));
        let answer = selection.provider.call(&[Message::user("hi")], "", &[]).await;
        assert_eq!(answer.text, "from claude");
    }

    #[test]
    fn test_nothing_available_is_an_error() {
        let err = select(factory(&[]).as_ref(), &TutorConfig::default(), ProviderKind::OpenAi)
            .unwrap_err();
        assert!(matches!(err, TutorError::ProviderUnavailable(_)));
    }

    #[test]
    fn test_switch_persists_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tutor_config.json");

        let mut selector =
            ProviderSelector::new(factory(&[ProviderKind::OpenAi]), ConfigFile::load(&path)).unwrap();
        assert_eq!(selector.active_kind(), ProviderKind::OpenAi);
        assert_eq!(selector.available_kinds(), vec![ProviderKind::OpenAi]);

        assert!(!selector.switch("claude"));
        assert!(!selector.switch("gemini"));
        assert_eq!(selector.active_kind(), ProviderKind::OpenAi);
        assert!(!path.exists());

        let mut selector =
            ProviderSelector::new(factory(&ProviderKind::ALL), ConfigFile::load(&path)).unwrap();
        assert!(selector.switch("anthropic"));
        assert_eq!(selector.active_kind(), ProviderKind::Anthropic);
        assert_eq!(
            ConfigFile::load(&path).config().ai_provider,
            ProviderKind::Anthropic
        );
    }

    #[test]
    fn test_switch_is_rolled_back_when_preference_cannot_be_saved() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("tutor_config.json");

        let mut selector =
            ProviderSelector::new(factory(&ProviderKind::ALL), ConfigFile::load(&path)).unwrap();
        assert!(!selector.switch("claude"));
        assert_eq!(selector.active_kind(), ProviderKind::OpenAi);
        assert_eq!(selector.config().ai_provider, ProviderKind::OpenAi);
    }

    #[test]
    fn test_update_config_rebuilds_adapter() {
        let mut selector = ProviderSelector::new(
            factory(&ProviderKind::ALL),
            ConfigFile::in_memory(TutorConfig::default()),
        )
        .unwrap();

        let patch = ConfigPatch {
            openai_model: Some("gpt-4o".into()),
            ..Default::default()
        };
        selector.update_config(&patch).unwrap();
        assert_eq!(selector.provider().model(), "gpt-4o");

        let bad = ConfigPatch {
            max_tool_rounds: Some(0),
            ..Default::default()
        };
        assert!(selector.update_config(&bad).is_err());
        assert_eq!(selector.config().max_tool_rounds, 10);
    }
}
