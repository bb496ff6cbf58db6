//! Provider credentials and endpoint overrides

use std::collections::HashMap;

use tutor_core::ProviderKind;

/// API keys and base URLs per provider
///
/// Built once at startup and passed to the provider factory; nothing else
/// reads the environment.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    keys: HashMap<ProviderKind, String>,
    base_urls: HashMap<ProviderKind, String>,
}

impl Credentials {
    pub fn none() -> Self {
        Self::default()
    }

    /// Read `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` and the optional
    /// `OPENAI_BASE_URL` / `ANTHROPIC_BASE_URL` overrides
    pub fn from_env() -> Self {
        let mut credentials = Self::default();
        for kind in ProviderKind::ALL {
            if let Some(key) = non_empty_env(kind.api_key_env()) {
                credentials.keys.insert(kind, key);
            }
            if let Some(url) = non_empty_env(base_url_env(kind)) {
                credentials.base_urls.insert(kind, url);
            }
        }

        tracing::debug!(
            openai = credentials.has_key(ProviderKind::OpenAi),
            claude = credentials.has_key(ProviderKind::Anthropic),
            "Credentials loaded"
        );
        credentials
    }

    #[must_use]
    pub fn with_key(mut self, kind: ProviderKind, key: impl Into<String>) -> Self {
        self.keys.insert(kind, key.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, kind: ProviderKind, url: impl Into<String>) -> Self {
        self.base_urls.insert(kind, url.into());
        self
    }

    pub fn api_key(&self, kind: ProviderKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }

    pub fn has_key(&self, kind: ProviderKind) -> bool {
        self.keys.contains_key(&kind)
    }

    pub fn base_url(&self, kind: ProviderKind) -> Option<&str> {
        self.base_urls.get(&kind).map(String::as_str)
    }
}

const fn base_url_env(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "OPENAI_BASE_URL",
        ProviderKind::Anthropic => "ANTHROPIC_BASE_URL",
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
