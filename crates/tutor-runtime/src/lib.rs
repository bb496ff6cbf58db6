//! # tutor-runtime
//!
//! HTTP providers and provider selection for the tutor.
//!
//! ## Providers
//!
//! - **OpenAI**: Chat Completions API with function calling
//! - **Anthropic**: Messages API with `tool_use` blocks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tutor_runtime::{HttpProviderFactory, ProviderSelector};
//!
//! let factory = Arc::new(HttpProviderFactory::from_env());
//! let selector = ProviderSelector::new(factory, ConfigFile::load_default())?;
//! let orchestrator = Orchestrator::new(selector.provider(), tools, config.orchestrator_config());
//! ```

pub mod anthropic;
pub mod credentials;
mod http;
pub mod openai;
pub mod selector;

pub use anthropic::AnthropicProvider;
pub use credentials::Credentials;
pub use openai::OpenAiProvider;
pub use selector::{HttpProviderFactory, ProviderFactory, ProviderSelector, Selection};

// Re-export core types for convenience
pub use tutor_core::{
    ConversationStore, LlmProvider, Message, Orchestrator, ProviderKind, Result, Role,
    ToolCatalog, TutorError,
};
