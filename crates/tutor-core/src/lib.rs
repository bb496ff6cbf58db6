//! # tutor-core
//!
//! Provider-agnostic tool-calling orchestration with sandboxed file tools.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Orchestrator                           │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ Turn state  │  │ ToolCatalog │  │   LlmProvider       │  │
//! │  │  machine    │──│ (sandboxed) │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │         │                                                   │
//! │  ┌─────────────────────┐                                    │
//! │  │  ConversationStore  │                                    │
//! │  └─────────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait lets OpenAI-style and Anthropic-style backends be
//! swapped without touching the orchestration logic.

pub mod config;
pub mod error;
pub mod file_tools;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod sandbox;
pub mod tool;
pub mod transcript;

pub use config::{ConfigFile, ConfigPatch, TutorConfig};
pub use error::{Result, TutorError};
pub use file_tools::SandboxedFileTool;
pub use message::{ConversationStore, Message, Role};
pub use orchestrator::{Orchestrator, OrchestratorConfig, ToolActivity, TurnOutcome};
pub use prompt::PromptLibrary;
pub use provider::{LlmProvider, ProviderConfig, ProviderKind, ProviderResponse};
pub use tool::{Tool, ToolCallRequest, ToolCallResult, ToolCatalog, ToolDefinition};
