//! # agent-runtime
//!
//! Model backends for the travel agent.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::ollama::{OllamaConfig, OllamaProvider};
//!
//! let provider = Arc::new(OllamaProvider::from_config(OllamaConfig::default()));
//! let gateway = TextProtocolGateway::new(provider, GenerationOptions::default());
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

pub use agent_core::{AgentError, LlmProvider, Message, Result, Role};
