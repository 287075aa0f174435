//! # agent-core
//!
//! Agent orchestration engine: typed conversation state, a tool registry, a
//! provider-agnostic model gateway, and the loop that drives them.
//!
//! ## Architecture
//!
//! ```text
//!  request ──▶ RateGuard ──▶ ┌──────────────────────────────────────────────┐
//!                            │                Orchestrator                  │
//!                            │  ┌──────────────┐      ┌─────────────────┐   │
//!                            │  │ ModelGateway │◀────▶│  ToolRegistry   │   │
//!                            │  │ (LlmProvider)│      │ (fan-out/join)  │   │
//!                            │  └──────────────┘      └─────────────────┘   │
//!                            └──────────────────────┬───────────────────────┘
//!                                                   ▼
//!                                            assembler::assemble ──▶ answer
//! ```
//!
//! The `LlmProvider` trait enables swapping model backends without changing
//! loop logic; `ModelGateway` normalizes whatever they return into text or
//! tool requests.

pub mod assembler;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod rate_limit;
pub mod tool;

pub use assembler::{AnswerStatus, ErrorCategory, ExternalAnswer, assemble};
pub use conversation::{AssistantMessage, Conversation, Turn};
pub use error::{AgentError, GatewayError, Result, ToolFailureKind};
pub use gateway::{ModelGateway, TextProtocolGateway};
pub use message::{Message, Role};
pub use orchestrator::{
    AbortReason, LoopConfig, LoopOutcome, Orchestrator, OrchestratorBuilder, RunReport,
};
pub use provider::LlmProvider;
pub use rate_limit::{Admission, RateGuard, RateLimitConfig};
pub use tool::{ParamType, ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};

/// Cancellation handle accepted by [`Orchestrator::run`]
pub use tokio_util::sync::CancellationToken;
