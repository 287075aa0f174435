//! Application State

use std::sync::Arc;

use agent_core::{
    CancellationToken, LlmProvider, Orchestrator, OrchestratorBuilder, RateGuard, TextProtocolGateway,
    ToolRegistry,
};
use travel_tools::{TRAVEL_PLANNER_PROMPT, TravelClients, register_travel_tools};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Loop driver shared by every request
    pub orchestrator: Arc<Orchestrator>,

    /// LLM provider (Ollama, etc.)
    pub provider: Arc<dyn LlmProvider>,

    /// Tool registry with all available tools
    pub tools: Arc<ToolRegistry>,

    /// Per-caller admission control
    pub rate_guard: Arc<RateGuard>,

    /// Model name used for generation
    pub model: String,

    /// Cancelled on shutdown; every run listens on a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        shutdown: CancellationToken,
    ) -> agent_core::Result<Self> {
        let prompt = config
            .model
            .system_prompt
            .clone()
            .unwrap_or_else(|| TRAVEL_PLANNER_PROMPT.to_string());
        let gateway = TextProtocolGateway::new(provider.clone(), config.model.generation()).with_system_prompt(prompt);

        let tools = Arc::new(tools);
        let orchestrator = OrchestratorBuilder::new()
            .gateway(Arc::new(gateway))
            .tools(tools.clone())
            .config(config.agent.clone())
            .build()?;

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            provider,
            tools,
            rate_guard: Arc::new(RateGuard::new(config.rate_limit.clone())),
            model: config.model.name.clone(),
            shutdown,
        })
    }
}

/// Tool registry with every travel tool, each call bounded by the loop's tool timeout
pub fn build_registry(config: &ServerConfig, clients: &TravelClients) -> agent_core::Result<ToolRegistry> {
    let mut tools = ToolRegistry::new().with_call_timeout(config.agent.tool_timeout());
    register_travel_tools(&mut tools, clients)?;
    Ok(tools)
}
