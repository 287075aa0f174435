//! Orchestration Loop
//!
//! State machine alternating between asking the model for its next action and
//! executing the tools it requested:
//!
//! ```text
//!            tool requests                      results appended
//! AwaitingModel ─────────────▶ DispatchingTools ─────────────────▶ AwaitingModel
//!      │
//!      │ free text / ceiling / gateway failure / timeout
//!      ▼
//! Terminated(LoopOutcome)
//! ```
//!
//! Tool failures stay inside the conversation as data. Only the iteration
//! ceiling, gateway failures and the run deadline end a run early.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::conversation::{AssistantMessage, Conversation};
use crate::error::{AgentError, GatewayError, Result};
use crate::gateway::{GatewayResult, ModelGateway};
use crate::tool::{ToolCall, ToolRegistry, ToolSchema};

/// Loop limits and retry policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Maximum model↔tool round trips before the run is aborted
    pub max_iterations: usize,

    /// Extra attempts after a `ModelUnavailable` failure
    pub model_retries: usize,

    /// Backoff before the first retry; doubles per retry
    pub initial_backoff_ms: u64,

    /// Backoff cap
    pub max_backoff_ms: u64,

    /// Deadline for a whole run
    pub request_timeout_secs: u64,

    /// Deadline for a single tool invocation
    pub tool_timeout_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            model_retries: 2,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
            request_timeout_secs: 120,
            tool_timeout_secs: 20,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(AgentError::Config("request_timeout_secs must be at least 1".into()));
        }
        if self.tool_timeout_secs == 0 {
            return Err(AgentError::Config("tool_timeout_secs must be at least 1".into()));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(AgentError::Config("max_backoff_ms must not be below initial_backoff_ms".into()));
        }
        Ok(())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Wait before retry number `retry` (1-based): initial · 2^(retry-1), capped
    pub fn backoff(&self, retry: usize) -> Duration {
        let shift = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX).min(20);
        let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let millis = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// Why a run ended without a final answer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortReason {
    ToolLoopExceeded,
    ModelUnavailable,
    MalformedResponse,
    Timeout,
}

impl AbortReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolLoopExceeded => "tool-loop-exceeded",
            Self::ModelUnavailable => "model-unavailable",
            Self::MalformedResponse => "malformed-response",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal value of one run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum LoopOutcome {
    FinalAnswer(String),
    Aborted(AbortReason),
}

/// Loop states. `Terminated` has no outgoing transitions.
#[derive(Clone, Debug, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    DispatchingTools(Vec<ToolCall>),
    Terminated(LoopOutcome),
}

/// What happened during one run
#[derive(Clone, Debug)]
pub struct RunReport {
    pub outcome: LoopOutcome,
    /// Completed model↔tool round trips
    pub rounds: usize,
    /// Gateway calls, retries included
    pub model_calls: usize,
    /// Tool calls dispatched
    pub tool_calls: usize,
    pub elapsed: Duration,
}

#[derive(Default)]
struct RunStats {
    rounds: usize,
    model_calls: usize,
    tool_calls: usize,
}

/// Drives the model and the tool registry until a terminal state
pub struct Orchestrator {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    config: LoopConfig,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn ModelGateway>, tools: Arc<ToolRegistry>, config: LoopConfig) -> Self {
        Self { gateway, tools, config }
    }

    /// Answer a single question in a throwaway conversation
    pub async fn ask(&self, question: &str) -> RunReport {
        let mut conversation = Conversation::from_question(question);
        self.run(&mut conversation, &CancellationToken::new()).await
    }

    /// Run until terminated.
    ///
    /// Cancelling `cancel` or exceeding the configured deadline drops the
    /// in-flight model call and tool dispatches and ends with
    /// `Aborted(Timeout)`; results of the interrupted turn are not appended.
    pub async fn run(&self, conversation: &mut Conversation, cancel: &CancellationToken) -> RunReport {
        let started = Instant::now();
        let mut stats = RunStats::default();
        let deadline = self.config.request_timeout();

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Run cancelled by caller");
                LoopOutcome::Aborted(AbortReason::Timeout)
            }
            finished = tokio::time::timeout(deadline, self.drive(conversation, &mut stats)) => {
                finished.unwrap_or_else(|_| {
                    tracing::warn!(?deadline, "Run exceeded its deadline");
                    LoopOutcome::Aborted(AbortReason::Timeout)
                })
            }
        };

        let report = RunReport {
            outcome,
            rounds: stats.rounds,
            model_calls: stats.model_calls,
            tool_calls: stats.tool_calls,
            elapsed: started.elapsed(),
        };

        match &report.outcome {
            LoopOutcome::FinalAnswer(_) => tracing::info!(
                rounds = report.rounds,
                tool_calls = report.tool_calls,
                elapsed_ms = report.elapsed.as_millis(),
                "Run finished with an answer"
            ),
            LoopOutcome::Aborted(reason) => tracing::warn!(
                %reason,
                rounds = report.rounds,
                tool_calls = report.tool_calls,
                elapsed_ms = report.elapsed.as_millis(),
                "Run aborted"
            ),
        }

        report
    }

    async fn drive(&self, conversation: &mut Conversation, stats: &mut RunStats) -> LoopOutcome {
        let catalog = self.tools.schemas();
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => self.await_model(conversation, &catalog, stats).await,
                LoopState::DispatchingTools(calls) => self.dispatch(conversation, &calls, stats).await,
                LoopState::Terminated(outcome) => return outcome,
            };
        }
    }

    async fn await_model(
        &self,
        conversation: &mut Conversation,
        catalog: &[ToolSchema],
        stats: &mut RunStats,
    ) -> LoopState {
        let message = match self.advance_with_retry(conversation, catalog, stats).await {
            Ok(message) => message,
            Err(GatewayError::ModelUnavailable(reason)) => {
                tracing::error!(%reason, "Model unavailable after retries");
                return LoopState::Terminated(LoopOutcome::Aborted(AbortReason::ModelUnavailable));
            }
            Err(GatewayError::MalformedResponse(reason)) => {
                tracing::error!(%reason, "Malformed model response");
                return LoopState::Terminated(LoopOutcome::Aborted(AbortReason::MalformedResponse));
            }
        };

        match message {
            AssistantMessage::Text(text) => {
                if let Err(e) = conversation.push_assistant(AssistantMessage::Text(text.clone())) {
                    tracing::error!(error = %e, "Final answer rejected by conversation");
                    return LoopState::Terminated(LoopOutcome::Aborted(AbortReason::MalformedResponse));
                }
                LoopState::Terminated(LoopOutcome::FinalAnswer(text))
            }
            AssistantMessage::ToolRequests(calls) => {
                if stats.rounds >= self.config.max_iterations {
                    tracing::warn!(
                        ceiling = self.config.max_iterations,
                        "Model kept requesting tools past the iteration ceiling"
                    );
                    return LoopState::Terminated(LoopOutcome::Aborted(AbortReason::ToolLoopExceeded));
                }
                if let Err(e) = conversation.push_assistant(AssistantMessage::ToolRequests(calls.clone())) {
                    tracing::error!(error = %e, "Tool requests rejected by conversation");
                    return LoopState::Terminated(LoopOutcome::Aborted(AbortReason::MalformedResponse));
                }
                LoopState::DispatchingTools(calls)
            }
        }
    }

    async fn advance_with_retry(
        &self,
        conversation: &Conversation,
        catalog: &[ToolSchema],
        stats: &mut RunStats,
    ) -> GatewayResult<AssistantMessage> {
        let mut retry = 0;
        loop {
            stats.model_calls += 1;
            match self.gateway.advance(conversation, catalog).await {
                Err(GatewayError::ModelUnavailable(reason)) if retry < self.config.model_retries => {
                    retry += 1;
                    let wait = self.config.backoff(retry);
                    tracing::warn!(retry, ?wait, %reason, "Model unavailable, backing off");
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }

    async fn dispatch(&self, conversation: &mut Conversation, calls: &[ToolCall], stats: &mut RunStats) -> LoopState {
        tracing::debug!(count = calls.len(), round = stats.rounds + 1, "Dispatching tool calls");
        stats.tool_calls += calls.len();

        for result in self.tools.dispatch_all(calls).await {
            // ids come straight from the requests, so this only trips on a registry bug
            if let Err(e) = conversation.push_tool_result(result) {
                tracing::error!(error = %e, "Tool result could not be correlated");
                return LoopState::Terminated(LoopOutcome::Aborted(AbortReason::MalformedResponse));
            }
        }

        stats.rounds += 1;
        LoopState::AwaitingModel
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }
}

/// Builder for [`Orchestrator`]
#[derive(Default)]
pub struct OrchestratorBuilder {
    gateway: Option<Arc<dyn ModelGateway>>,
    tools: Option<Arc<ToolRegistry>>,
    config: LoopConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let gateway = self
            .gateway
            .ok_or_else(|| AgentError::Config("Model gateway is required".into()))?;
        self.config.validate()?;

        Ok(Orchestrator::new(gateway, self.tools.unwrap_or_default(), self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays canned replies; once exhausted it keeps answering with `fallback`
    struct Scripted {
        replies: Mutex<VecDeque<GatewayResult<AssistantMessage>>>,
        fallback: GatewayResult<AssistantMessage>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<GatewayResult<AssistantMessage>>, fallback: GatewayResult<AssistantMessage>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelGateway for Scripted {
        async fn advance(&self, _c: &Conversation, _t: &[ToolSchema]) -> GatewayResult<AssistantMessage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    struct Hanging;

    #[async_trait]
    impl ModelGateway for Hanging {
        async fn advance(&self, _c: &Conversation, _t: &[ToolSchema]) -> GatewayResult<AssistantMessage> {
            std::future::pending().await
        }
    }

    fn fast_config() -> LoopConfig {
        LoopConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            ..LoopConfig::default()
        }
    }

    fn unavailable() -> GatewayResult<AssistantMessage> {
        Err(GatewayError::ModelUnavailable("connection refused".into()))
    }

    fn orchestrator(gateway: Arc<dyn ModelGateway>, config: LoopConfig) -> Orchestrator {
        let mut tools = ToolRegistry::new();
        tools.register(crate::tool::CalculatorTool).unwrap();
        Orchestrator::new(gateway, Arc::new(tools), config)
    }

    #[test]
    fn test_backoff_schedule() {
        let config = LoopConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            ..LoopConfig::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(350));
        assert_eq!(config.backoff(60), Duration::from_millis(350));
    }

    #[test]
    fn test_config_validation() {
        assert!(LoopConfig::default().validate().is_ok());
        assert!(LoopConfig { max_iterations: 0, ..LoopConfig::default() }.validate().is_err());
        assert!(
            LoopConfig { initial_backoff_ms: 10, max_backoff_ms: 5, ..LoopConfig::default() }
                .validate()
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_retries_unavailable_then_answers() {
        let gateway = Arc::new(Scripted::new(
            vec![unavailable(), unavailable()],
            Ok(AssistantMessage::text("Here is your plan")),
        ));
        let report = orchestrator(gateway.clone(), fast_config()).ask("Plan Rome").await;

        assert_eq!(report.outcome, LoopOutcome::FinalAnswer("Here is your plan".into()));
        assert_eq!(report.model_calls, 3);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_aborts() {
        let gateway = Arc::new(Scripted::new(vec![], unavailable()));
        let report = orchestrator(gateway.clone(), fast_config()).ask("Plan Rome").await;

        assert_eq!(report.outcome, LoopOutcome::Aborted(AbortReason::ModelUnavailable));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1 + fast_config().model_retries);
    }

    #[tokio::test]
    async fn test_malformed_is_not_retried() {
        let gateway = Arc::new(Scripted::new(
            vec![Err(GatewayError::MalformedResponse("garbage".into()))],
            Ok(AssistantMessage::text("never reached")),
        ));
        let report = orchestrator(gateway.clone(), fast_config()).ask("Plan Rome").await;

        assert_eq!(report.outcome, LoopOutcome::Aborted(AbortReason::MalformedResponse));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_aborts_with_timeout() {
        let config = LoopConfig { request_timeout_secs: 1, ..fast_config() };
        let report = orchestrator(Arc::new(Hanging), config).ask("Plan Rome").await;
        assert_eq!(report.outcome, LoopOutcome::Aborted(AbortReason::Timeout));
    }

    #[tokio::test]
    async fn test_caller_cancellation() {
        let orchestrator = orchestrator(Arc::new(Hanging), fast_config());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut conversation = Conversation::from_question("Plan Rome");
        let report = orchestrator.run(&mut conversation, &cancel).await;
        assert_eq!(report.outcome, LoopOutcome::Aborted(AbortReason::Timeout));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_builder_requires_gateway() {
        assert!(OrchestratorBuilder::new().build().is_err());
        let built = OrchestratorBuilder::new()
            .gateway(Arc::new(Hanging))
            .max_iterations(3)
            .build()
            .unwrap();
        assert_eq!(built.config().max_iterations, 3);
        assert!(built.tools().is_empty());
    }
}
