//! Model Gateway
//!
//! Boundary between the orchestration loop and a language model. Whatever the
//! backend returns, the gateway hands back exactly one of
//! [`AssistantMessage::Text`] or [`AssistantMessage::ToolRequests`]; anything
//! else is classified as [`GatewayError::MalformedResponse`] here.
//!
//! [`TextProtocolGateway`] drives plain chat providers by asking the model to
//! emit fenced tool blocks:
//!
//! ````text
//! ```tool
//! [{"tool": "get_current_weather", "arguments": {"city": "Lisbon"}}]
//! ```
//! ````

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::conversation::{AssistantMessage, Conversation, Turn};
use crate::error::GatewayError;
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolOutcome, ToolResult, ToolSchema};

/// Result type for gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Uniform interface to a pluggable model backend
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Produce the next assistant message for `conversation`
    async fn advance(
        &self,
        conversation: &Conversation,
        catalog: &[ToolSchema],
    ) -> GatewayResult<AssistantMessage>;
}

pub const DEFAULT_SYSTEM_PROMPT: &str = r"You are a helpful AI assistant.

Use tools when you need live data. After receiving tool results, synthesize them into a helpful response.
If a tool fails, try another approach or answer with what you have and say what is missing.
If you can answer directly without tools, do so.";

const TOOL_FENCE: &str = "```tool";
const FENCE_END: &str = "```";

/// Gateway over a plain chat [`LlmProvider`] using fenced tool blocks
pub struct TextProtocolGateway {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
    system_prompt: String,
}

impl TextProtocolGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self {
            provider,
            options,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub const fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Render the typed conversation into provider chat messages
    pub fn render(&self, conversation: &Conversation, catalog: &[ToolSchema]) -> Vec<Message> {
        let mut system = self.system_prompt.clone();
        if !catalog.is_empty() {
            system.push_str("\n\n");
            system.push_str(&render_catalog(catalog));
        }

        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(system));

        for turn in conversation.turns() {
            messages.push(match turn {
                Turn::User { text } => Message::user(text.clone()),
                Turn::Assistant { message: AssistantMessage::Text(text) } => Message::assistant(text.clone()),
                Turn::Assistant { message: AssistantMessage::ToolRequests(calls) } => {
                    Message::assistant(render_tool_requests(calls))
                }
                Turn::ToolResult { result } => Message::tool(render_tool_result(result), result.id.clone()),
            });
        }

        messages
    }
}

#[async_trait]
impl ModelGateway for TextProtocolGateway {
    async fn advance(
        &self,
        conversation: &Conversation,
        catalog: &[ToolSchema],
    ) -> GatewayResult<AssistantMessage> {
        let messages = self.render(conversation, catalog);
        let completion = self
            .provider
            .complete(&messages, &self.options)
            .await
            .map_err(GatewayError::from)?;

        parse_reply(&completion.content)
    }
}

/// Generate the system prompt section describing available tools
pub fn render_catalog(catalog: &[ToolSchema]) -> String {
    let mut prompt = String::from("## Available Tools\n\n");
    prompt.push_str("To use tools, reply with only a fenced block holding a JSON array of calls:\n\n");
    prompt.push_str("```tool\n[{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}]\n```\n\n");
    prompt.push_str("Calls in one block run in parallel, so only group calls that do not depend on each other.\n\n");

    for schema in catalog {
        let _ = writeln!(prompt, "### {}", schema.name);
        let _ = writeln!(prompt, "{}", schema.description);

        if !schema.parameters.is_empty() {
            prompt.push_str("**Parameters:**\n");
            for param in &schema.parameters {
                let required = if param.required { " (required)" } else { "" };
                let _ = write!(
                    prompt,
                    "- `{}` ({}){}: {}",
                    param.name,
                    param.param_type.as_str(),
                    required,
                    param.description
                );
                if let Some(values) = &param.enum_values {
                    let _ = write!(prompt, " One of: {}", Value::Array(values.clone()));
                }
                prompt.push('\n');
            }
        }
        prompt.push('\n');
    }

    prompt
}

fn render_tool_requests(calls: &[ToolCall]) -> String {
    let wire: Vec<Value> = calls
        .iter()
        .map(|c| serde_json::json!({ "tool": c.name, "arguments": c.arguments, "id": c.id }))
        .collect();
    format!("{TOOL_FENCE}\n{}\n{FENCE_END}", Value::Array(wire))
}

fn render_tool_result(result: &ToolResult) -> String {
    match &result.outcome {
        ToolOutcome::Success { data } => format!("[Tool '{}' returned]\n{data}", result.name),
        ToolOutcome::Failure(failure) => format!(
            "[Tool '{}' failed: {}]\n{}",
            result.name, failure.kind, failure.message
        ),
    }
}

/// Wire shape of one requested call
#[derive(Deserialize)]
struct RawToolCall {
    tool: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    id: Option<String>,
}

/// Classify a raw model reply as text or tool requests
pub fn parse_reply(content: &str) -> GatewayResult<AssistantMessage> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::MalformedResponse("empty reply".into()));
    }

    let mut raw_calls = Vec::new();
    let mut rest = trimmed;
    while let Some(start) = rest.find(TOOL_FENCE) {
        let body = &rest[start + TOOL_FENCE.len()..];
        let end = body
            .find(FENCE_END)
            .ok_or_else(|| GatewayError::MalformedResponse("unterminated tool block".into()))?;
        raw_calls.extend(parse_block(body[..end].trim())?);
        rest = &body[end + FENCE_END.len()..];
    }

    // Bare JSON object as the entire reply
    if raw_calls.is_empty() && trimmed.starts_with('{') && trimmed.contains("\"tool\"") {
        raw_calls.extend(parse_block(trimmed)?);
    }

    if raw_calls.is_empty() {
        return Ok(AssistantMessage::Text(trimmed.to_string()));
    }

    let mut seen = HashSet::new();
    let mut calls = Vec::with_capacity(raw_calls.len());
    for raw in raw_calls {
        let call = into_call(raw)?;
        if !seen.insert(call.id.clone()) {
            return Err(GatewayError::MalformedResponse(format!(
                "duplicate tool call id '{}'",
                call.id
            )));
        }
        calls.push(call);
    }

    Ok(AssistantMessage::ToolRequests(calls))
}

fn parse_block(json: &str) -> GatewayResult<Vec<RawToolCall>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| GatewayError::MalformedResponse(format!("tool block is not JSON: {e}")))?;

    let items = match value {
        Value::Array(items) if !items.is_empty() => items,
        Value::Array(_) => return Err(GatewayError::MalformedResponse("empty tool block".into())),
        other => vec![other],
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<RawToolCall>(item)
                .map_err(|e| GatewayError::MalformedResponse(format!("invalid tool call: {e}")))
        })
        .collect()
}

fn into_call(raw: RawToolCall) -> GatewayResult<ToolCall> {
    let name = raw.tool.trim();
    if name.is_empty() {
        return Err(GatewayError::MalformedResponse("tool call without a name".into()));
    }

    let arguments: HashMap<String, Value> = match raw.arguments {
        Value::Object(map) => map.into_iter().collect(),
        Value::Null => HashMap::new(),
        other => {
            return Err(GatewayError::MalformedResponse(format!(
                "arguments for '{name}' must be an object, got {other}"
            )));
        }
    };

    let call = ToolCall::new(name, arguments);
    Ok(match raw.id.filter(|id| !id.trim().is_empty()) {
        Some(id) => call.with_id(id),
        None => call,
    })
}
