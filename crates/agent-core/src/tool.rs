//! Tool System
//!
//! Tools are registered once at startup and invoked by the orchestration loop.
//! Invocation never fails: unknown names, bad arguments, upstream errors,
//! timeouts and even panics come back as a failed [`ToolResult`] so the model
//! gets a chance to recover.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result, ToolFailureKind};

/// Tool call request from the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: HashMap<String, Value>,

    /// Call id, unique within one assistant turn
    pub id: String,
}

impl ToolCall {
    /// Create a call with a freshly generated id
    pub fn new(name: impl Into<String>, arguments: HashMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Argument lookup that treats JSON `null` as absent
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|v| !v.is_null())
    }

    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arg(name).and_then(Value::as_str)
    }

    pub fn f64_arg(&self, name: &str) -> Option<f64> {
        self.arg(name).and_then(Value::as_f64)
    }

    pub fn u64_arg(&self, name: &str) -> Option<u64> {
        self.arg(name).and_then(Value::as_u64)
    }

    /// Fetch a required string argument or fail validation
    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.str_arg(name)
            .ok_or_else(|| AgentError::ToolValidation(format!("Missing required parameter: {name}")))
    }
}

/// A typed tool failure carried back to the model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub message: String,
}

/// Either the tool's structured payload or a typed failure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { data: Value },
    Failure(ToolFailure),
}

/// Result from tool execution, correlated to its request by `id`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call id of the originating request
    pub id: String,

    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call: &ToolCall, data: Value) -> Self {
        Self {
            name: call.name.clone(),
            id: call.id.clone(),
            outcome: ToolOutcome::Success { data },
        }
    }

    pub fn failure(call: &ToolCall, kind: ToolFailureKind, message: impl Into<String>) -> Self {
        Self {
            name: call.name.clone(),
            id: call.id.clone(),
            outcome: ToolOutcome::Failure(ToolFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    pub const fn failure_kind(&self) -> Option<ToolFailureKind> {
        match &self.outcome {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Failure(f) => Some(f.kind),
        }
    }
}

/// JSON shape accepted for a parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            enum_values: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(|v| Value::String(v.into())).collect());
        self
    }
}

/// Tool definition schema shown to the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with already validated arguments
    async fn execute(&self, call: &ToolCall) -> Result<Value>;

    /// Validate arguments against the schema before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        validate_arguments(&self.schema(), call)
    }
}

/// Check presence, JSON shape and enum membership of every declared parameter
pub fn validate_arguments(schema: &ToolSchema, call: &ToolCall) -> Result<()> {
    for param in &schema.parameters {
        let Some(value) = call.arg(&param.name) else {
            if param.required {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
            continue;
        };

        if !param.param_type.matches(value) {
            return Err(AgentError::ToolValidation(format!(
                "Parameter '{}' must be of type {}",
                param.name,
                param.param_type.as_str()
            )));
        }

        if let Some(allowed) = &param.enum_values {
            if !allowed.contains(value) {
                return Err(AgentError::ToolValidation(format!(
                    "Parameter '{}' must be one of {}",
                    param.name,
                    Value::Array(allowed.clone())
                )));
            }
        }
    }

    Ok(())
}

/// Registry for available tools
///
/// Built at startup and then shared read-only (`Arc<ToolRegistry>`) across
/// every concurrently running loop.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    call_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every tool invocation by `timeout`
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Register a new tool; names must be non-empty and unique
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_shared(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if name.trim().is_empty() {
            return Err(AgentError::Config("Tool name must not be empty".into()));
        }
        if self.tools.contains_key(&name) {
            return Err(AgentError::Config(format!("Tool '{name}' registered twice")));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Invoke one call. Every failure is folded into the returned result.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Unknown tool requested");
            return ToolResult::failure(
                call,
                ToolFailureKind::UnknownTool,
                format!("No tool named '{}'. Available: {}", call.name, self.names().join(", ")),
            );
        };

        if let Err(e) = tool.validate(call) {
            return ToolResult::failure(call, e.tool_failure_kind(), e.to_string());
        }

        tracing::debug!(tool = %call.name, id = %call.id, "Executing tool");

        let guarded = AssertUnwindSafe(tool.execute(call)).catch_unwind();
        let completed = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(completed) => completed,
                Err(_) => {
                    tracing::warn!(tool = %call.name, ?limit, "Tool timed out");
                    return ToolResult::failure(
                        call,
                        ToolFailureKind::Timeout,
                        format!("Tool '{}' did not answer within {}s", call.name, limit.as_secs_f32()),
                    );
                }
            },
            None => guarded.await,
        };

        match completed {
            Ok(Ok(data)) => ToolResult::success(call, data),
            Ok(Err(e)) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool failed");
                ToolResult::failure(call, e.tool_failure_kind(), e.to_string())
            }
            Err(_) => {
                tracing::error!(tool = %call.name, "Tool panicked during execution");
                ToolResult::failure(
                    call,
                    ToolFailureKind::InvalidArguments,
                    format!("Tool '{}' could not process these arguments", call.name),
                )
            }
        }
    }

    /// Invoke all calls of one turn concurrently.
    ///
    /// Results come back in request order whatever order the tools finish in.
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        futures::future::join_all(calls.iter().map(|call| self.invoke(call))).await
    }

    /// Get all tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Calculator tool - evaluates arithmetic expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculate".into(),
            description: "Evaluate an arithmetic expression with + - * / ^ and parentheses".into(),
            parameters: vec![ParameterSchema::required(
                "expression",
                ParamType::String,
                "Expression to evaluate (e.g., '(120 + 80) * 3')",
            )],
            category: Some("math".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value> {
        let expr = call.require_str("expression")?;
        let result = evaluate_expression(expr).map_err(AgentError::ToolValidation)?;
        Ok(serde_json::json!({ "expression": expr, "result": result }))
    }
}

/// Recursive-descent evaluator over `+ - * / ^`, unary minus and parentheses
pub fn evaluate_expression(expr: &str) -> std::result::Result<f64, String> {
    let tokens: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if tokens.is_empty() {
        return Err("Empty expression".into());
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let value = parser.sum()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("Unexpected '{}' at position {}", parser.tokens[parser.pos], parser.pos));
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err("Result is not a finite number".into())
    }
}

struct ExprParser {
    tokens: Vec<char>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn sum(&mut self) -> std::result::Result<f64, String> {
        let mut acc = self.product()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.product()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn product(&mut self) -> std::result::Result<f64, String> {
        let mut acc = self.power()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.power()?;
            if op == '/' {
                if rhs == 0.0 {
                    return Err("Division by zero".into());
                }
                acc /= rhs;
            } else {
                acc *= rhs;
            }
        }
        Ok(acc)
    }

    // right-associative
    fn power(&mut self) -> std::result::Result<f64, String> {
        let base = self.unary()?;
        if self.peek() == Some('^') {
            self.pos += 1;
            let exp = self.power()?;
            return Ok(base.powf(exp));
        }
        Ok(base)
    }

    fn unary(&mut self) -> std::result::Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> std::result::Result<f64, String> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.sum()?;
                if self.peek() != Some(')') {
                    return Err("Missing closing parenthesis".into());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                    self.pos += 1;
                }
                let literal: String = self.tokens[start..self.pos].iter().collect();
                literal.parse::<f64>().map_err(|e| format!("Invalid number '{literal}': {e}"))
            }
            Some(c) => Err(format!("Unexpected '{c}' at position {}", self.pos)),
            None => Err("Unexpected end of expression".into()),
        }
    }
}
