//! Conversation State
//!
//! Typed turn history owned by a single orchestration run. Every tool request
//! the assistant emits must be answered by exactly one tool result before the
//! next assistant or user turn is accepted; the push methods enforce this.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AgentError, Result};
use crate::tool::{ToolCall, ToolResult};

/// What the model produced for one step: free text or tool requests, never both
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AssistantMessage {
    Text(String),
    ToolRequests(Vec<ToolCall>),
}

impl AssistantMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }
}

/// One exchange unit in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "turn", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Assistant { message: AssistantMessage },
    ToolResult { result: ToolResult },
}

/// Ordered turn history
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a question alone
    pub fn from_question(question: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::User { text: question.into() }],
        }
    }

    /// Replay caller-supplied history, then append the new question
    pub fn seeded<I>(history: I, question: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = Turn>,
    {
        let mut conversation = Self::new();
        for turn in history {
            conversation.push(turn)?;
        }
        conversation.push_user(question)?;
        Ok(conversation)
    }

    /// Append any turn, checking the request/result pairing
    pub fn push(&mut self, turn: Turn) -> Result<()> {
        match turn {
            Turn::User { text } => self.push_user(text),
            Turn::Assistant { message } => self.push_assistant(message),
            Turn::ToolResult { result } => self.push_tool_result(result),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> Result<()> {
        self.ensure_no_pending("user message")?;
        self.turns.push(Turn::User { text: text.into() });
        Ok(())
    }

    pub fn push_assistant(&mut self, message: AssistantMessage) -> Result<()> {
        self.ensure_no_pending("assistant message")?;

        if let AssistantMessage::ToolRequests(calls) = &message {
            if calls.is_empty() {
                return Err(AgentError::Conversation("Tool request turn without calls".into()));
            }
            let mut seen = HashSet::new();
            for call in calls {
                if !seen.insert(call.id.as_str()) {
                    return Err(AgentError::Conversation(format!(
                        "Duplicate tool call id '{}' in one turn",
                        call.id
                    )));
                }
            }
        }

        self.turns.push(Turn::Assistant { message });
        Ok(())
    }

    pub fn push_tool_result(&mut self, result: ToolResult) -> Result<()> {
        if !self.pending_call_ids().contains(&result.id.as_str()) {
            return Err(AgentError::Conversation(format!(
                "Tool result '{}' does not answer a pending request",
                result.id
            )));
        }
        self.turns.push(Turn::ToolResult { result });
        Ok(())
    }

    /// Call ids of the latest tool request turn that have no result yet
    pub fn pending_call_ids(&self) -> Vec<&str> {
        let Some(start) = self.turns.iter().rposition(|t| {
            matches!(t, Turn::Assistant { message: AssistantMessage::ToolRequests(_) })
        }) else {
            return Vec::new();
        };

        let Turn::Assistant { message: AssistantMessage::ToolRequests(calls) } = &self.turns[start] else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.turns[start + 1..]
            .iter()
            .filter_map(|t| match t {
                Turn::ToolResult { result } => Some(result.id.as_str()),
                _ => None,
            })
            .collect();

        calls
            .iter()
            .map(|c| c.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }

    fn ensure_no_pending(&self, what: &str) -> Result<()> {
        let pending = self.pending_call_ids();
        if pending.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Conversation(format!(
                "Cannot append {what}: tool calls {pending:?} are unanswered"
            )))
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Total tool calls requested over the whole conversation
    pub fn tool_call_count(&self) -> usize {
        self.turns
            .iter()
            .map(|t| match t {
                Turn::Assistant { message: AssistantMessage::ToolRequests(calls) } => calls.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolFailureKind;
    use std::collections::HashMap;

    fn call(name: &str, id: &str) -> ToolCall {
        ToolCall::new(name, HashMap::new()).with_id(id)
    }

    #[test]
    fn test_conversation() {
        let mut conv = Conversation::from_question("Hi");
        conv.push_assistant(AssistantMessage::text("Hello!")).unwrap();
        assert_eq!(conv.len(), 2);
        assert!(matches!(conv.last(), Some(Turn::Assistant { .. })));
    }

    #[test]
    fn test_requests_must_be_answered_before_next_assistant_turn() {
        let mut conv = Conversation::from_question("Weather?");
        let weather = call("get_current_weather", "w1");
        let fx = call("convert_currency", "c1");
        conv.push_assistant(AssistantMessage::ToolRequests(vec![weather.clone(), fx.clone()]))
            .unwrap();

        assert_eq!(conv.pending_call_ids(), vec!["w1", "c1"]);
        assert!(conv.push_assistant(AssistantMessage::text("done")).is_err());

        conv.push_tool_result(ToolResult::success(&fx, serde_json::json!(1))).unwrap();
        assert_eq!(conv.pending_call_ids(), vec!["w1"]);
        assert!(conv.push_user("again").is_err());

        conv.push_tool_result(ToolResult::failure(&weather, ToolFailureKind::Timeout, "slow"))
            .unwrap();
        assert!(conv.pending_call_ids().is_empty());
        conv.push_assistant(AssistantMessage::text("done")).unwrap();
        assert_eq!(conv.tool_call_count(), 2);
    }

    #[test]
    fn test_rejects_unmatched_and_duplicate_results() {
        let mut conv = Conversation::from_question("q");
        let c = call("calculate", "x");
        assert!(conv.push_tool_result(ToolResult::success(&c, serde_json::json!(0))).is_err());

        conv.push_assistant(AssistantMessage::ToolRequests(vec![c.clone()])).unwrap();
        conv.push_tool_result(ToolResult::success(&c, serde_json::json!(0))).unwrap();
        assert!(conv.push_tool_result(ToolResult::success(&c, serde_json::json!(0))).is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids_in_one_turn() {
        let mut conv = Conversation::from_question("q");
        let turn = AssistantMessage::ToolRequests(vec![call("a", "same"), call("b", "same")]);
        assert!(conv.push_assistant(turn).is_err());
        assert!(conv.push_assistant(AssistantMessage::ToolRequests(vec![])).is_err());
    }

    #[test]
    fn test_seeded_history() {
        let history = vec![
            Turn::User { text: "Trip to Rome?".into() },
            Turn::Assistant { message: AssistantMessage::text("Sure, how long?") },
        ];
        let conv = Conversation::seeded(history, "Three days").unwrap();
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.last(), Some(&Turn::User { text: "Three days".into() }));
    }
}
