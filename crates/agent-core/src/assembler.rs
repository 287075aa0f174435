//! Response Assembler
//!
//! Total mapping from [`LoopOutcome`] to the answer a caller sees. Aborted runs
//! become a degraded answer with a human-readable explanation, never an empty
//! body or a raw upstream error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::orchestrator::{AbortReason, LoopOutcome};

pub const DEGRADED_PREFIX: &str = "Sorry, I couldn't put together your travel plan this time.";

/// Whether the request was fully satisfied
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Success,
    Degraded,
}

/// External classification of abort reasons
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Timeout,
    UpstreamModelError,
    ExceededToolBudget,
}

impl ErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::UpstreamModelError => "upstream-model-error",
            Self::ExceededToolBudget => "exceeded-tool-budget",
        }
    }

    const fn explanation(self) -> &'static str {
        match self {
            Self::Timeout => "The request took too long to process. Please try again, perhaps with a simpler request.",
            Self::UpstreamModelError => {
                "The planning assistant is having trouble with its language model. Please try again shortly."
            }
            Self::ExceededToolBudget => {
                "The request needed more lookups than allowed. Please try a more specific question."
            }
        }
    }
}

impl From<AbortReason> for ErrorCategory {
    fn from(reason: AbortReason) -> Self {
        match reason {
            AbortReason::Timeout => Self::Timeout,
            AbortReason::ModelUnavailable | AbortReason::MalformedResponse => Self::UpstreamModelError,
            AbortReason::ToolLoopExceeded => Self::ExceededToolBudget,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller-facing answer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAnswer {
    /// Markdown itinerary, or the degraded explanation
    pub answer: String,
    pub status: AnswerStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorCategory>,
}

impl ExternalAnswer {
    pub const fn is_success(&self) -> bool {
        matches!(self.status, AnswerStatus::Success)
    }
}

/// Assemble the external answer, stamped now
pub fn assemble(outcome: LoopOutcome) -> ExternalAnswer {
    assemble_at(outcome, Utc::now())
}

pub fn assemble_at(outcome: LoopOutcome, timestamp: DateTime<Utc>) -> ExternalAnswer {
    match outcome {
        LoopOutcome::FinalAnswer(answer) => ExternalAnswer {
            answer,
            status: AnswerStatus::Success,
            timestamp,
            reason: None,
        },
        LoopOutcome::Aborted(reason) => {
            let category = ErrorCategory::from(reason);
            ExternalAnswer {
                answer: format!("{DEGRADED_PREFIX} {}", category.explanation()),
                status: AnswerStatus::Degraded,
                timestamp,
                reason: Some(category),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_answer_is_verbatim() {
        let text = "# 3 days in Lisbon\n\n| Day | Plan |\n|---|---|";
        let answer = assemble(LoopOutcome::FinalAnswer(text.into()));
        assert_eq!(answer.status, AnswerStatus::Success);
        assert_eq!(answer.answer, text);
        assert_eq!(answer.reason, None);
    }

    #[test]
    fn test_every_abort_is_degraded_and_categorized() {
        let cases = [
            (AbortReason::Timeout, ErrorCategory::Timeout),
            (AbortReason::ModelUnavailable, ErrorCategory::UpstreamModelError),
            (AbortReason::MalformedResponse, ErrorCategory::UpstreamModelError),
            (AbortReason::ToolLoopExceeded, ErrorCategory::ExceededToolBudget),
        ];
        for (reason, category) in cases {
            let answer = assemble(LoopOutcome::Aborted(reason));
            assert_eq!(answer.status, AnswerStatus::Degraded);
            assert_eq!(answer.reason, Some(category));
            assert!(answer.answer.starts_with(DEGRADED_PREFIX));
            assert!(answer.answer.len() > DEGRADED_PREFIX.len());
        }
    }

    #[test]
    fn test_wire_format() {
        let answer = assemble(LoopOutcome::Aborted(AbortReason::MalformedResponse));
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reason"], "upstream-model-error");

        let ok = serde_json::to_value(assemble(LoopOutcome::FinalAnswer("hi".into()))).unwrap();
        assert_eq!(ok["status"], "success");
        assert!(ok.get("reason").is_none());
    }
}
