use serde::{Deserialize, Serialize};

/// Structured function call emitted by the language model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub function_name: String,
    pub arguments_json: String,
}

/// What the router decided to do with one utterance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntentDecision {
    Rejected { reason: String },
    NeedsClarification { message: String },
    ToolInvocation { tool_name: String, arguments_json: String },
}

impl IntentDecision {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "rejected",
            Self::NeedsClarification { .. } => "needs_clarification",
            Self::ToolInvocation { .. } => "tool_invocation",
        }
    }
}
