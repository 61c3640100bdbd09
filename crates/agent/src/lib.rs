//! Intent routing and tool dispatch for the resetline voice assistant.
//!
//! The agent follows a constrained loop:
//! 1. **Gate** (`gate`) - cheap keyword filter, blocks out-of-domain chatter
//! 2. **Model round trip** (`llm`, `openai`) - one completion with tools advertised
//! 3. **Dispatch** (`router`) - interpret the reply, fire at most one tool
//! 4. **Tool** (`tools`, `password_reset`) - mock credential reset
//!
//! # Key Types
//!
//! - `IntentRouter` - main orchestrator (see `router` module)
//! - `LlmClient` - pluggable language-model capability
//! - `ToolRegistry` - name to tool mapping advertised to the model

pub mod gate;
pub mod llm;
pub mod openai;
pub mod password_reset;
pub mod router;
pub mod tools;

pub use gate::{GateVerdict, IntentGate};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient};
pub use openai::OpenAiClient;
pub use password_reset::{PasswordResetTool, ResetDelay};
pub use router::IntentRouter;
pub use tools::{Tool, ToolRegistry};
