//! Intent routing and tool dispatch.
//!
//! One utterance becomes exactly one [`ResetOutcome`]:
//! 1. blank input is refused locally,
//! 2. the keyword gate refuses out-of-domain chatter without a model call,
//! 3. the model is asked once, with every registered tool advertised,
//! 4. at most one tool call is executed; plain text becomes either a
//!    clarifying question or a polite refusal,
//! 5. transport failures degrade to a retry message.
//!
//! `route` never returns an error to its caller.

use std::sync::Arc;

use resetline_core::config::AppConfig;
use resetline_core::{IntegrationError, IntentDecision, ResetOutcome, ToolCallRequest};
use tracing::{info, warn};
use uuid::Uuid;

use crate::gate::{GateVerdict, IntentGate};
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmClient, ToolChoice};
use crate::password_reset::RESET_PASSWORD_TOOL;
use crate::tools::ToolRegistry;

pub const SYSTEM_PROMPT: &str = "You are a helpful voice assistant for customer support. \
Your only task is helping users reset their passwords. \
Requests such as \"reset my password\", \"I forgot my password\", \"I can't log in\", \
\"I'm locked out of my account\", \"I'm having trouble logging in\" or \
\"I need a new password\" are password reset requests: call the reset_password tool for them. \
If it is unclear whether the user wants a password reset, ask one short clarifying question \
instead of calling the tool. \
Keep responses short and clear because they will be spoken aloud.";

pub const UNPROCESSED_MESSAGE: &str =
    "I'm sorry, I couldn't process your password reset request. Please try again.";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "I'm sorry, I'm having trouble processing your request right now. Please try again in a moment.";

pub struct IntentRouter {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    gate: IntentGate,
    model: String,
    temperature: f32,
    always_treat_as_reset: bool,
}

impl IntentRouter {
    pub fn new(config: &AppConfig, llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        Self {
            llm,
            tools,
            gate: IntentGate::from_config(&config.router),
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            always_treat_as_reset: config.router.always_treat_as_reset,
        }
    }

    /// Router with the password-reset tool registered, delay taken from
    /// `config.tool`.
    pub fn with_password_reset(config: &AppConfig, llm: Arc<dyn LlmClient>) -> Self {
        Self::new(config, llm, ToolRegistry::with_password_reset(&config.tool))
    }

    /// Local keyword gate. No I/O.
    pub fn classify(&self, utterance: &str) -> GateVerdict {
        self.gate.evaluate(utterance)
    }

    /// Single model round trip, interpreted into a decision.
    pub async fn dispatch(&self, utterance: &str) -> Result<IntentDecision, IntegrationError> {
        let request = self.completion_request(utterance);
        let response = self.llm.complete(&request).await?;
        Ok(self.interpret(response))
    }

    pub fn completion_request(&self, utterance: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            system_prompt: SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage::user(utterance)],
            tools: self.tools.definitions(),
            tool_choice: ToolChoice::Auto,
        }
    }

    pub fn interpret(&self, response: CompletionResponse) -> IntentDecision {
        if let Some(call) = self.select_tool_call(&response.tool_calls) {
            return IntentDecision::ToolInvocation {
                tool_name: call.function_name.clone(),
                arguments_json: call.arguments_json.clone(),
            };
        }

        if self.always_treat_as_reset && self.tools.contains(RESET_PASSWORD_TOOL) {
            warn!(
                event_name = "agent.router.forced_tool_invocation",
                "model did not call a tool; always_treat_as_reset forces reset_password"
            );
            return IntentDecision::ToolInvocation {
                tool_name: RESET_PASSWORD_TOOL.to_string(),
                arguments_json: "{}".to_string(),
            };
        }

        match response.content.as_deref().map(str::trim) {
            Some(content) if !content.is_empty() && self.gate.is_clarification(content) => {
                IntentDecision::NeedsClarification { message: content.to_string() }
            }
            _ => IntentDecision::Rejected { reason: UNPROCESSED_MESSAGE.to_string() },
        }
    }

    pub async fn route(&self, utterance: &str) -> ResetOutcome {
        let correlation_id = Uuid::new_v4().to_string();

        let verdict = self.classify(utterance);
        if let Some(message) = verdict.refusal_message() {
            info!(
                event_name = "agent.router.gate_rejected",
                correlation_id = %correlation_id,
                verdict = ?verdict,
                "utterance did not reach the model"
            );
            return ResetOutcome::refusal(message);
        }
        info!(
            event_name = "agent.router.gate_passed",
            correlation_id = %correlation_id,
            verdict = ?verdict,
            "utterance passed the keyword gate"
        );

        let decision = match self.dispatch(utterance).await {
            Ok(decision) => decision,
            Err(error) => {
                warn!(
                    event_name = "agent.router.model_unavailable",
                    correlation_id = %correlation_id,
                    error = %error,
                    "model round trip failed; degrading to refusal"
                );
                return ResetOutcome::refusal(SERVICE_UNAVAILABLE_MESSAGE);
            }
        };
        info!(
            event_name = "agent.router.decision",
            correlation_id = %correlation_id,
            decision = decision.kind(),
            "model output interpreted"
        );

        match decision {
            IntentDecision::Rejected { reason } => ResetOutcome::refusal(reason),
            IntentDecision::NeedsClarification { message } => ResetOutcome::refusal(message),
            IntentDecision::ToolInvocation { tool_name, arguments_json } => {
                let Some(tool) = self.tools.get(&tool_name) else {
                    warn!(
                        event_name = "agent.router.unknown_tool",
                        correlation_id = %correlation_id,
                        tool_name = %tool_name,
                        "decision named a tool that is not registered"
                    );
                    return ResetOutcome::refusal(UNPROCESSED_MESSAGE);
                };

                let outcome = tool.invoke(&arguments_json).await;
                info!(
                    event_name = "agent.router.tool_completed",
                    correlation_id = %correlation_id,
                    tool_name = %tool_name,
                    success = outcome.is_success(),
                    "tool invocation finished"
                );
                outcome
            }
        }
    }

    /// First call naming a registered tool. Later calls in the same response
    /// are dropped so a tool fires at most once per utterance.
    fn select_tool_call<'a>(&self, calls: &'a [ToolCallRequest]) -> Option<&'a ToolCallRequest> {
        let selected = calls.iter().position(|call| self.tools.contains(&call.function_name));

        for (index, call) in calls.iter().enumerate() {
            if Some(index) == selected {
                continue;
            }
            let reason = if self.tools.contains(&call.function_name) {
                "duplicate"
            } else {
                "unregistered"
            };
            warn!(
                event_name = "agent.router.tool_call_ignored",
                tool_call_id = %call.id,
                function_name = %call.function_name,
                reason,
                "ignoring tool call"
            );
        }

        selected.map(|index| &calls[index])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use resetline_core::config::AppConfig;
    use resetline_core::{IntegrationError, IntentDecision, ToolCallRequest};

    use super::{IntentRouter, UNPROCESSED_MESSAGE};
    use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, ToolChoice};

    struct Unreachable;

    #[async_trait]
    impl LlmClient for Unreachable {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, IntegrationError> {
            Err(IntegrationError::Transport("unreachable".to_string()))
        }
    }

    fn router(config: &AppConfig) -> IntentRouter {
        IntentRouter::with_password_reset(config, Arc::new(Unreachable))
    }

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            function_name: name.to_string(),
            arguments_json: format!("{{\"user_id\":\"{id}\"}}"),
        }
    }

    #[test]
    fn request_advertises_registered_tools_with_auto_choice() {
        let config = AppConfig::default();
        let request = router(&config).completion_request("reset my password");

        assert_eq!(request.model, config.llm.model);
        assert_eq!(request.tool_choice, ToolChoice::Auto);
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].name, "reset_password");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "reset my password");
        assert!(request.system_prompt.contains("reset_password"));
    }

    #[test]
    fn first_registered_tool_call_wins() {
        let config = AppConfig::default();
        let decision = router(&config).interpret(CompletionResponse::with_tool_calls(vec![
            call("a", "lookup_weather"),
            call("b", "reset_password"),
            call("c", "reset_password"),
        ]));

        assert_eq!(
            decision,
            IntentDecision::ToolInvocation {
                tool_name: "reset_password".to_string(),
                arguments_json: "{\"user_id\":\"b\"}".to_string(),
            }
        );
    }

    #[test]
    fn only_unregistered_calls_fall_back_to_content() {
        let config = AppConfig::default();
        let response = CompletionResponse {
            content: Some("Could you confirm your account email?".to_string()),
            tool_calls: vec![call("a", "delete_account")],
        };

        assert_eq!(
            router(&config).interpret(response),
            IntentDecision::NeedsClarification {
                message: "Could you confirm your account email?".to_string()
            }
        );
    }

    #[test]
    fn unrelated_text_is_rejected() {
        let config = AppConfig::default();

        assert_eq!(
            router(&config).interpret(CompletionResponse::text("It is sunny today.")),
            IntentDecision::Rejected { reason: UNPROCESSED_MESSAGE.to_string() }
        );
        assert_eq!(
            router(&config).interpret(CompletionResponse::default()),
            IntentDecision::Rejected { reason: UNPROCESSED_MESSAGE.to_string() }
        );
    }

    #[test]
    fn always_treat_as_reset_forces_the_tool() {
        let mut config = AppConfig::default();
        config.router.always_treat_as_reset = true;

        assert_eq!(
            router(&config).interpret(CompletionResponse::text("It is sunny today.")),
            IntentDecision::ToolInvocation {
                tool_name: "reset_password".to_string(),
                arguments_json: "{}".to_string(),
            }
        );
    }
}
