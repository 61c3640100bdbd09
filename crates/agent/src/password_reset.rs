//! Mock password-reset backend.
//!
//! Always succeeds. Identity is not validated: this is a demo stand-in, not an
//! authentication boundary.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::Rng;
use resetline_core::config::ToolConfig;
use resetline_core::ResetOutcome;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::llm::ToolDefinition;
use crate::tools::{Tool, ToolRegistry};

pub const RESET_PASSWORD_TOOL: &str = "reset_password";
pub const CREDENTIAL_LENGTH: usize = 12;
pub const CREDENTIAL_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
pub const RESET_SUCCESS_MESSAGE: &str =
    "Password reset successful. Please use the temporary password to login.";

/// Simulated backend latency, sampled uniformly from `min..=max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetDelay {
    min: Duration,
    max: Duration,
}

impl ResetDelay {
    /// Bounds are swapped if given in the wrong order.
    pub fn uniform(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self { min: delay, max: delay }
    }

    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }

        let min_us = u64::try_from(self.min.as_micros()).unwrap_or(u64::MAX);
        let max_us = u64::try_from(self.max.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(rand::thread_rng().gen_range(min_us..=max_us))
    }
}

impl Default for ResetDelay {
    fn default() -> Self {
        Self::uniform(Duration::from_millis(200), Duration::from_millis(500))
    }
}

impl From<&ToolConfig> for ResetDelay {
    fn from(config: &ToolConfig) -> Self {
        Self::uniform(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct PasswordResetTool {
    delay: ResetDelay,
}

impl PasswordResetTool {
    pub fn new(delay: ResetDelay) -> Self {
        Self { delay }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(ResetDelay::from(config))
    }

    pub async fn execute(&self, user_id: Option<&str>) -> ResetOutcome {
        let started = Instant::now();
        let delay = self.delay.sample();
        tokio::time::sleep(delay).await;

        let credential = generate_temporary_credential();
        info!(
            event_name = "agent.tool.password_reset.completed",
            user_id_present = user_id.is_some(),
            simulated_delay_ms = delay.as_millis() as u64,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "temporary credential issued"
        );

        ResetOutcome::success(RESET_SUCCESS_MESSAGE, credential)
    }
}

impl ToolRegistry {
    /// Registry holding only the password-reset tool.
    pub fn with_password_reset(config: &ToolConfig) -> Self {
        let mut tools = Self::default();
        tools.register(PasswordResetTool::from_config(config));
        tools
    }
}

#[derive(Debug, Default, Deserialize)]
struct ResetPasswordArguments {
    #[serde(default)]
    user_id: Option<String>,
}

/// Malformed arguments are treated as "no user id".
fn parse_user_id(arguments_json: &str) -> Option<String> {
    if arguments_json.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<ResetPasswordArguments>(arguments_json) {
        Ok(arguments) => arguments.user_id.filter(|user_id| !user_id.trim().is_empty()),
        Err(error) => {
            warn!(
                event_name = "agent.tool.password_reset.malformed_arguments",
                error = %error,
                "ignoring unparseable tool arguments"
            );
            None
        }
    }
}

#[async_trait]
impl Tool for PasswordResetTool {
    fn name(&self) -> &'static str {
        RESET_PASSWORD_TOOL
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: RESET_PASSWORD_TOOL.to_string(),
            description: "Reset the user's password and issue a temporary password.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "user_id": {
                        "type": "string",
                        "description": "Identifier of the user whose password should be reset, if known."
                    }
                },
                "required": []
            }),
        }
    }

    async fn invoke(&self, arguments_json: &str) -> ResetOutcome {
        let user_id = parse_user_id(arguments_json);
        self.execute(user_id.as_deref()).await
    }
}

/// Draws from the operating system CSPRNG; `gen_range` rejects out-of-range
/// samples so every alphabet symbol is equally likely.
pub fn generate_temporary_credential() -> String {
    (0..CREDENTIAL_LENGTH)
        .map(|_| {
            let idx = OsRng.gen_range(0..CREDENTIAL_ALPHABET.len());
            CREDENTIAL_ALPHABET[idx] as char
        })
        .collect()
}
