pub mod config;
pub mod text;
pub mod tools;
pub mod voice;

use resetline_core::config::{AppConfig, LoadOptions};
use resetline_core::ApplicationError;
use serde::Serialize;

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONFIG_FAILURE: u8 = 2;
pub const EXIT_RUNTIME_FAILURE: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommandReport<T> {
    command: String,
    status: String,
    #[serde(flatten)]
    body: T,
}

impl CommandResult {
    /// Successful result whose fields are merged into the top-level document.
    pub fn report<T: Serialize>(command: &str, body: T) -> Self {
        let payload =
            CommandReport { command: command.to_string(), status: "ok".to_string(), body };
        Self { exit_code: EXIT_OK, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            user_message: None,
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    /// Configuration problems exit with 2, everything else with 3. The
    /// document also carries the end-user sentence for the error class.
    pub fn from_application_error(command: &str, error: &ApplicationError) -> Self {
        let (error_class, message, exit_code) = match error {
            ApplicationError::Configuration(message) => {
                ("config_validation", message.clone(), EXIT_CONFIG_FAILURE)
            }
            other => (other.error_class(), other.to_string(), EXIT_RUNTIME_FAILURE),
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message,
            user_message: Some(error.user_message().to_string()),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

/// Loads configuration and installs logging, or yields the failure result.
pub(crate) fn load_config(command: &str, options: LoadOptions) -> Result<AppConfig, CommandResult> {
    match AppConfig::load(options) {
        Ok(config) => {
            crate::init_logging(&config);
            Ok(config)
        }
        Err(error) => Err(CommandResult::failure(
            command,
            "config_validation",
            format!("config validation failed: {error}"),
            EXIT_CONFIG_FAILURE,
        )),
    }
}

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    use anyhow::Context;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn serialize_payload<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        let message = error.to_string().replace('\\', "\\\\").replace('"', "\\\"");
        format!(
            concat!(
                "{{\"command\":\"unknown\",\"status\":\"error\",",
                "\"error_class\":\"serialization\",\"message\":\"{}\"}}"
            ),
            message
        )
    })
}
