use std::sync::Arc;

use resetline_agent::{IntentRouter, OpenAiClient};
use resetline_core::config::LoadOptions;
use resetline_core::ResetOutcome;
use serde::Serialize;

use crate::commands::{load_config, runtime, CommandResult, EXIT_RUNTIME_FAILURE};

const COMMAND: &str = "text";

#[derive(Debug, Serialize)]
struct TextReport<'a> {
    utterance: &'a str,
    outcome: ResetOutcome,
    response_text: String,
}

pub fn run(options: LoadOptions, utterance: &str) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let llm = match OpenAiClient::from_config(&config.llm) {
        Ok(llm) => llm,
        Err(error) => return CommandResult::from_application_error(COMMAND, &error),
    };
    let router = IntentRouter::with_password_reset(&config, Arc::new(llm));

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("{error:#}"),
                EXIT_RUNTIME_FAILURE,
            )
        }
    };

    let outcome = runtime.block_on(router.route(utterance));
    let response_text = outcome.spoken_response();
    CommandResult::report(COMMAND, TextReport { utterance, outcome, response_text })
}
