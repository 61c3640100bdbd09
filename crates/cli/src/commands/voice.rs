use std::path::{Path, PathBuf};
use std::sync::Arc;

use resetline_agent::{IntentRouter, OpenAiClient};
use resetline_core::config::{AppConfig, LoadOptions};
use resetline_core::ApplicationError;
use resetline_voice::{OpenAiSpeech, TurnReport, VoicePipeline, WavFileDevice};
use serde::Serialize;

use crate::commands::{load_config, runtime, CommandResult, EXIT_RUNTIME_FAILURE};

const COMMAND: &str = "voice";

#[derive(Debug, Serialize)]
struct VoiceReport {
    input: String,
    output: String,
    #[serde(flatten)]
    turn: TurnReport,
}

pub fn run(options: LoadOptions, input: PathBuf, output: PathBuf) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let pipeline = match build_pipeline(&config, &input, &output) {
        Ok(pipeline) => pipeline,
        Err(error) => return CommandResult::from_application_error(COMMAND, &error),
    };

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

    match runtime.block_on(pipeline.run_turn()) {
        Ok(turn) => CommandResult::report(
            COMMAND,
            VoiceReport {
                input: input.display().to_string(),
                output: output.display().to_string(),
                turn,
            },
        ),
        Err(error) => CommandResult::from_application_error(COMMAND, &error),
    }
}

fn build_pipeline(
    config: &AppConfig,
    input: &Path,
    output: &Path,
) -> Result<VoicePipeline, ApplicationError> {
    let llm = Arc::new(OpenAiClient::from_config(&config.llm)?);
    let speech = Arc::new(OpenAiSpeech::from_config(config)?);
    let device = Arc::new(WavFileDevice::new(input, output, &config.audio));
    let router = Arc::new(IntentRouter::with_password_reset(config, llm));

    Ok(VoicePipeline::new(config, device, speech.clone(), speech, router))
}
