use resetline_agent::llm::ToolDefinition;
use resetline_agent::ToolRegistry;
use resetline_core::config::LoadOptions;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "tools";

#[derive(Debug, Serialize)]
struct ToolsReport {
    tools: Vec<ToolDefinition>,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let registry = ToolRegistry::with_password_reset(&config.tool);
    CommandResult::report(COMMAND, ToolsReport { tools: registry.definitions() })
}
