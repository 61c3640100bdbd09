use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use resetline_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "config";

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    precedence: &'static str,
    entries: Vec<ConfigEntry>,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let sources = SourceResolver::new(config_file_path);
    let entries = effective_values(&config)
        .into_iter()
        .map(|(key, env_keys, value)| ConfigEntry {
            key,
            value,
            source: sources.resolve(key, env_keys),
        })
        .collect();

    CommandResult::report(COMMAND, ConfigReport { precedence: "env > file > default", entries })
}

type EffectiveValue = (&'static str, &'static [&'static str], String);

fn entry(key: &'static str, env_keys: &'static [&'static str], value: String) -> EffectiveValue {
    (key, env_keys, value)
}

fn effective_values(config: &AppConfig) -> Vec<EffectiveValue> {
    let api_key = if config.has_api_key() { "<redacted>" } else { "<unset>" };

    vec![
        entry("llm.api_key", &["RESETLINE_LLM_API_KEY", "OPENAI_API_KEY"], api_key.to_string()),
        entry("llm.base_url", &["RESETLINE_LLM_BASE_URL"], config.llm.base_url.clone()),
        entry("llm.model", &["RESETLINE_LLM_MODEL"], config.llm.model.clone()),
        entry(
            "llm.temperature",
            &["RESETLINE_LLM_TEMPERATURE"],
            config.llm.temperature.to_string(),
        ),
        entry(
            "llm.timeout_secs",
            &["RESETLINE_LLM_TIMEOUT_SECS"],
            config.llm.timeout_secs.to_string(),
        ),
        entry(
            "speech.transcription_model",
            &["RESETLINE_SPEECH_TRANSCRIPTION_MODEL"],
            config.speech.transcription_model.clone(),
        ),
        entry(
            "speech.speech_model",
            &["RESETLINE_SPEECH_MODEL"],
            config.speech.speech_model.clone(),
        ),
        entry("speech.voice", &["RESETLINE_SPEECH_VOICE"], config.speech.voice.clone()),
        entry(
            "audio.sample_rate",
            &["RESETLINE_AUDIO_SAMPLE_RATE"],
            config.audio.sample_rate.to_string(),
        ),
        entry("audio.channels", &["RESETLINE_AUDIO_CHANNELS"], config.audio.channels.to_string()),
        entry(
            "audio.sample_width",
            &["RESETLINE_AUDIO_SAMPLE_WIDTH"],
            config.audio.sample_width.to_string(),
        ),
        entry(
            "audio.max_recording_seconds",
            &["RESETLINE_AUDIO_MAX_RECORDING_SECONDS"],
            config.audio.max_recording_seconds.to_string(),
        ),
        entry("router.keywords", &["RESETLINE_ROUTER_KEYWORDS"], config.router.keywords.join(", ")),
        entry(
            "router.clarification_markers",
            &["RESETLINE_ROUTER_CLARIFICATION_MARKERS"],
            config.router.clarification_markers.join(", "),
        ),
        entry(
            "router.always_treat_as_reset",
            &["RESETLINE_ROUTER_ALWAYS_TREAT_AS_RESET"],
            config.router.always_treat_as_reset.to_string(),
        ),
        entry(
            "tool.min_delay_ms",
            &["RESETLINE_TOOL_MIN_DELAY_MS"],
            config.tool.min_delay_ms.to_string(),
        ),
        entry(
            "tool.max_delay_ms",
            &["RESETLINE_TOOL_MAX_DELAY_MS"],
            config.tool.max_delay_ms.to_string(),
        ),
        entry(
            "logging.level",
            &["RESETLINE_LOGGING_LEVEL", "RESETLINE_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        entry(
            "logging.format",
            &["RESETLINE_LOGGING_FORMAT", "RESETLINE_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
        ),
    ]
}

struct SourceResolver {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl SourceResolver {
    fn new(path: Option<PathBuf>) -> Self {
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn resolve(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env_is_set(key)) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

/// Blank values are ignored by the config loader, so they never count as a source.
fn env_is_set(key: &str) -> bool {
    env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("resetline.toml"), PathBuf::from("config/resetline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
