use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_GATE_KEYWORDS: &[&str] = &[
    "password",
    "reset",
    "forgot",
    "credentials",
    "login",
    "can't log in",
    "locked out",
    "trouble logging in",
    "issues",
    "can't access",
    "need a new password",
];

/// Words marking free model text as an account clarifying question.
/// Credential and identity nouns only, no generic verbs.
pub const DEFAULT_CLARIFICATION_MARKERS: &[&str] = &[
    "password",
    "reset",
    "login",
    "log in",
    "credentials",
    "account",
    "email",
    "username",
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
    pub audio: AudioConfig,
    pub router: RouterConfig,
    pub tool: ToolConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SpeechConfig {
    pub transcription_model: String,
    pub speech_model: String,
    pub voice: String,
}

#[derive(Clone, Debug)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_width: u16,
    pub max_recording_seconds: u32,
}

#[derive(Clone, Debug)]
pub struct RouterConfig {
    pub keywords: Vec<String>,
    pub clarification_markers: Vec<String>,
    pub always_treat_as_reset: bool,
}

#[derive(Clone, Debug)]
pub struct ToolConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub log_level: Option<String>,
    pub always_treat_as_reset: Option<bool>,
    pub tool_min_delay_ms: Option<u64>,
    pub tool_max_delay_ms: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4-turbo".to_string(),
                temperature: 0.7,
                timeout_secs: 30,
            },
            speech: SpeechConfig {
                transcription_model: "whisper-1".to_string(),
                speech_model: "tts-1".to_string(),
                voice: "alloy".to_string(),
            },
            audio: AudioConfig {
                sample_rate: 16_000,
                channels: 1,
                sample_width: 2,
                max_recording_seconds: 30,
            },
            router: RouterConfig::default(),
            tool: ToolConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_GATE_KEYWORDS.iter().map(|keyword| keyword.to_string()).collect(),
            clarification_markers: DEFAULT_CLARIFICATION_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
            always_treat_as_reset: false,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self { min_delay_ms: 200, max_delay_ms: 500 }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("resetline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(speech) = patch.speech {
            if let Some(transcription_model) = speech.transcription_model {
                self.speech.transcription_model = transcription_model;
            }
            if let Some(speech_model) = speech.speech_model {
                self.speech.speech_model = speech_model;
            }
            if let Some(voice) = speech.voice {
                self.speech.voice = voice;
            }
        }

        if let Some(audio) = patch.audio {
            if let Some(sample_rate) = audio.sample_rate {
                self.audio.sample_rate = sample_rate;
            }
            if let Some(channels) = audio.channels {
                self.audio.channels = channels;
            }
            if let Some(sample_width) = audio.sample_width {
                self.audio.sample_width = sample_width;
            }
            if let Some(max_recording_seconds) = audio.max_recording_seconds {
                self.audio.max_recording_seconds = max_recording_seconds;
            }
        }

        if let Some(router) = patch.router {
            if let Some(keywords) = router.keywords {
                self.router.keywords = keywords;
            }
            if let Some(clarification_markers) = router.clarification_markers {
                self.router.clarification_markers = clarification_markers;
            }
            if let Some(always_treat_as_reset) = router.always_treat_as_reset {
                self.router.always_treat_as_reset = always_treat_as_reset;
            }
        }

        if let Some(tool) = patch.tool {
            if let Some(min_delay_ms) = tool.min_delay_ms {
                self.tool.min_delay_ms = min_delay_ms;
            }
            if let Some(max_delay_ms) = tool.max_delay_ms {
                self.tool.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let api_key = read_env("RESETLINE_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RESETLINE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("RESETLINE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("RESETLINE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("RESETLINE_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("RESETLINE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("RESETLINE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RESETLINE_SPEECH_TRANSCRIPTION_MODEL") {
            self.speech.transcription_model = value;
        }
        if let Some(value) = read_env("RESETLINE_SPEECH_MODEL") {
            self.speech.speech_model = value;
        }
        if let Some(value) = read_env("RESETLINE_SPEECH_VOICE") {
            self.speech.voice = value;
        }

        if let Some(value) = read_env("RESETLINE_AUDIO_SAMPLE_RATE") {
            self.audio.sample_rate = parse_u32("RESETLINE_AUDIO_SAMPLE_RATE", &value)?;
        }
        if let Some(value) = read_env("RESETLINE_AUDIO_CHANNELS") {
            self.audio.channels = parse_u16("RESETLINE_AUDIO_CHANNELS", &value)?;
        }
        if let Some(value) = read_env("RESETLINE_AUDIO_SAMPLE_WIDTH") {
            self.audio.sample_width = parse_u16("RESETLINE_AUDIO_SAMPLE_WIDTH", &value)?;
        }
        if let Some(value) = read_env("RESETLINE_AUDIO_MAX_RECORDING_SECONDS") {
            self.audio.max_recording_seconds =
                parse_u32("RESETLINE_AUDIO_MAX_RECORDING_SECONDS", &value)?;
        }

        if let Some(value) = read_env("RESETLINE_ROUTER_KEYWORDS") {
            self.router.keywords = split_list(&value);
        }
        if let Some(value) = read_env("RESETLINE_ROUTER_CLARIFICATION_MARKERS") {
            self.router.clarification_markers = split_list(&value);
        }
        if let Some(value) = read_env("RESETLINE_ROUTER_ALWAYS_TREAT_AS_RESET") {
            self.router.always_treat_as_reset =
                parse_bool("RESETLINE_ROUTER_ALWAYS_TREAT_AS_RESET", &value)?;
        }

        if let Some(value) = read_env("RESETLINE_TOOL_MIN_DELAY_MS") {
            self.tool.min_delay_ms = parse_u64("RESETLINE_TOOL_MIN_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("RESETLINE_TOOL_MAX_DELAY_MS") {
            self.tool.max_delay_ms = parse_u64("RESETLINE_TOOL_MAX_DELAY_MS", &value)?;
        }

        let log_level =
            read_env("RESETLINE_LOGGING_LEVEL").or_else(|| read_env("RESETLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RESETLINE_LOGGING_FORMAT").or_else(|| read_env("RESETLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(always_treat_as_reset) = overrides.always_treat_as_reset {
            self.router.always_treat_as_reset = always_treat_as_reset;
        }
        if let Some(min_delay_ms) = overrides.tool_min_delay_ms {
            self.tool.min_delay_ms = min_delay_ms;
        }
        if let Some(max_delay_ms) = overrides.tool_max_delay_ms {
            self.tool.max_delay_ms = max_delay_ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_speech(&self.speech)?;
        validate_audio(&self.audio)?;
        validate_router(&self.router)?;
        validate_tool(&self.tool)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("resetline.toml"), PathBuf::from("config/resetline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_speech(speech: &SpeechConfig) -> Result<(), ConfigError> {
    let fields = [
        ("speech.transcription_model", &speech.transcription_model),
        ("speech.speech_model", &speech.speech_model),
        ("speech.voice", &speech.voice),
    ];
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((key, _)) => Err(ConfigError::Validation(format!("{key} must not be empty"))),
        None => Ok(()),
    }
}

fn validate_audio(audio: &AudioConfig) -> Result<(), ConfigError> {
    if audio.sample_rate == 0 {
        return Err(ConfigError::Validation(
            "audio.sample_rate must be greater than zero".to_string(),
        ));
    }

    if !(1..=2).contains(&audio.channels) {
        return Err(ConfigError::Validation("audio.channels must be 1 or 2".to_string()));
    }

    if !matches!(audio.sample_width, 1..=4) {
        return Err(ConfigError::Validation(
            "audio.sample_width must be one of 1|2|3|4 bytes".to_string(),
        ));
    }

    if audio.max_recording_seconds == 0 {
        return Err(ConfigError::Validation(
            "audio.max_recording_seconds must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_router(router: &RouterConfig) -> Result<(), ConfigError> {
    if router.keywords.iter().all(|keyword| keyword.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "router.keywords must contain at least one non-empty keyword".to_string(),
        ));
    }

    Ok(())
}

fn validate_tool(tool: &ToolConfig) -> Result<(), ConfigError> {
    if tool.min_delay_ms > tool.max_delay_ms {
        return Err(ConfigError::Validation(
            "tool.min_delay_ms must not exceed tool.max_delay_ms".to_string(),
        ));
    }

    if tool.max_delay_ms > 60_000 {
        return Err(ConfigError::Validation(
            "tool.max_delay_ms must be at most 60000".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    speech: Option<SpeechPatch>,
    audio: Option<AudioPatch>,
    router: Option<RouterPatch>,
    tool: Option<ToolPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SpeechPatch {
    transcription_model: Option<String>,
    speech_model: Option<String>,
    voice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AudioPatch {
    sample_rate: Option<u32>,
    channels: Option<u16>,
    sample_width: Option<u16>,
    max_recording_seconds: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RouterPatch {
    keywords: Option<Vec<String>>,
    clarification_markers: Option<Vec<String>>,
    always_treat_as_reset: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolPatch {
    min_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
