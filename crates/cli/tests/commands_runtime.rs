use std::env;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use resetline_agent::gate::OUT_OF_DOMAIN_MESSAGE;
use resetline_cli::commands::{config, text, tools, voice};
use resetline_core::config::LoadOptions;
use resetline_voice::audio::{encode_wav, is_wav};
use resetline_voice::AudioFormat;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = "sk-test-secret-value";

#[test]
fn text_routes_reset_request_through_the_model() {
    let (runtime, server) = mock_backend();
    runtime.block_on(mount_reset_tool_call(&server));

    with_backend_env(&server.uri(), || {
        let result = text::run(LoadOptions::default(), "I forgot my password");
        assert_eq!(result.exit_code, 0, "expected successful text route");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "text");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["utterance"], "I forgot my password");
        assert_eq!(payload["outcome"]["success"], true);

        let credential = payload["outcome"]["temporary_credential"].as_str().unwrap_or("");
        assert_eq!(credential.len(), 12);
        let response_text = payload["response_text"].as_str().unwrap_or("");
        assert!(response_text.ends_with(&format!("Your temporary password is: {credential}")));
    });
}

#[test]
fn text_refuses_out_of_domain_requests_without_the_model() {
    with_backend_env("http://127.0.0.1:9", || {
        let result = text::run(LoadOptions::default(), "what's the weather");
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["outcome"]["success"], false);
        assert_eq!(payload["outcome"]["message"], OUT_OF_DOMAIN_MESSAGE);
        assert!(payload["outcome"].get("temporary_credential").is_none());
    });
}

#[test]
fn text_reports_unreachable_model_as_refusal() {
    with_backend_env("http://127.0.0.1:9", || {
        let result = text::run(LoadOptions::default(), "reset my password");
        assert_eq!(result.exit_code, 0, "routing never fails the command");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["outcome"]["success"], false);
        assert!(payload["outcome"]["message"]
            .as_str()
            .unwrap_or("")
            .contains("having trouble processing your request"));
    });
}

#[test]
fn text_without_api_key_is_a_config_failure() {
    with_env(&[], || {
        let result = text::run(LoadOptions::default(), "reset my password");
        assert_eq!(result.exit_code, 2, "expected config failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "text");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or("").contains("llm.api_key"));
        assert_eq!(payload["user_message"], "An unexpected internal error occurred.");
    });
}

#[test]
fn inverted_delay_window_is_a_config_failure() {
    with_env(
        &[
            ("RESETLINE_LLM_API_KEY", TEST_KEY),
            ("RESETLINE_TOOL_MIN_DELAY_MS", "900"),
            ("RESETLINE_TOOL_MAX_DELAY_MS", "100"),
        ],
        || {
            let result = text::run(LoadOptions::default(), "reset my password");
            assert_eq!(result.exit_code, 2);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn tools_lists_reset_password_without_an_api_key() {
    with_env(&[], || {
        let result = tools::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "tools");
        assert_eq!(payload["tools"][0]["name"], "reset_password");
        assert_eq!(payload["tools"][0]["parameters"]["type"], "object");
    });
}

#[test]
fn config_redacts_the_api_key_and_attributes_sources() {
    with_env(&[("RESETLINE_LLM_API_KEY", TEST_KEY), ("RESETLINE_LLM_MODEL", "gpt-4o")], || {
        let result = config::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0);
        assert!(!result.output.contains(TEST_KEY), "api key leaked into config output");

        let payload = parse_payload(&result.output);
        let api_key = entry(&payload, "llm.api_key");
        assert_eq!(api_key["value"], "<redacted>");
        assert_eq!(api_key["source"], "env (RESETLINE_LLM_API_KEY)");

        let model = entry(&payload, "llm.model");
        assert_eq!(model["value"], "gpt-4o");
        assert_eq!(entry(&payload, "llm.base_url")["source"], "default");
    });
}

#[test]
fn config_reads_explicit_file() {
    let dir = TempDir::new().expect("tempdir");
    let file = dir.path().join("resetline.toml");
    std::fs::write(&file, "[speech]\nvoice = \"nova\"\n").expect("write config");

    with_env(&[], || {
        let options = LoadOptions {
            config_path: Some(file.clone()),
            require_file: true,
            ..LoadOptions::default()
        };
        let result = config::run(options);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let voice = entry(&payload, "speech.voice");
        assert_eq!(voice["value"], "nova");
        assert!(voice["source"].as_str().unwrap_or("").starts_with("file ("));
        assert_eq!(entry(&payload, "llm.api_key")["value"], "<unset>");
    });
}

#[test]
fn blank_env_values_are_not_reported_as_sources() {
    let dir = TempDir::new().expect("tempdir");
    let file = dir.path().join("resetline.toml");
    std::fs::write(&file, "[speech]\nvoice = \"nova\"\n").expect("write config");

    with_env(&[("RESETLINE_SPEECH_VOICE", "   "), ("RESETLINE_LLM_MODEL", "")], || {
        let options = LoadOptions {
            config_path: Some(file.clone()),
            require_file: true,
            ..LoadOptions::default()
        };
        let result = config::run(options);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let voice = entry(&payload, "speech.voice");
        assert_eq!(voice["value"], "nova");
        assert!(voice["source"].as_str().unwrap_or("").starts_with("file ("));
        assert_eq!(entry(&payload, "llm.model")["source"], "default");
    });
}

#[test]
fn config_with_missing_required_file_fails() {
    with_env(&[], || {
        let options = LoadOptions {
            config_path: Some(PathBuf::from("does-not-exist/resetline.toml")),
            require_file: true,
            ..LoadOptions::default()
        };
        let result = config::run(options);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["status"], "error");
    });
}

#[test]
fn voice_with_missing_recording_is_a_runtime_failure() {
    let dir = TempDir::new().expect("tempdir");

    with_backend_env("http://127.0.0.1:9", || {
        let result = voice::run(
            LoadOptions::default(),
            dir.path().join("absent.wav"),
            dir.path().join("reply.wav"),
        );
        assert_eq!(result.exit_code, 3, "expected runtime failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "voice");
        assert_eq!(payload["error_class"], "io");
        assert_eq!(payload["user_message"], "An unexpected internal error occurred.");
    });
}

#[test]
fn voice_turn_writes_the_spoken_reply() {
    let (runtime, server) = mock_backend();
    runtime.block_on(async {
        mount_reset_tool_call(&server).await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("reset my password"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
            .mount(&server)
            .await;
    });

    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("request.wav");
    let output = dir.path().join("reply.wav");
    let recording = encode_wav(&[1u8; 3_200], AudioFormat::default()).expect("encode recording");
    std::fs::write(&input, recording).expect("write recording");

    with_backend_env(&server.uri(), || {
        let result = voice::run(LoadOptions::default(), input.clone(), output.clone());
        assert_eq!(result.exit_code, 0, "voice turn failed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "voice");
        assert_eq!(payload["transcript"], "reset my password");
        assert_eq!(payload["outcome"]["success"], true);
        assert_eq!(payload["audio_bytes"], 64);
    });

    let written = std::fs::read(&output).expect("reply written");
    assert!(is_wav(&written));
}

fn mock_backend() -> (Runtime, MockServer) {
    let runtime = Runtime::new().expect("test runtime");
    let server = runtime.block_on(MockServer::start());
    (runtime, server)
}

async fn mount_reset_tool_call(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "reset_password", "arguments": "{}"}
                    }]
                }
            }]
        })))
        .mount(server)
        .await;
}

fn with_backend_env(base_url: &str, test_fn: impl FnOnce()) {
    with_env(
        &[
            ("RESETLINE_LLM_API_KEY", TEST_KEY),
            ("RESETLINE_LLM_BASE_URL", base_url),
            ("RESETLINE_LLM_TIMEOUT_SECS", "5"),
            ("RESETLINE_TOOL_MIN_DELAY_MS", "0"),
            ("RESETLINE_TOOL_MAX_DELAY_MS", "0"),
        ],
        test_fn,
    );
}

fn entry<'a>(payload: &'a Value, key: &str) -> &'a Value {
    payload["entries"]
        .as_array()
        .and_then(|entries| entries.iter().find(|entry| entry["key"] == key))
        .unwrap_or_else(|| panic!("config entry `{key}` missing"))
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "OPENAI_API_KEY",
        "RESETLINE_LLM_API_KEY",
        "RESETLINE_LLM_BASE_URL",
        "RESETLINE_LLM_MODEL",
        "RESETLINE_LLM_TEMPERATURE",
        "RESETLINE_LLM_TIMEOUT_SECS",
        "RESETLINE_SPEECH_TRANSCRIPTION_MODEL",
        "RESETLINE_SPEECH_MODEL",
        "RESETLINE_SPEECH_VOICE",
        "RESETLINE_AUDIO_SAMPLE_RATE",
        "RESETLINE_AUDIO_CHANNELS",
        "RESETLINE_AUDIO_SAMPLE_WIDTH",
        "RESETLINE_AUDIO_MAX_RECORDING_SECONDS",
        "RESETLINE_ROUTER_KEYWORDS",
        "RESETLINE_ROUTER_CLARIFICATION_MARKERS",
        "RESETLINE_ROUTER_ALWAYS_TREAT_AS_RESET",
        "RESETLINE_TOOL_MIN_DELAY_MS",
        "RESETLINE_TOOL_MAX_DELAY_MS",
        "RESETLINE_LOGGING_LEVEL",
        "RESETLINE_LOGGING_FORMAT",
        "RESETLINE_LOG_LEVEL",
        "RESETLINE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
