use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use resetline_agent::openai::{
    authorized_http_client, endpoint, ensure_success, map_transport_error,
};
use resetline_core::config::AppConfig;
use resetline_core::{ApplicationError, InputError, IntegrationError};
use serde::Serialize;
use tracing::debug;

use crate::audio::{encode_wav, AudioFormat};

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[u8], format: AudioFormat)
        -> Result<String, ApplicationError>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApplicationError>;
}

/// Transcription and synthesis against OpenAI-compatible audio endpoints.
#[derive(Clone)]
pub struct OpenAiSpeech {
    http: reqwest::Client,
    base_url: String,
    transcription_model: String,
    speech_model: String,
    voice: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

impl OpenAiSpeech {
    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        Ok(Self {
            http: authorized_http_client(&config.llm)?,
            base_url: config.llm.base_url.clone(),
            transcription_model: config.speech.transcription_model.clone(),
            speech_model: config.speech.speech_model.clone(),
            voice: config.speech.voice.clone(),
        })
    }
}

#[async_trait]
impl SpeechToText for OpenAiSpeech {
    async fn transcribe(
        &self,
        audio: &[u8],
        format: AudioFormat,
    ) -> Result<String, ApplicationError> {
        if audio.is_empty() {
            return Err(InputError::EmptyAudio.into());
        }

        let wav = encode_wav(audio, format)?;
        let file = Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|error| IntegrationError::Transport(error.to_string()))?;
        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .text("response_format", "text")
            .part("file", file);

        let response = self
            .http
            .post(endpoint(&self.base_url, "audio/transcriptions"))
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = ensure_success(response).await?;
        let transcript = response.text().await.map_err(map_transport_error)?;

        debug!(event_name = "voice.speech.transcribed", chars = transcript.len());
        Ok(transcript.trim().to_string())
    }
}

#[async_trait]
impl TextToSpeech for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApplicationError> {
        if text.trim().is_empty() {
            return Err(InputError::EmptyText.into());
        }

        let request = SpeechRequest {
            model: &self.speech_model,
            voice: &self.voice,
            input: text,
            response_format: "wav",
        };
        let response = self
            .http
            .post(endpoint(&self.base_url, "audio/speech"))
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = ensure_success(response).await?;
        let audio = response.bytes().await.map_err(map_transport_error)?;

        if audio.is_empty() {
            return Err(IntegrationError::MalformedResponse(
                "speech endpoint returned no audio".to_string(),
            )
            .into());
        }

        debug!(event_name = "voice.speech.synthesized", bytes = audio.len());
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use resetline_core::config::AppConfig;
    use resetline_core::{ApplicationError, InputError, IntegrationError};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{OpenAiSpeech, SpeechToText, TextToSpeech};
    use crate::audio::AudioFormat;

    fn speech_for(server: &MockServer) -> OpenAiSpeech {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".to_string().into());
        config.llm.base_url = server.uri();
        config.llm.timeout_secs = 2;
        match OpenAiSpeech::from_config(&config) {
            Ok(speech) => speech,
            Err(error) => panic!("speech client should build: {error}"),
        }
    }

    #[tokio::test]
    async fn transcribe_posts_wav_and_trims_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("reset my password\n"))
            .mount(&server)
            .await;

        let transcript = speech_for(&server)
            .transcribe(&[0, 1, 2, 3, 4, 5, 6, 7], AudioFormat::default())
            .await
            .expect("transcript");

        assert_eq!(transcript, "reset my password");

        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1);
        let body = &requests[0].body;
        assert!(contains(body, b"whisper-1"));
        assert!(contains(body, b"filename=\"speech.wav\""));
        assert!(contains(body, b"RIFF"));
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    #[tokio::test]
    async fn transcribe_rejects_empty_audio_without_a_request() {
        let server = MockServer::start().await;

        let result = speech_for(&server).transcribe(&[], AudioFormat::default()).await;

        assert_eq!(result, Err(ApplicationError::Input(InputError::EmptyAudio)));
        let received = server.received_requests().await.unwrap_or_default();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(json!({
                "model": "tts-1",
                "voice": "alloy",
                "input": "hello",
                "response_format": "wav"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....WAVEdata".to_vec()))
            .mount(&server)
            .await;

        let audio = speech_for(&server).synthesize("hello").await.expect("audio");

        assert_eq!(audio, b"RIFF....WAVEdata".to_vec());
    }

    #[tokio::test]
    async fn synthesize_rejects_blank_text() {
        let server = MockServer::start().await;

        let result = speech_for(&server).synthesize("  ").await;

        assert_eq!(result, Err(ApplicationError::Input(InputError::EmptyText)));
    }

    #[tokio::test]
    async fn upstream_errors_surface_as_integration_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let result = speech_for(&server).synthesize("hello").await;

        assert_eq!(
            result,
            Err(ApplicationError::Integration(IntegrationError::Status {
                status: 401,
                body: "bad key".to_string()
            }))
        );
    }

    #[test]
    fn missing_api_key_fails_construction() {
        let result = OpenAiSpeech::from_config(&AppConfig::default());
        assert!(matches!(result, Err(ApplicationError::Configuration(_))));
    }
}
