use std::sync::Arc;

use resetline_agent::IntentRouter;
use resetline_core::config::AppConfig;
use resetline_core::{ApplicationError, ResetOutcome};
use serde::Serialize;
use tracing::{info, warn};

use crate::audio::{AudioDevice, AudioFormat};
use crate::speech::{SpeechToText, TextToSpeech};

/// What happened during one spoken exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnReport {
    pub transcript: String,
    pub outcome: ResetOutcome,
    pub response_text: String,
    pub audio_bytes: usize,
}

pub struct VoicePipeline {
    device: Arc<dyn AudioDevice>,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    router: Arc<IntentRouter>,
    format: AudioFormat,
}

impl VoicePipeline {
    pub fn new(
        config: &AppConfig,
        device: Arc<dyn AudioDevice>,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        router: Arc<IntentRouter>,
    ) -> Self {
        Self { device, stt, tts, router, format: AudioFormat::from(&config.audio) }
    }

    /// capture -> transcribe -> route -> synthesize -> play.
    pub async fn run_turn(&self) -> Result<TurnReport, ApplicationError> {
        let audio = self.device.capture().await.map_err(|error| failed("capture", error))?;

        let transcript = self
            .stt
            .transcribe(&audio, self.format)
            .await
            .map_err(|error| failed("transcription", error))?;
        info!(
            event_name = "voice.pipeline.transcribed",
            transcript_chars = transcript.len(),
            "speech transcribed"
        );

        let outcome = self.router.route(&transcript).await;
        let response_text = outcome.spoken_response();

        let speech = self
            .tts
            .synthesize(&response_text)
            .await
            .map_err(|error| failed("synthesis", error))?;
        self.device.play(&speech).await.map_err(|error| failed("playback", error))?;

        info!(
            event_name = "voice.pipeline.turn_completed",
            success = outcome.is_success(),
            audio_bytes = speech.len(),
            "voice turn completed"
        );

        Ok(TurnReport { transcript, outcome, response_text, audio_bytes: speech.len() })
    }
}

fn failed(stage: &'static str, error: ApplicationError) -> ApplicationError {
    warn!(
        event_name = "voice.pipeline.stage_failed",
        stage,
        error_class = error.error_class(),
        error = %error,
        "voice turn aborted"
    );
    error
}
