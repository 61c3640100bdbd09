use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use resetline_core::config::AudioConfig;
use resetline_core::{ApplicationError, InputError};
use serde::Serialize;
use tracing::info;

/// Raw PCM layout: little-endian signed integer samples, interleaved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_width: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self { sample_rate: 16_000, channels: 1, sample_width: 2 }
    }
}

impl From<&AudioConfig> for AudioFormat {
    fn from(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            sample_width: config.sample_width,
        }
    }
}

impl AudioFormat {
    fn frame_bytes(&self) -> usize {
        usize::from(self.sample_width) * usize::from(self.channels.max(1))
    }
}

#[async_trait]
pub trait AudioDevice: Send + Sync {
    async fn capture(&self) -> Result<Vec<u8>, ApplicationError>;
    async fn play(&self, audio: &[u8]) -> Result<(), ApplicationError>;
}

pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Wraps raw PCM in a WAV container. A trailing partial frame is dropped.
pub fn encode_wav(pcm: &[u8], format: AudioFormat) -> Result<Vec<u8>, ApplicationError> {
    if pcm.is_empty() {
        return Err(InputError::EmptyAudio.into());
    }
    if !matches!(format.sample_width, 1..=4) {
        return Err(InputError::UnsupportedSampleWidth(format.sample_width).into());
    }

    let usable = pcm.len() - pcm.len() % format.frame_bytes();
    if usable == 0 {
        return Err(InputError::InvalidAudio("audio shorter than one frame".to_string()).into());
    }

    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.sample_width * 8,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(usable + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(invalid_audio)?;
        for sample in pcm[..usable].chunks_exact(usize::from(format.sample_width)) {
            let result = match sample {
                [b0] => writer.write_sample(*b0 as i8),
                [b0, b1] => writer.write_sample(i16::from_le_bytes([*b0, *b1])),
                [b0, b1, b2] => {
                    writer.write_sample(i32::from_le_bytes([0, *b0, *b1, *b2]) >> 8)
                }
                [b0, b1, b2, b3] => writer.write_sample(i32::from_le_bytes([*b0, *b1, *b2, *b3])),
                _ => return Err(InputError::UnsupportedSampleWidth(format.sample_width).into()),
            };
            result.map_err(invalid_audio)?;
        }
        writer.finalize().map_err(invalid_audio)?;
    }

    Ok(cursor.into_inner())
}

/// Reads an integer-PCM WAV payload back into raw little-endian PCM.
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<u8>, AudioFormat), ApplicationError> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(invalid_audio)?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int {
        return Err(InputError::InvalidAudio("only integer PCM is supported".to_string()).into());
    }

    let sample_width = spec.bits_per_sample.div_ceil(8);
    if !matches!(sample_width, 1..=4) {
        return Err(InputError::UnsupportedSampleWidth(sample_width).into());
    }

    let format =
        AudioFormat { sample_rate: spec.sample_rate, channels: spec.channels, sample_width };
    let mut pcm = Vec::with_capacity(reader.len() as usize * usize::from(sample_width));
    for sample in reader.into_samples::<i32>() {
        let sample = sample.map_err(invalid_audio)?;
        match sample_width {
            1 => pcm.push(sample as i8 as u8),
            2 => pcm.extend_from_slice(&(sample as i16).to_le_bytes()),
            3 => pcm.extend_from_slice(&sample.to_le_bytes()[..3]),
            _ => pcm.extend_from_slice(&sample.to_le_bytes()),
        }
    }

    Ok((pcm, format))
}

fn invalid_audio(error: hound::Error) -> ApplicationError {
    InputError::InvalidAudio(error.to_string()).into()
}

/// File-backed stand-in for a microphone and speaker.
///
/// `capture` reads PCM from a WAV file, truncated to the recording limit.
/// `play` writes to the output file: WAV payloads are copied verbatim and raw
/// PCM is wrapped using the configured format.
#[derive(Clone, Debug)]
pub struct WavFileDevice {
    input: PathBuf,
    output: PathBuf,
    format: AudioFormat,
    max_recording_seconds: u32,
}

impl WavFileDevice {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        config: &AudioConfig,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            format: AudioFormat::from(config),
            max_recording_seconds: config.max_recording_seconds,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }
}

#[async_trait]
impl AudioDevice for WavFileDevice {
    async fn capture(&self) -> Result<Vec<u8>, ApplicationError> {
        let bytes = tokio::fs::read(&self.input).await?;
        let (mut pcm, format) = decode_wav(&bytes)?;
        if format != self.format {
            return Err(InputError::InvalidAudio(format!(
                "input file is {} Hz/{} ch/{} bytes, expected {} Hz/{} ch/{} bytes",
                format.sample_rate,
                format.channels,
                format.sample_width,
                self.format.sample_rate,
                self.format.channels,
                self.format.sample_width
            ))
            .into());
        }

        let limit = self.format.sample_rate as usize
            * self.format.frame_bytes()
            * self.max_recording_seconds as usize;
        pcm.truncate(limit);

        info!(
            event_name = "voice.audio.captured",
            path = %self.input.display(),
            bytes = pcm.len(),
            "captured audio from file"
        );
        Ok(pcm)
    }

    async fn play(&self, audio: &[u8]) -> Result<(), ApplicationError> {
        if audio.is_empty() {
            return Err(InputError::EmptyAudio.into());
        }

        let payload = if is_wav(audio) { audio.to_vec() } else { encode_wav(audio, self.format)? };
        tokio::fs::write(&self.output, &payload).await?;

        info!(
            event_name = "voice.audio.played",
            path = %self.output.display(),
            bytes = payload.len(),
            "wrote audio response to file"
        );
        Ok(())
    }
}
