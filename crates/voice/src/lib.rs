//! Speech and audio collaborators around the intent router.
//!
//! A voice turn captures audio from an [`AudioDevice`], transcribes it with a
//! [`SpeechToText`], routes the transcript, then speaks the outcome back
//! through a [`TextToSpeech`].

pub mod audio;
pub mod pipeline;
pub mod speech;

pub use audio::{AudioDevice, AudioFormat, WavFileDevice};
pub use pipeline::{TurnReport, VoicePipeline};
pub use speech::{OpenAiSpeech, SpeechToText, TextToSpeech};
