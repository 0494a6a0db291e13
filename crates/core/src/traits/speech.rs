//! Speech processing traits

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Output of a transcription call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    /// Audio length reported by the service, if any
    pub duration_seconds: Option<f64>,
}

impl Transcription {
    pub fn new(text: impl Into<String>, duration_seconds: Option<f64>) -> Self {
        Self {
            text: text.into(),
            duration_seconds,
        }
    }
}

/// Speech-to-Text interface
///
/// # Example
///
/// ```ignore
/// let stt: Arc<dyn Transcriber> = Arc::new(WhisperTranscriber::new(config));
/// let result = stt.transcribe(&audio_bytes, "ko").await?;
/// println!("Transcribed: {}", result.text);
/// ```
#[async_trait]
pub trait Transcriber: Send + Sync + 'static {
    /// Transcribe a complete recording
    ///
    /// # Arguments
    /// * `audio` - Encoded audio bytes
    /// * `language_hint` - ISO language code to bias recognition (e.g. "ko")
    async fn transcribe(&self, audio: &[u8], language_hint: &str) -> Result<Transcription>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

/// Text-to-Speech interface
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Synthesize text to encoded audio
    ///
    /// # Arguments
    /// * `text` - Script to speak
    /// * `voice_id` - Provider voice identifier (default or cloned voice)
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
