//! TTS engine implementations

pub mod api;
pub mod custom;
pub mod native;

pub use api::ApiTtsEngine;
pub use custom::CustomTtsEngine;
pub use native::NativeTtsEngine;

use crate::config::VoiceConfig;
use crate::error::SpeechError;
use async_trait::async_trait;
use bytes::Bytes;

/// Container format of synthesized audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

/// Trait for TTS engines
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Synthesize text to speech audio
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> Result<Bytes, SpeechError>;

    /// Get available voices
    async fn list_voices(&self) -> Result<Vec<String>, SpeechError>;

    /// Check if engine is available
    fn is_available(&self) -> bool;

    /// Get engine name
    fn name(&self) -> &str;

    /// Format of the bytes `synthesize` returns
    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }
}
