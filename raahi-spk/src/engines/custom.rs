//! Custom TTS engine implementation
//! Allows users to provide their own TTS engine as closures

use crate::config::VoiceConfig;
use crate::engines::{AudioFormat, TtsEngine};
use crate::error::SpeechError;
use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type SynthesisFuture = Pin<Box<dyn Future<Output = Result<Bytes, SpeechError>> + Send>>;
type SynthesizeFn = dyn Fn(String, VoiceConfig) -> SynthesisFuture + Send + Sync;

/// Closure-backed TTS engine
pub struct CustomTtsEngine {
    name: String,
    synthesize_fn: Arc<SynthesizeFn>,
    voices: Vec<String>,
    format: AudioFormat,
}

impl CustomTtsEngine {
    /// Engine around a synchronous synthesis function
    pub fn new<F>(name: impl Into<String>, synthesize_fn: F) -> Self
    where
        F: Fn(&str, &VoiceConfig) -> Result<Bytes, SpeechError> + Send + Sync + 'static,
    {
        let synthesize_fn = Arc::new(synthesize_fn);
        Self::from_async(name, move |text: String, voice: VoiceConfig| {
            let synthesize_fn = synthesize_fn.clone();
            async move { synthesize_fn(&text, &voice) }
        })
    }

    /// Engine around an async synthesis function
    pub fn from_async<F, Fut>(name: impl Into<String>, synthesize_fn: F) -> Self
    where
        F: Fn(String, VoiceConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes, SpeechError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            synthesize_fn: Arc::new(move |text: String, voice: VoiceConfig| {
                Box::pin(synthesize_fn(text, voice)) as SynthesisFuture
            }),
            voices: Vec::new(),
            format: AudioFormat::Mp3,
        }
    }

    /// Voices reported by `list_voices`
    pub fn with_voices(mut self, voices: Vec<String>) -> Self {
        self.voices = voices;
        self
    }

    /// Format of the audio the closure produces
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }
}

#[async_trait]
impl TtsEngine for CustomTtsEngine {
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> Result<Bytes, SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::Engine("Text cannot be empty".to_string()));
        }

        if text.len() > 100_000 {
            return Err(SpeechError::Engine("Text too long (max 100KB)".to_string()));
        }

        (self.synthesize_fn)(text.to_string(), config.clone()).await
    }

    async fn list_voices(&self) -> Result<Vec<String>, SpeechError> {
        Ok(self.voices.clone())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn audio_format(&self) -> AudioFormat {
        self.format
    }
}
