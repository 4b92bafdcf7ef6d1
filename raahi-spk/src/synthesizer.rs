//! Speech synthesizer with caching and queue management

use crate::config::{SpeechConfig, TtsEngine as EngineKind, VoiceConfig};
use crate::engines::{ApiTtsEngine, AudioFormat, NativeTtsEngine, TtsEngine};
use crate::error::SpeechError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const MAX_TEXT_LENGTH: usize = 100_000;
const MAX_AUDIO_SIZE: usize = 10 * 1024 * 1024;

/// Speech synthesizer with caching and queue management
pub struct SpeechSynthesizer {
    config: Arc<SpeechConfig>,
    engine: Arc<dyn TtsEngine>,
    cache: RwLock<HashMap<String, CachedAudio>>,
    queue_semaphore: Semaphore,
}

#[derive(Clone)]
struct CachedAudio {
    audio: Bytes,
    timestamp: DateTime<Utc>,
}

impl SpeechSynthesizer {
    /// Create a synthesizer for the engine named in `config`
    pub fn new(config: SpeechConfig) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Config)?;

        if !config.enabled {
            return Err(SpeechError::Config("Speech synthesis is disabled".to_string()));
        }

        let engine = build_engine(&config)?;
        if !engine.is_available() {
            return Err(SpeechError::Engine(format!("{} is not available", engine.name())));
        }

        info!("Speech synthesizer using {}", engine.name());
        Ok(Self::assemble(config, engine))
    }

    /// Create a synthesizer around an engine built by the caller
    pub fn with_engine(config: SpeechConfig, engine: Arc<dyn TtsEngine>) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Config)?;
        Ok(Self::assemble(config, engine))
    }

    fn assemble(config: SpeechConfig, engine: Arc<dyn TtsEngine>) -> Self {
        Self {
            queue_semaphore: Semaphore::new(config.queue_size),
            config: Arc::new(config),
            engine,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn audio_format(&self) -> AudioFormat {
        self.engine.audio_format()
    }

    /// Voices offered by the active engine
    pub async fn list_voices(&self) -> Result<Vec<String>, SpeechError> {
        self.engine.list_voices().await
    }

    /// Synthesize text with the configured voice.
    ///
    /// Waits for a queue slot when `queue_size` requests are already running.
    pub async fn speak(&self, text: &str) -> Result<Bytes, SpeechError> {
        self.speak_with_config(text, &self.config.voice).await
    }

    /// Synthesize text with custom voice config
    pub async fn speak_with_config(&self, text: &str, voice_config: &VoiceConfig) -> Result<Bytes, SpeechError> {
        let _permit = self
            .queue_semaphore
            .acquire()
            .await
            .map_err(|e| SpeechError::Synthesizer(format!("Failed to acquire queue permit: {}", e)))?;

        self.synthesize_internal(text, voice_config).await
    }

    async fn synthesize_internal(&self, text: &str, voice_config: &VoiceConfig) -> Result<Bytes, SpeechError> {
        validate_text(text)?;
        voice_config.validate().map_err(SpeechError::Synthesizer)?;

        let cache_key = cache_key(text, voice_config);
        if self.config.enable_cache {
            let cache_hit = self.cache.read().get(&cache_key).cloned();
            if let Some(cached) = cache_hit {
                let preview: String = text.chars().take(50).collect();
                debug!("Cache hit for text: {}", preview);
                return Ok(cached.audio);
            }
        }

        let audio = self.engine.synthesize(text, voice_config).await?;
        if audio.is_empty() {
            return Err(SpeechError::Synthesizer(format!("{} returned no audio", self.engine.name())));
        }
        if audio.len() > MAX_AUDIO_SIZE {
            return Err(SpeechError::Synthesizer(format!(
                "Generated audio too large ({} bytes, max {} bytes)",
                audio.len(),
                MAX_AUDIO_SIZE
            )));
        }

        if self.config.enable_cache {
            self.cache.write().insert(
                cache_key,
                CachedAudio {
                    audio: audio.clone(),
                    timestamp: Utc::now(),
                },
            );
            self.cleanup_cache();
        }
        Ok(audio)
    }

    /// Evict oldest entries once the cache exceeds its budget, down to 80%
    fn cleanup_cache(&self) {
        let max_size_bytes = self
            .config
            .max_cache_size_mb
            .checked_mul(1024 * 1024)
            .unwrap_or(u64::MAX) as usize;

        let mut cache = self.cache.write();
        let total_size: usize = cache.values().map(|c| c.audio.len()).fold(0usize, usize::saturating_add);
        if total_size <= max_size_bytes {
            return;
        }

        let mut entries: Vec<(String, DateTime<Utc>, usize)> = cache
            .iter()
            .map(|(k, v)| (k.clone(), v.timestamp, v.audio.len()))
            .collect();
        entries.sort_by_key(|(_, timestamp, _)| *timestamp);

        let target_size = max_size_bytes / 100 * 80;
        let mut remaining = total_size;
        let mut removed = 0;
        for (key, _, size) in entries {
            if remaining <= target_size {
                break;
            }
            cache.remove(&key);
            remaining -= size;
            removed += 1;
        }

        if removed > 0 {
            info!("Cleaned up speech cache: removed {} entries", removed);
        }
    }

    /// Number of cached clips
    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Number of requests currently holding a queue slot
    pub fn queue_usage(&self) -> usize {
        let available = self.queue_semaphore.available_permits();
        self.config.queue_size.saturating_sub(available)
    }

    /// Get queue capacity (maximum concurrent requests)
    pub fn queue_capacity(&self) -> usize {
        self.config.queue_size
    }

    /// Check if queue is full
    pub fn is_queue_full(&self) -> bool {
        self.queue_semaphore.available_permits() == 0
    }
}

/// Instantiate the engine named in `config`
pub fn build_engine(config: &SpeechConfig) -> Result<Arc<dyn TtsEngine>, SpeechError> {
    let engine: Arc<dyn TtsEngine> = match &config.engine {
        EngineKind::Native => Arc::new(NativeTtsEngine::new_with_config(config.rate, config.volume, config.pitch)),
        EngineKind::GoogleTranslate => {
            let api_config = config.effective_api_config().unwrap_or_default();
            Arc::new(ApiTtsEngine::new_google_translate(&api_config)?)
        }
        EngineKind::OpenAi => {
            let api_config = config
                .effective_api_config()
                .ok_or_else(|| SpeechError::Config("API config required for OpenAI TTS".to_string()))?;
            Arc::new(ApiTtsEngine::new_openai(&api_config, config.rate)?)
        }
        EngineKind::Custom(name) => {
            let api_config = config.api_config.as_ref().ok_or_else(|| {
                SpeechError::Config(format!("Custom TTS engine '{}' requires api_config", name))
            })?;
            Arc::new(ApiTtsEngine::new_custom(api_config, name.clone())?)
        }
    };
    Ok(engine)
}

fn validate_text(text: &str) -> Result<(), SpeechError> {
    if text.trim().is_empty() {
        return Err(SpeechError::Synthesizer("Text cannot be empty".to_string()));
    }

    if text.contains('\0') {
        return Err(SpeechError::Synthesizer("Text contains null bytes".to_string()));
    }

    if text.len() > MAX_TEXT_LENGTH {
        warn!("Rejecting {} bytes of text", text.len());
        return Err(SpeechError::Synthesizer(format!("Text too long (max {} bytes)", MAX_TEXT_LENGTH)));
    }

    Ok(())
}

/// SHA-256 over text, language and voice name
fn cache_key(text: &str, voice_config: &VoiceConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    hasher.update(voice_config.language.as_bytes());
    hasher.update([0u8]);
    if let Some(ref name) = voice_config.name {
        hasher.update(name.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
