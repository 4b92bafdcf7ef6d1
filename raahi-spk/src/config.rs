//! Configuration for speech synthesis

use serde::{Deserialize, Serialize};

/// Default Google Translate host
pub const GOOGLE_TRANSLATE_ENDPOINT: &str = "https://translate.google.com";

/// Default OpenAI API host
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com";

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speak results at all
    pub enabled: bool,

    /// Preferred TTS engine
    pub engine: TtsEngine,

    /// Voice settings
    pub voice: VoiceConfig,

    /// Speech rate (words per minute, 0-500, default 150)
    pub rate: u32,

    /// Volume (0.0-1.0, default 0.8)
    pub volume: f32,

    /// Pitch adjustment (-1.0 to 1.0, default 0.0)
    pub pitch: f32,

    /// HTTP settings for API engines; engine defaults apply when absent
    pub api_config: Option<ApiTtsConfig>,

    /// Enable in-memory audio caching
    pub enable_cache: bool,

    /// Maximum cache size in MB
    pub max_cache_size_mb: u64,

    /// Maximum concurrent synthesis requests
    pub queue_size: usize,
}

/// TTS Engine type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TtsEngine {
    /// Google Translate speech endpoint (MP3, no key needed)
    #[default]
    GoogleTranslate,
    /// OpenAI TTS API
    #[serde(rename = "openai")]
    OpenAi,
    /// Platform speech program (espeak-ng on Linux, `say` on macOS)
    Native,
    /// Generic JSON-over-HTTP endpoint, named for logging
    Custom(String),
}

/// Voice configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Voice name/identifier
    pub name: Option<String>,

    /// Language code (e.g., "en", "en-US")
    pub language: String,

    /// Gender preference
    pub gender: Option<VoiceGender>,
}

/// Voice gender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoiceGender {
    Male,
    Female,
    Neutral,
}

/// API TTS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiTtsConfig {
    /// API endpoint URL
    pub endpoint: String,

    /// API key (optional, can be set via environment)
    pub api_key: Option<String>,

    /// Model/voice ID
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retry configuration
    pub retry_config: RetryConfig,
}

/// Retry configuration for API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum retry attempts
    pub max_retries: u32,

    /// Initial retry delay in milliseconds
    pub initial_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: TtsEngine::GoogleTranslate,
            voice: VoiceConfig::default(),
            rate: 150,
            volume: 0.8,
            pitch: 0.0,
            api_config: None,
            enable_cache: true,
            max_cache_size_mb: 100,
            queue_size: 8,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            name: None,
            language: "en".to_string(),
            gender: None,
        }
    }
}

impl Default for ApiTtsConfig {
    fn default() -> Self {
        Self {
            endpoint: GOOGLE_TRANSLATE_ENDPOINT.to_string(),
            api_key: None,
            model: None,
            timeout_secs: 30,
            retry_config: RetryConfig::default(),
        }
    }
}

impl ApiTtsConfig {
    /// Defaults for an engine; `None` for engines that do not talk HTTP
    pub fn for_engine(engine: &TtsEngine) -> Option<Self> {
        match engine {
            TtsEngine::GoogleTranslate => Some(Self::default()),
            TtsEngine::OpenAi => Some(Self {
                endpoint: OPENAI_ENDPOINT.to_string(),
                model: Some("tts-1".to_string()),
                ..Self::default()
            }),
            TtsEngine::Native | TtsEngine::Custom(_) => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("API endpoint cannot be empty".to_string());
        }

        if !self.endpoint.starts_with("https://") {
            return Err("API endpoint must use HTTPS".to_string());
        }

        if self.endpoint.len() > 2048 {
            return Err("API endpoint URL too long (max 2048 chars)".to_string());
        }

        if self.endpoint.chars().any(|c| c == '\0' || c.is_control()) {
            return Err("API endpoint contains invalid characters".to_string());
        }

        if let Some(ref model) = self.model {
            if model.len() > 256 {
                return Err("API model name too long (max 256 chars)".to_string());
            }
            if model.chars().any(|c| c == '\0' || c.is_control()) {
                return Err("API model name contains invalid characters".to_string());
            }
        }

        if self.timeout_secs == 0 {
            return Err("API timeout must be greater than 0".to_string());
        }

        if self.timeout_secs > 300 {
            return Err("API timeout too large (max 300 seconds)".to_string());
        }

        self.retry_config.validate()
    }
}

impl VoiceConfig {
    /// Validate voice configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.language.is_empty() {
            return Err("Language code cannot be empty".to_string());
        }

        if self.language.len() > 32 {
            return Err("Language code too long (max 32 chars)".to_string());
        }

        // Like "en", "en-US" or "zh-CN"
        if !self.language.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err("Language code contains invalid characters (only alphanumeric and '-' allowed)".to_string());
        }

        if let Some(ref name) = self.name {
            if name.is_empty() {
                return Err("Voice name cannot be empty if provided".to_string());
            }

            if name.len() > 256 {
                return Err("Voice name too long (max 256 chars)".to_string());
            }

            if name.chars().any(|c| c == '\0' || c.is_control()) {
                return Err("Voice name contains invalid characters".to_string());
            }
        }

        Ok(())
    }
}

impl RetryConfig {
    /// Validate retry configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries > 100 {
            return Err("Max retries too large (max 100)".to_string());
        }

        if self.initial_delay_ms > 60_000 {
            return Err("Initial delay too large (max 60000 ms)".to_string());
        }

        if self.max_delay_ms > 300_000 {
            return Err("Max delay too large (max 300000 ms)".to_string());
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err("Initial delay cannot be greater than max delay".to_string());
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl SpeechConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.rate > 500 {
            return Err("Speech rate must be between 0 and 500 WPM".to_string());
        }

        if !(0.0..=1.0).contains(&self.volume) {
            return Err("Volume must be between 0.0 and 1.0".to_string());
        }

        if !(-1.0..=1.0).contains(&self.pitch) {
            return Err("Pitch must be between -1.0 and 1.0".to_string());
        }

        if self.queue_size == 0 {
            return Err("Queue size must be greater than 0".to_string());
        }

        if self.queue_size > 10000 {
            return Err("Queue size too large (max 10000)".to_string());
        }

        const MAX_CACHE_SIZE_MB: u64 = 10_000;
        if self.max_cache_size_mb > MAX_CACHE_SIZE_MB {
            return Err(format!("Cache size too large (max {} MB)", MAX_CACHE_SIZE_MB));
        }

        self.voice.validate()?;

        if let TtsEngine::Custom(ref name) = self.engine {
            if name.is_empty() || name.len() > 64 {
                return Err("Custom engine name must be 1-64 chars".to_string());
            }
            if self.api_config.is_none() {
                return Err(format!("Custom TTS engine '{}' requires api_config", name));
            }
        }

        if let Some(api_config) = &self.api_config {
            api_config.validate()?;
        }

        Ok(())
    }

    /// HTTP settings for the configured engine, falling back to its defaults
    pub fn effective_api_config(&self) -> Option<ApiTtsConfig> {
        self.api_config
            .clone()
            .or_else(|| ApiTtsConfig::for_engine(&self.engine))
    }
}
