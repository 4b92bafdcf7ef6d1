//! API-based TTS engine implementations
//! Supports the Google Translate speech endpoint, OpenAI and generic JSON endpoints

use crate::config::{ApiTtsConfig, RetryConfig, VoiceConfig, VoiceGender};
use crate::engines::TtsEngine;
use crate::error::SpeechError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Google Translate refuses longer `q` parameters
pub const MAX_CHUNK_CHARS: usize = 100;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

const OPENAI_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// Languages offered by the Google Translate endpoint that we list by default
const TRANSLATE_LANGUAGES: &[&str] = &[
    "en", "hi", "bn", "mr", "ta", "te", "gu", "kn", "ml", "ur", "es", "fr", "de", "it", "pt", "ja", "zh-CN",
];

/// API TTS engine
pub struct ApiTtsEngine {
    engine_type: ApiEngineType,
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
    retry_config: RetryConfig,
    custom_engine_name: Option<String>,
    rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiEngineType {
    GoogleTranslate,
    OpenAi,
    Custom,
}

impl ApiTtsEngine {
    fn build(
        engine_type: ApiEngineType,
        api_config: &ApiTtsConfig,
        custom_engine_name: Option<String>,
        rate: u32,
    ) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api_config.timeout_secs))
            .build()
            .map_err(|e| SpeechError::Engine(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            engine_type,
            client,
            endpoint: api_config.endpoint.trim_end_matches('/').to_string(),
            api_key: api_config.api_key.clone(),
            model: api_config.model.clone(),
            retry_config: api_config.retry_config.clone(),
            custom_engine_name,
            rate,
        })
    }

    /// Create an engine for the Google Translate speech endpoint
    pub fn new_google_translate(api_config: &ApiTtsConfig) -> Result<Self, SpeechError> {
        Self::build(ApiEngineType::GoogleTranslate, api_config, None, 150)
    }

    /// Create a new OpenAI TTS engine; `rate` maps onto OpenAI's speed
    pub fn new_openai(api_config: &ApiTtsConfig, rate: u32) -> Result<Self, SpeechError> {
        let mut engine = Self::build(ApiEngineType::OpenAi, api_config, None, rate)?;
        engine.model = engine.model.or(Some("tts-1".to_string()));
        Ok(engine)
    }

    /// Create a new custom API TTS engine
    pub fn new_custom(api_config: &ApiTtsConfig, engine_name: String) -> Result<Self, SpeechError> {
        Self::build(ApiEngineType::Custom, api_config, Some(engine_name), 150)
    }

    /// Synthesize through Google Translate, one request per chunk
    async fn synthesize_google_translate(&self, text: &str, voice_config: &VoiceConfig) -> Result<Bytes, SpeechError> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SpeechError::Engine("Nothing to say after splitting text".to_string()));
        }

        let total = chunks.len().to_string();
        let mut audio = BytesMut::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let part = self
                .retry_request(|| self.request_translate_chunk(chunk, &voice_config.language, idx, &total))
                .await?;
            // MP3 frames are self-delimiting, so the parts simply concatenate
            audio.extend_from_slice(&part);
            if audio.len() > MAX_RESPONSE_SIZE {
                return Err(SpeechError::Api("Synthesized audio too large".to_string()));
            }
        }

        debug!("Google Translate returned {} bytes for {} chunks", audio.len(), chunks.len());
        Ok(audio.freeze())
    }

    async fn request_translate_chunk(
        &self,
        chunk: &str,
        language: &str,
        idx: usize,
        total: &str,
    ) -> Result<Bytes, SpeechError> {
        let url = format!("{}/translate_tts", self.endpoint);
        let idx = idx.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", language),
                ("client", "tw-ob"),
                ("total", total),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .header("User-Agent", "Mozilla/5.0")
            .header("Referer", "https://translate.google.com/")
            .send()
            .await
            .map_err(|e| SpeechError::Api(format!("Google Translate request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SpeechError::Api(format!("Google Translate TTS error ({})", status)));
        }

        let bytes = read_limited(response).await?;
        if bytes.is_empty() {
            return Err(SpeechError::Api("Google Translate returned no audio".to_string()));
        }
        Ok(bytes)
    }

    /// Synthesize using OpenAI TTS API
    async fn synthesize_openai(&self, text: &str, voice_config: &VoiceConfig) -> Result<Bytes, SpeechError> {
        let api_key = match self.api_key {
            Some(ref key) => key.clone(),
            None => std::env::var("OPENAI_API_KEY")
                .map_err(|_| SpeechError::Config("OpenAI API key not provided".to_string()))?,
        };

        let voice = voice_config.name.as_deref().unwrap_or(match voice_config.gender {
            Some(VoiceGender::Male) => "echo",
            _ => "alloy",
        });
        let model = self.model.as_deref().unwrap_or("tts-1");

        let request_body = json!({
            "model": model,
            "input": text,
            "voice": voice,
            "response_format": "mp3",
            "speed": self.openai_speed(),
        });

        let url = format!("{}/v1/audio/speech", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", &api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| SpeechError::Api(format!("OpenAI API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = truncated_body(response).await;
            return Err(SpeechError::Api(format!("OpenAI API error ({}): {}", status, error_text)));
        }

        read_limited(response).await
    }

    /// Synthesize using custom API endpoint
    async fn synthesize_custom(&self, text: &str, voice_config: &VoiceConfig) -> Result<Bytes, SpeechError> {
        let endpoint_url = url::Url::parse(&self.endpoint)
            .map_err(|e| SpeechError::Config(format!("Invalid endpoint URL: {}", e)))?;

        if !matches!(endpoint_url.scheme(), "http" | "https") {
            return Err(SpeechError::Config(format!(
                "Unsupported URL scheme: {}. Only http:// and https:// are allowed.",
                endpoint_url.scheme()
            )));
        }

        let api_key = match self.api_key {
            Some(ref key) => Some(key.clone()),
            None => std::env::var("CUSTOM_TTS_API_KEY").ok(),
        };

        let mut request_body = json!({
            "text": text,
            "format": "mp3",
            "language": voice_config.language,
        });
        if let Some(ref voice_name) = voice_config.name {
            request_body["voice"] = json!(voice_name);
        }
        if let Some(ref model) = self.model {
            request_body["model"] = json!(model);
        }

        // Bare hosts get the conventional synthesis path
        let mut url = self.endpoint.clone();
        if !url.contains("/v1/") && !url.contains("/api/") && !url.contains("/tts") {
            url.push_str("/v1/synthesize");
        }

        let mut request = self.client.post(&url);
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .json(&request_body)
            .send()
            .await
            .map_err(|e| SpeechError::Api(format!("Custom TTS API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = truncated_body(response).await;
            return Err(SpeechError::Api(format!("Custom TTS API error ({}): {}", status, error_text)));
        }

        let body = read_limited(response).await?;
        extract_audio(body)
    }

    /// Retry wrapper for API calls
    async fn retry_request<F, Fut>(&self, f: F) -> Result<Bytes, SpeechError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Bytes, SpeechError>>,
    {
        let mut delay = self.retry_config.initial_delay_ms;
        let mut last_error = None;

        for attempt in 0..=self.retry_config.max_retries {
            match f().await {
                Ok(result) => return Ok(result),
                // Missing keys and bad URLs will not fix themselves
                Err(e @ SpeechError::Config(_)) => return Err(e),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.retry_config.max_retries {
                        debug!(
                            "TTS API request failed, retrying in {}ms (attempt {}/{})",
                            delay,
                            attempt + 1,
                            self.retry_config.max_retries
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        delay = delay
                            .checked_mul(2)
                            .map(|d| d.min(self.retry_config.max_delay_ms))
                            .unwrap_or(self.retry_config.max_delay_ms);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SpeechError::Api("Unknown error".to_string())))
    }

    /// Map 0-500 WPM onto OpenAI's 0.25-4.0 speed, 150 WPM being 1.0
    fn openai_speed(&self) -> f32 {
        if self.rate <= 150 {
            0.25 + (self.rate as f32 / 150.0) * 0.75
        } else {
            1.0 + ((self.rate - 150) as f32 / 350.0) * 3.0
        }
        .clamp(0.25, 4.0)
    }
}

#[async_trait]
impl TtsEngine for ApiTtsEngine {
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> Result<Bytes, SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::Engine("Text cannot be empty".to_string()));
        }

        if text.len() > 100_000 {
            return Err(SpeechError::Engine("Text too long (max 100KB)".to_string()));
        }

        match self.engine_type {
            // Retried per chunk inside
            ApiEngineType::GoogleTranslate => self.synthesize_google_translate(text, config).await,
            ApiEngineType::OpenAi => self.retry_request(|| self.synthesize_openai(text, config)).await,
            ApiEngineType::Custom => self.retry_request(|| self.synthesize_custom(text, config)).await,
        }
    }

    async fn list_voices(&self) -> Result<Vec<String>, SpeechError> {
        Ok(match self.engine_type {
            ApiEngineType::GoogleTranslate => TRANSLATE_LANGUAGES.iter().map(|s| s.to_string()).collect(),
            ApiEngineType::OpenAi => OPENAI_VOICES.iter().map(|s| s.to_string()).collect(),
            // Voices of an arbitrary endpoint are unknown; configure them explicitly
            ApiEngineType::Custom => Vec::new(),
        })
    }

    fn is_available(&self) -> bool {
        match self.engine_type {
            ApiEngineType::GoogleTranslate | ApiEngineType::Custom => !self.endpoint.is_empty(),
            ApiEngineType::OpenAi => self.api_key.is_some() || std::env::var("OPENAI_API_KEY").is_ok(),
        }
    }

    fn name(&self) -> &str {
        match self.engine_type {
            ApiEngineType::GoogleTranslate => "Google Translate TTS",
            ApiEngineType::OpenAi => "OpenAI TTS",
            ApiEngineType::Custom => self.custom_engine_name.as_deref().unwrap_or("Custom API TTS"),
        }
    }
}

/// Split text into pieces of at most `max_chars` characters on word
/// boundaries. Words longer than `max_chars` are cut.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            chunks.extend(chars.chunks(max_chars).map(|piece| piece.iter().collect::<String>()));
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            chunks.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Pull audio out of a custom endpoint's reply: raw bytes, or JSON with a
/// base64 `audio`, `audioContent` or `data` field.
fn extract_audio(body: Bytes) -> Result<Bytes, SpeechError> {
    if body.len() > 2 && body[0] == b'{' && body[body.len() - 1] == b'}' {
        if let Ok(json_response) = serde_json::from_slice::<serde_json::Value>(&body) {
            let encoded = json_response
                .get("audio")
                .or_else(|| json_response.get("audioContent"))
                .or_else(|| json_response.get("data"))
                .and_then(|v| v.as_str());

            if let Some(audio_base64) = encoded {
                let decoded = general_purpose::STANDARD
                    .decode(audio_base64)
                    .map_err(|e| SpeechError::Api(format!("Failed to decode base64 audio: {}", e)))?;
                return Ok(Bytes::from(decoded));
            }
        }
    }
    Ok(body)
}

async fn read_limited(response: reqwest::Response) -> Result<Bytes, SpeechError> {
    if let Some(content_length) = response.content_length() {
        if content_length > MAX_RESPONSE_SIZE as u64 {
            return Err(SpeechError::Api(format!(
                "Response too large ({} bytes, max {} bytes)",
                content_length, MAX_RESPONSE_SIZE
            )));
        }
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SpeechError::Api(format!("Failed to read audio response: {}", e)))?;

    if bytes.len() > MAX_RESPONSE_SIZE {
        return Err(SpeechError::Api(format!(
            "Response too large ({} bytes, max {} bytes)",
            bytes.len(),
            MAX_RESPONSE_SIZE
        )));
    }
    Ok(bytes)
}

async fn truncated_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .map(|s| s.chars().take(1000).collect())
        .unwrap_or_else(|_| "Unknown error".to_string())
}
