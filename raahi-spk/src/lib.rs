//! raahi-spk: speech output for the Raahi navigation assistant
//!
//! Provides text-to-speech with:
//! - The Google Translate speech endpoint (default, MP3)
//! - OpenAI and generic JSON-over-HTTP providers with retry
//! - Native programs (espeak-ng, `say`)
//! - Closure-backed custom engines
//! - An in-memory cache and bounded concurrency in [`SpeechSynthesizer`]

pub mod config;
pub mod engines;
pub mod error;
pub mod synthesizer;

pub use config::{ApiTtsConfig, RetryConfig, SpeechConfig, TtsEngine, VoiceConfig, VoiceGender};
pub use engines::{AudioFormat, TtsEngine as TtsEngineTrait};
pub use error::SpeechError;
pub use synthesizer::{build_engine, SpeechSynthesizer};
