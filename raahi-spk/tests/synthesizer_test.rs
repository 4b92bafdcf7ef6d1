//! Synthesizer behaviour with in-process engines

use bytes::Bytes;
use raahi_spk::config::{SpeechConfig, VoiceConfig};
use raahi_spk::engines::{AudioFormat, CustomTtsEngine, TtsEngine};
use raahi_spk::{SpeechError, SpeechSynthesizer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts calls and tracks the highest number running at once
#[derive(Default)]
struct Gauge {
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

fn slow_engine(gauge: Arc<Gauge>) -> Arc<dyn TtsEngine> {
    Arc::new(CustomTtsEngine::from_async("slow", move |text: String, _voice: VoiceConfig| {
        let gauge = gauge.clone();
        async move {
            gauge.calls.fetch_add(1, Ordering::SeqCst);
            let now = gauge.running.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            gauge.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Bytes::from(text))
        }
    }))
}

#[tokio::test]
async fn test_queue_size_bounds_concurrency() {
    let gauge = Arc::new(Gauge::default());
    let config = SpeechConfig {
        queue_size: 2,
        enable_cache: false,
        ..SpeechConfig::default()
    };
    let synth = Arc::new(SpeechSynthesizer::with_engine(config, slow_engine(gauge.clone())).unwrap());

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let synth = synth.clone();
            tokio::spawn(async move { synth.speak(&format!("I see person {}", i)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(gauge.calls.load(Ordering::SeqCst), 6);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(synth.queue_usage(), 0);
}

#[tokio::test]
async fn test_cache_skips_engine() {
    let gauge = Arc::new(Gauge::default());
    let synth = SpeechSynthesizer::with_engine(SpeechConfig::default(), slow_engine(gauge.clone())).unwrap();

    let first = synth.speak("I see chair far away at your right.").await.unwrap();
    let second = synth.speak("I see chair far away at your right.").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 1);

    // A different language is a different clip
    let hindi = VoiceConfig {
        language: "hi".to_string(),
        ..VoiceConfig::default()
    };
    synth
        .speak_with_config("I see chair far away at your right.", &hindi)
        .await
        .unwrap();
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 2);
    assert_eq!(synth.cache_len(), 2);
}

#[tokio::test]
async fn test_cache_disabled() {
    let gauge = Arc::new(Gauge::default());
    let config = SpeechConfig {
        enable_cache: false,
        ..SpeechConfig::default()
    };
    let synth = SpeechSynthesizer::with_engine(config, slow_engine(gauge.clone())).unwrap();

    synth.speak("hello").await.unwrap();
    synth.speak("hello").await.unwrap();
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 2);
    assert_eq!(synth.cache_len(), 0);
}

#[tokio::test]
async fn test_rejects_bad_input_before_engine() {
    let gauge = Arc::new(Gauge::default());
    let synth = SpeechSynthesizer::with_engine(SpeechConfig::default(), slow_engine(gauge.clone())).unwrap();

    assert!(matches!(synth.speak("").await, Err(SpeechError::Synthesizer(_))));
    assert!(matches!(synth.speak("a\0b").await, Err(SpeechError::Synthesizer(_))));

    let bad_voice = VoiceConfig {
        language: "en us".to_string(),
        ..VoiceConfig::default()
    };
    assert!(synth.speak_with_config("hello", &bad_voice).await.is_err());
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_audio_is_an_error() {
    let engine: Arc<dyn TtsEngine> = Arc::new(CustomTtsEngine::new("mute", |_, _| Ok(Bytes::new())));
    let synth = SpeechSynthesizer::with_engine(SpeechConfig::default(), engine).unwrap();

    let err = synth.speak("hello").await.unwrap_err();
    assert!(err.to_string().contains("mute"));
    assert_eq!(synth.cache_len(), 0);
}

#[tokio::test]
async fn test_engine_errors_are_not_cached() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let engine: Arc<dyn TtsEngine> = Arc::new(CustomTtsEngine::new("flaky", move |text, _| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(SpeechError::Api("temporarily unavailable".to_string()))
        } else {
            Ok(Bytes::from(text.to_string()))
        }
    }));
    let synth = SpeechSynthesizer::with_engine(SpeechConfig::default(), engine).unwrap();

    assert!(matches!(synth.speak("hello").await, Err(SpeechError::Api(_))));
    assert_eq!(synth.speak("hello").await.unwrap(), Bytes::from("hello"));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reports_engine_details() {
    let engine: Arc<dyn TtsEngine> = Arc::new(
        CustomTtsEngine::new("wav", |_, _| Ok(Bytes::from_static(b"RIFF")))
            .with_format(AudioFormat::Wav)
            .with_voices(vec!["en".to_string(), "hi".to_string()]),
    );
    let synth = SpeechSynthesizer::with_engine(SpeechConfig::default(), engine).unwrap();

    assert_eq!(synth.engine_name(), "wav");
    assert_eq!(synth.audio_format(), AudioFormat::Wav);
    assert_eq!(synth.audio_format().extension(), "wav");
    assert_eq!(synth.list_voices().await.unwrap(), vec!["en", "hi"]);
}

#[test]
fn test_invalid_config_rejected() {
    let engine: Arc<dyn TtsEngine> = Arc::new(CustomTtsEngine::new("x", |_, _| Ok(Bytes::new())));
    let config = SpeechConfig {
        volume: 2.0,
        ..SpeechConfig::default()
    };
    assert!(matches!(SpeechSynthesizer::with_engine(config, engine), Err(SpeechError::Config(_))));
}
