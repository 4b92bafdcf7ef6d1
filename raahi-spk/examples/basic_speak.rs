//! Basic speech synthesis example: writes the spoken sentence to an MP3/WAV file

use raahi_spk::{SpeechConfig, SpeechSynthesizer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let text = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "I see person close at your left, and chair far away at your right.".to_string());

    let synthesizer = SpeechSynthesizer::new(SpeechConfig::default())?;
    println!("Synthesizing with {}...", synthesizer.engine_name());

    match synthesizer.speak(&text).await {
        Ok(audio) => {
            let path = format!("speech.{}", synthesizer.audio_format().extension());
            std::fs::write(&path, &audio)?;
            println!("Wrote {} bytes of audio to {}", audio.len(), path);
        }
        Err(e) => eprintln!("Failed to synthesize speech: {}", e),
    }

    Ok(())
}
