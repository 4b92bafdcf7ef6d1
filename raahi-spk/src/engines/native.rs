//! Native platform TTS engine: drives espeak-ng on Linux and `say` on macOS

use crate::config::VoiceConfig;
use crate::engines::{AudioFormat, TtsEngine};
use crate::error::SpeechError;
use async_trait::async_trait;
use bytes::Bytes;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const MAX_AUDIO_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// External speech program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeProgram {
    EspeakNg,
    Say,
}

impl NativeProgram {
    /// The program this platform ships or commonly installs
    pub fn for_platform() -> Self {
        if cfg!(target_os = "macos") {
            NativeProgram::Say
        } else {
            NativeProgram::EspeakNg
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            NativeProgram::EspeakNg => "espeak-ng",
            NativeProgram::Say => "say",
        }
    }

    fn is_installed(&self) -> bool {
        let mut cmd = std::process::Command::new(self.command());
        match self {
            NativeProgram::EspeakNg => cmd.arg("--version"),
            NativeProgram::Say => cmd.arg("-v").arg("?"),
        };
        cmd.stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

/// Native TTS engine (platform-specific)
pub struct NativeTtsEngine {
    program: Option<NativeProgram>,
    rate: u32,
    volume: f32,
    pitch: f32,
}

impl NativeTtsEngine {
    pub fn new() -> Self {
        Self::new_with_config(150, 0.8, 0.0)
    }

    pub fn new_with_config(rate: u32, volume: f32, pitch: f32) -> Self {
        let program = NativeProgram::for_platform();
        let program = if program.is_installed() {
            info!("Native TTS engine using {}", program.command());
            Some(program)
        } else {
            warn!("{} not found, native TTS unavailable", program.command());
            None
        };

        Self {
            program,
            rate,
            volume,
            pitch,
        }
    }

    /// Arguments for writing `text` (read from stdin) into `out`
    fn arguments(&self, program: NativeProgram, voice: &VoiceConfig, out: &str) -> Vec<String> {
        match program {
            NativeProgram::EspeakNg => {
                // Amplitude 0-200 (100 normal), pitch 0-99 (50 normal)
                let amplitude = (self.volume * 200.0).round().clamp(0.0, 200.0) as u32;
                let pitch = (50.0 + self.pitch * 49.0).round().clamp(0.0, 99.0) as u32;
                let voice_name = voice.name.clone().unwrap_or_else(|| voice.language.clone());
                vec![
                    "-s".to_string(),
                    self.rate.to_string(),
                    "-a".to_string(),
                    amplitude.to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                    "-v".to_string(),
                    voice_name,
                    "-w".to_string(),
                    out.to_string(),
                    "--stdin".to_string(),
                ]
            }
            NativeProgram::Say => {
                let mut args = vec![
                    "-r".to_string(),
                    self.rate.max(1).to_string(),
                    "-o".to_string(),
                    out.to_string(),
                    "--file-format=WAVE".to_string(),
                    "--data-format=LEI16@22050".to_string(),
                    "-f".to_string(),
                    "-".to_string(),
                ];
                if let Some(ref name) = voice.name {
                    args.push("-v".to_string());
                    args.push(name.clone());
                }
                args
            }
        }
    }
}

impl Default for NativeTtsEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtsEngine for NativeTtsEngine {
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> Result<Bytes, SpeechError> {
        let program = self
            .program
            .ok_or_else(|| SpeechError::Engine("No native speech program available".to_string()))?;

        // Control characters other than line breaks confuse both programs
        let sanitized: String = text
            .chars()
            .filter(|c| !c.is_control() || *c == '\n')
            .take(100_000)
            .collect();
        if sanitized.trim().is_empty() {
            return Err(SpeechError::Synthesizer("Text is empty after sanitization".to_string()));
        }

        let out = tempfile::Builder::new().prefix("raahi-").suffix(".wav").tempfile()?;
        let out_path = out.path().to_string_lossy().to_string();

        let mut child = spawn_with_stdin(program.command(), &self.arguments(program, config, &out_path))
            .map_err(|e| SpeechError::Engine(format!("Failed to run {}: {}", program.command(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(sanitized.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SpeechError::Engine(format!(
                "{} failed: {}",
                program.command(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let size = tokio::fs::metadata(out.path()).await?.len();
        if size > MAX_AUDIO_FILE_SIZE {
            return Err(SpeechError::Engine(format!(
                "Generated audio file too large ({} bytes, max {} bytes)",
                size, MAX_AUDIO_FILE_SIZE
            )));
        }

        let audio = tokio::fs::read(out.path()).await?;
        debug!("{} produced {} bytes", program.command(), audio.len());
        Ok(Bytes::from(audio))
    }

    async fn list_voices(&self) -> Result<Vec<String>, SpeechError> {
        let program = match self.program {
            Some(program) => program,
            None => return Ok(Vec::new()),
        };

        let mut cmd = Command::new(program.command());
        match program {
            NativeProgram::EspeakNg => cmd.arg("--voices"),
            NativeProgram::Say => cmd.arg("-v").arg("?"),
        };
        let output = cmd
            .output()
            .await
            .map_err(|e| SpeechError::Engine(format!("Failed to list voices: {}", e)))?;

        if !output.status.success() {
            return Ok(Vec::new());
        }

        Ok(parse_voice_listing(program, &String::from_utf8_lossy(&output.stdout)))
    }

    fn is_available(&self) -> bool {
        self.program.is_some()
    }

    fn name(&self) -> &str {
        "native"
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Wav
    }
}

/// Start `program` reading text from stdin. The child is killed when the
/// handle is dropped, so a cancelled synthesis leaves nothing running.
fn spawn_with_stdin(program: &str, args: &[String]) -> std::io::Result<Child> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// espeak-ng prints a header then `Pty Language Age/Gender VoiceName ...`;
/// `say -v ?` prints `Name  locale  # sample`.
fn parse_voice_listing(program: NativeProgram, listing: &str) -> Vec<String> {
    let column = |line: &str, n: usize| line.split_whitespace().nth(n).map(|s| s.to_string());
    let voices = match program {
        NativeProgram::EspeakNg => listing.lines().skip(1).filter_map(|l| column(l, 1)).collect::<Vec<_>>(),
        NativeProgram::Say => listing.lines().filter_map(|l| column(l, 0)).collect(),
    };
    voices
        .into_iter()
        .filter(|v| v.len() <= 256 && !v.chars().any(|c| c.is_control()))
        .take(1000)
        .collect()
}
