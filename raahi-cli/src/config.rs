//! `raahi.toml`: one file for the vision, narration and speech settings

use anyhow::Context;
use raahi_eye::{NarrationConfig, VisionConfig};
use raahi_spk::SpeechConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything the `raahi` binary can be configured with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub vision: VisionConfig,
    pub narration: NarrationConfig,
    pub speech: SpeechConfig,
    pub output: OutputConfig,
}

/// Where synthesized narration goes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Keep the audio here; the extension is replaced to match the engine
    pub audio_file: Option<PathBuf>,
    /// Player command, e.g. `mpv --really-quiet`; the audio path is appended
    pub player: Option<String>,
    /// Fall back to an installed platform player when `player` is unset
    pub autoplay: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            audio_file: None,
            player: None,
            autoplay: true,
        }
    }
}

/// Resolved destination for one narration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    /// File the audio is written to
    pub path: PathBuf,
    /// Player run on `path` afterwards
    pub player: Option<String>,
}

#[cfg(target_os = "macos")]
fn default_players(_extension: &str) -> &'static [&'static str] {
    &["afplay"]
}

#[cfg(not(target_os = "macos"))]
fn default_players(extension: &str) -> &'static [&'static str] {
    if extension == "wav" {
        &["paplay", "aplay -q", "mpv --really-quiet", "ffplay -nodisp -autoexit -loglevel quiet"]
    } else {
        &["mpv --really-quiet", "ffplay -nodisp -autoexit -loglevel quiet"]
    }
}

/// Whether the program of `command` is an executable file on `PATH`
pub fn program_on_path(command: &str) -> bool {
    let Some(program) = command.split_whitespace().next() else {
        return false;
    };
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}

impl OutputConfig {
    /// Decide where audio in `extension` format goes. `None` means nothing
    /// would consume it, so synthesis can be skipped.
    pub fn plan(&self, extension: &str, is_installed: impl Fn(&str) -> bool) -> Option<OutputPlan> {
        let player = match self.player {
            Some(ref player) => Some(player.clone()),
            None if self.autoplay => default_players(extension)
                .iter()
                .find(|candidate| is_installed(candidate))
                .map(|candidate| candidate.to_string()),
            None => None,
        };

        let path = match (&self.audio_file, &player) {
            (Some(file), _) => file.with_extension(extension),
            (None, Some(_)) => std::env::temp_dir().join(format!("raahi-narration.{}", extension)),
            (None, None) => return None,
        };
        Some(OutputPlan { path, player })
    }
}

/// Command line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub no_speech: bool,
    pub audio_out: Option<PathBuf>,
    pub camera_id: Option<u32>,
    pub scan_duration_secs: Option<f64>,
}

impl AppConfig {
    /// Read `path` if given, otherwise start from defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };
        Ok(config)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply(&mut self, overrides: &Overrides) -> anyhow::Result<()> {
        if overrides.no_speech {
            self.speech.enabled = false;
        }
        if let Some(ref path) = overrides.audio_out {
            self.output.audio_file = Some(path.clone());
        }
        if let Some(camera_id) = overrides.camera_id {
            self.vision.camera_id = camera_id;
        }
        if let Some(secs) = overrides.scan_duration_secs {
            if !secs.is_finite() || secs <= 0.0 {
                anyhow::bail!("Scan duration must be a positive number of seconds");
            }
            self.narration.scan_duration_ms = (secs * 1000.0).round().max(1.0) as u64;
        }
        Ok(())
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.vision.validate().map_err(|e| format!("vision: {}", e))?;
        self.narration.validate().map_err(|e| format!("narration: {}", e))?;
        if self.speech.enabled {
            self.speech.validate().map_err(|e| format!("speech: {}", e))?;
        }
        if let Some(ref player) = self.output.player {
            if player.split_whitespace().next().is_none() {
                return Err("output: player command cannot be blank".to_string());
            }
        }
        Ok(())
    }
}
