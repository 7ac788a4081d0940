//! TOML configuration file loading
//!
//! Supports `~/.config/voicebot/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoicebotConfigFile {
    /// OpenAI-compatible service
    #[serde(default)]
    pub api: ApiFileConfig,

    /// Chat model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Recorder silence detection
    #[serde(default)]
    pub capture: CaptureFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiFileConfig {
    /// Base URL (e.g. "http://localhost:8080/v1")
    pub base_url: Option<String>,

    /// Bearer key
    pub key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    pub system_prompt: Option<String>,

    /// Bound on tool rounds per turn
    pub max_tool_rounds: Option<u32>,

    /// Stream replies as they are generated
    pub stream: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1"); empty uses the local voice
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// Locale for local voices when no language was detected
    pub default_language: Option<String>,

    /// Local voice names to try first
    pub preferred_voices: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    pub sox_threshold: Option<f32>,
    pub sox_stop_secs: Option<f32>,
    pub ffmpeg_noise_db: Option<i32>,
    pub ffmpeg_silence_secs: Option<f32>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoicebotConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoicebotConfigFile {
    config_file_path().map_or_else(VoicebotConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> VoicebotConfigFile {
    if !path.exists() {
        return VoicebotConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoicebotConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoicebotConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voicebot/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voicebot").join("config.toml"))
}
