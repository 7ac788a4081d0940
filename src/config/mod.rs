//! Configuration management for the voicebot
//!
//! Values are layered: environment variables win over the TOML file, which
//! wins over built-in defaults. CLI flags are applied on top by the binary.

pub mod file;

use secrecy::SecretString;
use url::Url;

use crate::voice::{CaptureSettings, DEFAULT_LOCALE, PREFERRED_VOICES};
use crate::{Error, Result};

use self::file::VoicebotConfigFile;

/// Default API base URL (a local OpenAI-compatible server)
pub const DEFAULT_API_BASE: &str = "http://localhost:8080/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Default synthesis model
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

/// Default synthesis voice
pub const DEFAULT_TTS_VOICE: &str = "alloy";

/// Default system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, witty, and friendly AI. Act like a human, \
but remember that you aren't a human and that you can't do human things in the real world. \
Your voice and personality should be warm and engaging, with a lively and playful tone. \
If interacting in a non-English language, start by using the standard accent or dialect \
familiar to the user. Talk quickly. You should always call a function if you can. \
Answer as briefly and concisely as possible. Keep it short.";

/// Voicebot configuration
#[derive(Debug)]
pub struct Config {
    /// OpenAI-compatible service
    pub api: ApiConfig,

    /// Chat model settings
    pub llm: LlmConfig,

    /// Speech settings
    pub voice: VoiceConfig,

    /// Recorder silence detection
    pub capture: CaptureSettings,
}

/// OpenAI-compatible service
#[derive(Debug)]
pub struct ApiConfig {
    /// Base URL, e.g. `http://localhost:8080/v1`
    pub base_url: String,

    /// Bearer key (from `OPENAI_API_KEY`)
    pub key: Option<SecretString>,
}

/// Chat model settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Opening system message; empty disables it
    pub system_prompt: String,

    /// Bound on tool rounds per turn; `None` is unbounded
    pub max_tool_rounds: Option<u32>,

    /// Stream replies to the console as they are generated
    pub stream: bool,
}

/// Speech settings
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1"); empty speaks through a local voice
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Locale for local voices when no language was detected
    pub default_language: String,

    /// Local voice names tried first
    pub preferred_voices: Vec<String>,
}

impl VoiceConfig {
    /// Whether replies are synthesized remotely
    #[must_use]
    pub fn remote_synthesis(&self) -> bool {
        !self.tts_model.trim().is_empty()
    }
}

impl Config {
    /// Load configuration from environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn from_sources<F>(fc: VoicebotConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = env("OPENAI_API_BASE")
            .filter(|v| !v.trim().is_empty())
            .or(fc.api.base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("invalid API base URL {base_url:?}: {e}")))?;

        let key = env("OPENAI_API_KEY")
            .or(fc.api.key)
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let api = ApiConfig { base_url, key };

        let max_tool_rounds = match env("VOICEBOT_MAX_TOOL_ROUNDS") {
            Some(raw) => Some(raw.trim().parse::<u32>().map_err(|e| {
                Error::Config(format!("invalid VOICEBOT_MAX_TOOL_ROUNDS {raw:?}: {e}"))
            })?),
            None => fc.llm.max_tool_rounds,
        };

        let llm = LlmConfig {
            model: env("VOICEBOT_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: env("VOICEBOT_SYSTEM_PROMPT")
                .or(fc.llm.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tool_rounds,
            stream: fc.llm.stream.unwrap_or(true),
        };

        // An empty TTS model is meaningful: it selects the local voice
        let voice = VoiceConfig {
            stt_model: env("VOICEBOT_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            tts_model: env("VOICEBOT_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tts_voice: env("VOICEBOT_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
            default_language: env("VOICEBOT_LANGUAGE")
                .or(fc.voice.default_language)
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            preferred_voices: fc.voice.preferred_voices.unwrap_or_else(|| {
                PREFERRED_VOICES.iter().map(ToString::to_string).collect()
            }),
        };

        let defaults = CaptureSettings::default();
        let capture = CaptureSettings {
            sox_threshold: fc.capture.sox_threshold.unwrap_or(defaults.sox_threshold),
            sox_stop_secs: fc.capture.sox_stop_secs.unwrap_or(defaults.sox_stop_secs),
            ffmpeg_noise_db: fc.capture.ffmpeg_noise_db.unwrap_or(defaults.ffmpeg_noise_db),
            ffmpeg_silence_secs: fc
                .capture
                .ffmpeg_silence_secs
                .unwrap_or(defaults.ffmpeg_silence_secs),
        };
        if capture.sox_stop_secs <= 0.0 || capture.ffmpeg_silence_secs <= 0.0 {
            return Err(Error::Config(
                "capture silence durations must be positive".to_string(),
            ));
        }

        Ok(Self {
            api,
            llm,
            voice,
            capture,
        })
    }
}
