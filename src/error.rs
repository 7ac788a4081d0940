//! Error types for the voicebot

use thiserror::Error;

/// Result type alias for voicebot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the voice loop
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No recorder binary is installed
    #[error("no capture backend found (install SoX or FFmpeg)")]
    NoCaptureBackend,

    /// Recording failed
    #[error("capture error: {0}")]
    Capture(String),

    /// No player binary is installed
    #[error("no supported player found (install afplay, SoX or FFmpeg)")]
    NoPlayer,

    /// Player process failed
    #[error("playback error: {0}")]
    Playback(String),

    /// Local voice error
    #[error("voice error: {0}")]
    Voice(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Chat completion error
    #[error("completion error: {0}")]
    Completion(String),

    /// Model asked for a tool that is not registered
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Tool execution error
    #[error("tool error: {0}")]
    Tool(String),

    /// Model kept requesting tools past the configured bound
    #[error("tool loop exceeded after {0} rounds")]
    ToolLoopExceeded(u32),

    /// Shutdown was requested
    #[error("cancelled")]
    Cancelled,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error ends the voice loop instead of just the current turn
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoCaptureBackend | Self::Completion(_) | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(Error::NoCaptureBackend.is_fatal());
        assert!(Error::Cancelled.is_fatal());
        assert!(Error::Completion("boom".to_string()).is_fatal());

        assert!(!Error::NoPlayer.is_fatal());
        assert!(!Error::Stt("bad audio".to_string()).is_fatal());
        assert!(!Error::Tts("request failed: connection refused".to_string()).is_fatal());
        assert!(!Error::ToolLoopExceeded(3).is_fatal());
        assert!(!Error::UnknownTool("x".to_string()).is_fatal());
    }

    #[test]
    fn unknown_tool_message_names_the_tool() {
        let err = Error::UnknownTool("turn_lights".to_string());
        assert_eq!(err.to_string(), "unknown tool: turn_lights");
    }
}
