//! Voice processing module
//!
//! Handles audio capture, playback, local voices and the remote
//! transcription/synthesis collaborators. Everything audio travels as
//! uncompressed WAV through uniquely named scratch files.

mod capture;
mod language;
mod playback;
mod process;
mod say;
mod scratch;
mod stt;
mod tts;

use std::io::Cursor;
use std::time::Duration;

pub use capture::{
    AudioSource, CaptureBackend, CaptureSettings, InputDevice, ScanOutcome, SubprocessRecorder,
    scan_for_silence,
};
pub use language::language_tag;
pub use playback::{Player, PlayerBackend, SystemPlayer};
pub use say::{
    DEFAULT_LOCALE, LocalSpeaker, PREFERRED_VOICES, SystemVoice, Voice, VoiceQuality,
    parse_voice_list, select_voice,
};
pub use scratch::ScratchFile;
pub use stt::{SpeechToText, Transcriber, Transcription};
pub use tts::{Synthesizer, TextToSpeech};

/// Audio container used end-to-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    /// Uncompressed PCM in a RIFF/WAVE container
    #[default]
    Wav,
}

impl AudioFormat {
    /// File extension without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }

    /// MIME type for uploads
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
        }
    }

    /// Value for the `response_format` field of speech requests
    #[must_use]
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }
}

/// A finished piece of audio held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Encoded bytes
    pub data: Vec<u8>,
    /// Container format of `data`
    pub format: AudioFormat,
}

impl AudioClip {
    /// Wrap WAV bytes
    #[must_use]
    pub const fn wav(data: Vec<u8>) -> Self {
        Self {
            data,
            format: AudioFormat::Wav,
        }
    }

    /// Whether the clip holds no bytes at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File name used when uploading the clip
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("audio.{}", self.format.extension())
    }

    /// Playing time read from the WAV header, if it parses
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let reader = hound::WavReader::new(Cursor::new(&self.data)).ok()?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return None;
        }
        let frames = reader.duration();
        Some(Duration::from_secs_f64(
            f64::from(frames) / f64::from(spec.sample_rate),
        ))
    }
}
