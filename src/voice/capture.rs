//! Audio capture from the microphone through an external recorder
//!
//! Two recorder backends are probed in priority order:
//! - SoX stops by itself once it hears silence after sound
//! - FFmpeg records until its `silencedetect` filter logs `silence_start`
//!   on stderr, at which point it is interrupted so it finalizes the file

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::scratch::ScratchFile;
use super::{AudioClip, AudioFormat, process};
use crate::{Error, Result};

static SILENCE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"silence_start:\s*(-?\d+(?:\.\d+)?)").expect("valid regex")
});

static SILENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"silence_end:").expect("valid regex"));

/// Something that can record one utterance
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Record until the speaker pauses
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if `cancel` fires, `Error::NoCaptureBackend`
    /// if recording is impossible, or `Error::Capture` for a failed recording
    async fn capture(&self, cancel: &CancellationToken) -> Result<AudioClip>;
}

/// Silence detection parameters for both recorder backends
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// SoX amplitude threshold in percent
    pub sox_threshold: f32,
    /// Seconds of silence after which SoX stops
    pub sox_stop_secs: f32,
    /// FFmpeg `silencedetect` noise floor in dB
    pub ffmpeg_noise_db: i32,
    /// Seconds of silence before FFmpeg logs `silence_start`
    pub ffmpeg_silence_secs: f32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sox_threshold: 1.0,
            sox_stop_secs: 1.5,
            ffmpeg_noise_db: -30,
            ffmpeg_silence_secs: 1.0,
        }
    }
}

/// FFmpeg input format and device for the default microphone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDevice {
    /// Value for `-f`
    pub format: &'static str,
    /// Value for `-i`
    pub input: &'static str,
}

impl InputDevice {
    /// Default microphone for an OS name as in `std::env::consts::OS`
    #[must_use]
    pub fn for_os(os: &str) -> Option<Self> {
        match os {
            "macos" => Some(Self {
                format: "avfoundation",
                input: ":0",
            }),
            "windows" => Some(Self {
                format: "dshow",
                input: "audio=default",
            }),
            "linux" => Some(Self {
                format: "alsa",
                input: "default",
            }),
            _ => None,
        }
    }
}

/// Installed recorder binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureBackend {
    /// SoX with its built-in `silence` effect
    Sox {
        /// Path to the `sox` binary
        program: PathBuf,
    },
    /// FFmpeg with the `silencedetect` filter
    Ffmpeg {
        /// Path to the `ffmpeg` binary
        program: PathBuf,
        /// Microphone for this platform
        device: InputDevice,
    },
}

impl CaptureBackend {
    /// Probe for an installed recorder, SoX first
    ///
    /// # Errors
    ///
    /// Returns `Error::NoCaptureBackend` if neither recorder is usable
    pub fn detect() -> Result<Self> {
        if let Ok(program) = which::which("sox") {
            return Ok(Self::Sox { program });
        }

        if let Ok(program) = which::which("ffmpeg") {
            let os = std::env::consts::OS;
            if let Some(device) = InputDevice::for_os(os) {
                return Ok(Self::Ffmpeg { program, device });
            }
            tracing::warn!(os, "ffmpeg found but no input device is known for this platform");
        }

        Err(Error::NoCaptureBackend)
    }

    /// Short backend name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sox { .. } => "sox",
            Self::Ffmpeg { .. } => "ffmpeg",
        }
    }

    fn program(&self) -> &Path {
        match self {
            Self::Sox { program } | Self::Ffmpeg { program, .. } => program,
        }
    }

    /// Command-line arguments that record into `output`
    #[must_use]
    pub fn args(&self, output: &Path, settings: &CaptureSettings) -> Vec<OsString> {
        match self {
            Self::Sox { .. } => {
                let threshold = format!("{}%", settings.sox_threshold);
                vec![
                    "-d".into(),
                    output.into(),
                    "silence".into(),
                    // start on the first sound
                    "1".into(),
                    "0.0".into(),
                    threshold.clone().into(),
                    // stop after the configured pause
                    "1".into(),
                    settings.sox_stop_secs.to_string().into(),
                    threshold.into(),
                ]
            }
            Self::Ffmpeg { device, .. } => {
                let filter = format!(
                    "silencedetect=noise={}dB:d={}",
                    settings.ffmpeg_noise_db, settings.ffmpeg_silence_secs
                );
                vec![
                    "-nostdin".into(),
                    "-f".into(),
                    device.format.into(),
                    "-i".into(),
                    device.input.into(),
                    "-af".into(),
                    filter.into(),
                    output.into(),
                ]
            }
        }
    }
}

/// Records through an external recorder process into a scratch file
#[derive(Debug, Clone)]
pub struct SubprocessRecorder {
    backend: CaptureBackend,
    settings: CaptureSettings,
    scratch_dir: Option<PathBuf>,
}

impl SubprocessRecorder {
    /// Create a recorder for a detected backend
    #[must_use]
    pub const fn new(backend: CaptureBackend, settings: CaptureSettings) -> Self {
        Self {
            backend,
            settings,
            scratch_dir: None,
        }
    }

    /// Record into `dir` instead of the system temp directory
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Probe for a backend and create a recorder for it
    ///
    /// # Errors
    ///
    /// Returns `Error::NoCaptureBackend` if no recorder is installed
    pub fn detect(settings: CaptureSettings) -> Result<Self> {
        let backend = CaptureBackend::detect()?;
        tracing::info!(backend = backend.name(), "capture backend selected");
        Ok(Self::new(backend, settings))
    }

    /// The backend in use
    #[must_use]
    pub const fn backend(&self) -> &CaptureBackend {
        &self.backend
    }
}

#[async_trait]
impl AudioSource for SubprocessRecorder {
    async fn capture(&self, cancel: &CancellationToken) -> Result<AudioClip> {
        let scratch = match &self.scratch_dir {
            Some(dir) => ScratchFile::in_dir(dir, AudioFormat::Wav),
            None => ScratchFile::new(AudioFormat::Wav),
        };

        let mut cmd = Command::new(self.backend.program());
        cmd.args(self.backend.args(scratch.path(), &self.settings))
            .stdin(Stdio::null())
            .stdout(Stdio::null());

        tracing::debug!(
            backend = self.backend.name(),
            path = %scratch.path().display(),
            "recording started"
        );

        match self.backend {
            CaptureBackend::Sox { .. } => {
                cmd.stderr(Stdio::null());
                let status = process::run(cmd, cancel).await?;
                if !status.success() {
                    return Err(Error::Capture(format!("sox exited with {status}")));
                }
            }
            CaptureBackend::Ffmpeg { .. } => record_until_silence(cmd, cancel).await?,
        }

        // `scratch` is dropped on return, removing the file whatever happened
        let data = scratch
            .read()
            .await
            .map_err(|e| Error::Capture(format!("failed to read recording: {e}")))?;

        let clip = AudioClip::wav(data);
        tracing::debug!(
            bytes = clip.data.len(),
            duration = ?clip.duration(),
            "recording finished"
        );
        Ok(clip)
    }
}

/// Result of scanning a recorder's diagnostic stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Silence started after the speaker had been heard
    Silence,
    /// The stream ended without an endpoint
    Closed,
    /// Scanning was cancelled
    Cancelled,
}

/// Read diagnostic output line by line until the utterance ends
///
/// A `silence_start` marker ends the utterance only once sound has been
/// heard: either a `silence_end` marker was seen before it or the silence
/// starts after time zero. Leading silence keeps the scan going.
pub async fn scan_for_silence<R>(mut reader: R, cancel: CancellationToken) -> ScanOutcome
where
    R: AsyncBufRead + Unpin,
{
    let mut heard_sound = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            () = cancel.cancelled() => return ScanOutcome::Cancelled,
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => return ScanOutcome::Closed,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "recorder diagnostics unreadable");
                return ScanOutcome::Closed;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        tracing::trace!(line = %line.trim_end(), "recorder");

        if SILENCE_END.is_match(&line) {
            heard_sound = true;
            continue;
        }

        if let Some(caps) = SILENCE_START.captures(&line) {
            let at: f64 = caps[1].parse().unwrap_or(0.0);
            if heard_sound || at > 0.0 {
                tracing::debug!(at, "silence detected, ending utterance");
                return ScanOutcome::Silence;
            }
            tracing::trace!("leading silence, still waiting for speech");
        }
    }
}

/// Run a recorder whose stderr announces silence and stop it on the marker
pub(crate) async fn record_until_silence(
    mut cmd: Command,
    cancel: &CancellationToken,
) -> Result<()> {
    cmd.stderr(Stdio::piped()).kill_on_drop(true);
    let mut child = cmd.spawn()?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Capture("recorder stderr unavailable".to_string()))?;

    let scan_cancel = cancel.child_token();
    let scanner = tokio::spawn(scan_for_silence(BufReader::new(stderr), scan_cancel.clone()));

    let outcome = match scanner.await {
        Ok(outcome) => outcome,
        Err(e) => {
            scan_cancel.cancel();
            if let Err(stop_err) = process::stop(&mut child).await {
                tracing::warn!(error = %stop_err, "failed to stop recorder");
            }
            return Err(Error::Capture(format!("silence scanner failed: {e}")));
        }
    };

    match outcome {
        ScanOutcome::Silence => {
            let status = process::stop(&mut child).await?;
            tracing::debug!(%status, "recorder stopped");
            Ok(())
        }
        ScanOutcome::Cancelled => {
            if let Err(e) = process::stop(&mut child).await {
                tracing::warn!(error = %e, "failed to stop recorder on cancel");
            }
            Err(Error::Cancelled)
        }
        ScanOutcome::Closed => {
            let status = child.wait().await?;
            if status.success() {
                Ok(())
            } else {
                Err(Error::Capture(format!("recorder exited with {status}")))
            }
        }
    }
}
