//! Audio playback through an installed command-line player

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::process;
use crate::{Error, Result};

/// Something that can play an audio file to the speakers
#[async_trait]
pub trait Player: Send + Sync {
    /// Play the file at `path`, returning once playback has finished
    ///
    /// # Errors
    ///
    /// Returns `Error::NoPlayer` if nothing can play audio, `Error::Playback`
    /// if the player fails, or `Error::Cancelled` if `cancel` fires
    async fn play(&self, path: &Path, cancel: &CancellationToken) -> Result<()>;
}

/// Known player binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerBackend {
    /// macOS `afplay`
    Afplay,
    /// SoX `play`
    Sox,
    /// FFmpeg `ffplay`
    Ffplay,
}

impl PlayerBackend {
    /// Probe order
    pub const PRIORITY: [Self; 3] = [Self::Afplay, Self::Sox, Self::Ffplay];

    /// Binary name looked up on `PATH`
    #[must_use]
    pub const fn binary(self) -> &'static str {
        match self {
            Self::Afplay => "afplay",
            Self::Sox => "play",
            Self::Ffplay => "ffplay",
        }
    }

    /// Arguments that play `path` and exit when done
    #[must_use]
    pub fn args(self, path: &Path) -> Vec<OsString> {
        match self {
            Self::Afplay | Self::Sox => vec![path.into()],
            Self::Ffplay => vec!["-autoexit".into(), "-nodisp".into(), path.into()],
        }
    }

    /// First installed player in priority order
    #[must_use]
    pub fn detect() -> Option<(Self, PathBuf)> {
        Self::detect_with(|binary| which::which(binary).ok())
    }

    /// First player in priority order that `lookup` can resolve
    pub fn detect_with<F>(lookup: F) -> Option<(Self, PathBuf)>
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        Self::PRIORITY
            .into_iter()
            .find_map(|backend| lookup(backend.binary()).map(|path| (backend, path)))
    }
}

/// Plays files with whichever player was found at startup
#[derive(Debug, Clone, Default)]
pub struct SystemPlayer {
    backend: Option<(PlayerBackend, PathBuf)>,
}

impl SystemPlayer {
    /// Probe for an installed player
    ///
    /// A missing player is not an error here; `play` reports it instead.
    #[must_use]
    pub fn detect() -> Self {
        let backend = PlayerBackend::detect();
        match &backend {
            Some((player, path)) => {
                tracing::info!(
                    player = player.binary(),
                    path = %path.display(),
                    "playback backend selected"
                );
            }
            None => tracing::warn!("no audio player found, replies will not be played"),
        }
        Self { backend }
    }

    /// Use a specific player binary
    #[must_use]
    pub const fn with_backend(backend: PlayerBackend, program: PathBuf) -> Self {
        Self {
            backend: Some((backend, program)),
        }
    }

    /// The selected player, if any
    #[must_use]
    pub fn backend(&self) -> Option<PlayerBackend> {
        self.backend.as_ref().map(|(backend, _)| *backend)
    }
}

#[async_trait]
impl Player for SystemPlayer {
    async fn play(&self, path: &Path, cancel: &CancellationToken) -> Result<()> {
        let Some((backend, program)) = &self.backend else {
            return Err(Error::NoPlayer);
        };

        let mut cmd = Command::new(program);
        cmd.args(backend.args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        tracing::debug!(player = backend.binary(), path = %path.display(), "playing");
        let status = process::run(cmd, cancel).await?;

        if !status.success() {
            return Err(Error::Playback(format!(
                "{} exited with {status}",
                backend.binary()
            )));
        }

        tracing::debug!("playback complete");
        Ok(())
    }
}
