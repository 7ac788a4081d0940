//! Transient audio files for handing bytes to external processes

use std::path::{Path, PathBuf};

use super::AudioFormat;
use crate::Result;

/// A uniquely named file in the platform temp directory
///
/// The file is removed when the guard is dropped, on every exit path.
/// Creating the guard does not touch the filesystem; recorders create the
/// file themselves.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserve a fresh path in the system temp directory
    #[must_use]
    pub fn new(format: AudioFormat) -> Self {
        Self::in_dir(&std::env::temp_dir(), format)
    }

    /// Reserve a fresh path in `dir`
    #[must_use]
    pub fn in_dir(dir: &Path, format: AudioFormat) -> Self {
        let name = format!("{}.{}", uuid::Uuid::new_v4(), format.extension());
        Self {
            path: dir.join(name),
        }
    }

    /// Location of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `data` to the file, replacing any previous content
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }

    /// Read the whole file
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or unreadable
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "scratch file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove scratch file"
                );
            }
        }
    }
}
