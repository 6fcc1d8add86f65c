//! Choosing where an accepted file lands.
//!
//! Files go into one download directory. If the offered name is taken,
//! a numeric suffix is added before the extension: `a.iso`, `a_1.iso`,
//! `a_2.iso`. The chosen file is created empty right away so two offers
//! for the same name can not pick the same path.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Highest suffix tried before giving up.
const MAX_SUFFIX: u32 = 10_000;

/// Errors choosing a download location.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    /// The offered name has no usable file name component.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// Every candidate name up to the limit already exists.
    #[error("no free file name for {0:?}")]
    Exhausted(String),

    /// Creating the directory or file failed.
    #[error("failed to create {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Places incoming files in a download directory without overwriting.
#[derive(Debug, Clone)]
pub struct DownloadPlacement {
    dir: PathBuf,
}

impl DownloadPlacement {
    /// Place files under `dir`. The directory is created on first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The download directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a free path for `file_name` and return it.
    ///
    /// Only the final component of `file_name` is used, so a sender can not
    /// direct the file outside the download directory.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError`] if the name is unusable, the directory or
    /// file can not be created, or no free name is found.
    pub fn place(&self, file_name: &str) -> Result<PathBuf, PlacementError> {
        let name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| PlacementError::InvalidName(file_name.to_string()))?;

        std::fs::create_dir_all(&self.dir).map_err(|source| PlacementError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let (stem, extension) = split_extension(name);
        for suffix in 0..=MAX_SUFFIX {
            let candidate = if suffix == 0 {
                self.dir.join(name)
            } else {
                self.dir.join(format!("{stem}_{suffix}{extension}"))
            };

            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(_) => {
                    tracing::debug!(path = %candidate.display(), "download location reserved");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(source) => {
                    return Err(PlacementError::Io {
                        path: candidate,
                        source,
                    });
                }
            }
        }

        Err(PlacementError::Exhausted(name.to_string()))
    }

    /// Give back a location from [`place`](Self::place) that will not be
    /// used, freeing its name. A file already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::Io`] if the file can not be removed.
    pub fn release(&self, path: &Path) -> Result<(), PlacementError> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "download location released");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PlacementError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Split `a.tar.gz` into `("a.tar", ".gz")`. Leading-dot names have no
/// extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(i) => name.split_at(i),
    }
}
