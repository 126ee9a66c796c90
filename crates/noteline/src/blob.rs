//! Local image blob store.
//!
//! Copies picked images into an application-private directory and returns
//! the absolute path of the copy. The path is stored verbatim in a note's
//! `imagePath` and is only meaningful on the machine that produced it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use ulid::Ulid;

use crate::config::Config;
use crate::error::{Error, Result};

/// Suffix for copies still being written.
const PARTIAL_SUFFIX: &str = "part";

/// A directory of copied image files.
#[derive(Debug, Clone)]
pub struct BlobStore {
    directory: PathBuf,
    extension: String,
}

impl BlobStore {
    /// Create a blob store writing `*.{extension}` files into `directory`.
    ///
    /// The directory is created lazily by the first [`store`](Self::store).
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
        }
    }

    /// Create a blob store from the `[blobs]` configuration section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.image_dir(), config.blobs.extension.clone())
    }

    /// The configured directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Create the directory if needed and return its absolute form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn ensure_directory(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)
            .and_then(|()| fs::canonicalize(&self.directory))
            .map_err(|e| Error::io(&self.directory, e))
    }

    /// Copy everything `source` yields into a new file and return its
    /// absolute path.
    ///
    /// The copy is written under a temporary name and renamed into place
    /// only once complete; on failure the temporary file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if reading the source or writing the copy fails.
    pub fn store<R: Read>(&self, source: &mut R) -> Result<PathBuf> {
        let directory = self.ensure_directory()?;
        let (target, partial) = self.reserve(&directory)?;

        let copied = write_partial(&partial, source).and_then(|bytes| {
            fs::rename(&partial, &target)?;
            Ok(bytes)
        });

        match copied {
            Ok(bytes) => {
                debug!("Stored {} bytes at {}", bytes, target.display());
                Ok(target)
            }
            Err(source) => {
                if let Err(e) = fs::remove_file(&partial) {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!("Could not remove {}: {}", partial.display(), e);
                    }
                }
                Err(Error::io(target, source))
            }
        }
    }

    /// Copy the file at `source` into the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] naming `source` if it cannot be opened, or the
    /// errors of [`store`](Self::store).
    pub fn store_file(&self, source: impl AsRef<Path>) -> Result<PathBuf> {
        let source = source.as_ref();
        let mut file = File::open(source).map_err(|e| Error::io(source, e))?;
        self.store(&mut file)
    }

    /// Check whether `path` names a file inside this store's directory.
    #[must_use]
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let Ok(directory) = fs::canonicalize(&self.directory) else {
            return false;
        };
        fs::canonicalize(path.as_ref())
            .ok()
            .and_then(|p| p.parent().map(|parent| parent == directory))
            .unwrap_or(false)
    }

    /// Pick an unused file name and its temporary sibling.
    fn reserve(&self, directory: &Path) -> Result<(PathBuf, PathBuf)> {
        loop {
            let name = format!("{}.{}", Ulid::new(), self.extension);
            let target = directory.join(&name);
            let partial = directory.join(format!("{name}.{PARTIAL_SUFFIX}"));
            match OpenOptions::new().write(true).create_new(true).open(&partial) {
                Ok(_) if target.exists() => {
                    if let Err(e) = fs::remove_file(&partial) {
                        warn!("Could not remove {}: {}", partial.display(), e);
                    }
                }
                Ok(_) => return Ok((target, partial)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(Error::io(partial, e)),
            }
        }
    }
}

fn write_partial<R: Read>(partial: &Path, source: &mut R) -> io::Result<u64> {
    let mut out = OpenOptions::new().write(true).truncate(true).open(partial)?;
    let bytes = io::copy(source, &mut out)?;
    out.flush()?;
    out.sync_all()?;
    Ok(bytes)
}
