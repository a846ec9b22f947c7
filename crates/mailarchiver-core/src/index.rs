//! Ingestion index.
//!
//! The index is the set of message keys already archived. On disk it is a
//! plain text file with one key per line, kept sorted. It only grows.

use std::collections::BTreeSet;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{Error, Result};

/// Keys of archived messages, backed by a file.
#[derive(Debug, Clone)]
pub struct IngestionIndex {
    path: PathBuf,
    keys: BTreeSet<String>,
}

impl IngestionIndex {
    /// Loads the index at `path`. A missing file is an empty index.
    ///
    /// Keys are separated by any whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the file exists but cannot be read.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let keys = match std::fs::read_to_string(&path) {
            Ok(contents) => contents.split_whitespace().map(str::to_string).collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No index yet, starting empty");
                BTreeSet::new()
            }
            Err(source) => return Err(Error::Index { path, source }),
        };

        info!(path = %path.display(), keys = keys.len(), "Loaded ingestion index");
        Ok(Self { path, keys })
    }

    /// Location of the index file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if `key` was already archived.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Records `key` as archived. Returns `false` if it was already present.
    pub fn add(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no key was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Writes the sorted keys, replacing the file atomically.
    ///
    /// The keys go to a temporary file next to the index, which is then
    /// renamed over it. Readers see either the old or the new index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the file cannot be written.
    pub fn persist(&self) -> Result<()> {
        self.write_atomic().map_err(|source| Error::Index {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), keys = self.keys.len(), "Persisted ingestion index");
        Ok(())
    }

    fn write_atomic(&self) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            for key in &self.keys {
                writer.write_all(key.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
