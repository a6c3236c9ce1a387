//! Content-addressed cache for optimized images.
//!
//! Entries are keyed by a SHA-256 over the compressor fingerprint, the file
//! extension and the input bytes, and stored one file per key. The cache
//! lives outside the distribution tree so cleaning `dist` keeps it warm.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// On-disk cache of compressor outputs.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    /// Create a cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Compute the cache key for an input.
    pub fn key(fingerprint: &str, extension: &str, input: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(fingerprint.as_bytes());
        hasher.update([0u8]);
        hasher.update(extension.to_ascii_lowercase().as_bytes());
        hasher.update([0u8]);
        hasher.update(input);
        format!("{:x}", hasher.finalize())
    }

    /// Look up a stored output.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        match fs::read(self.entry_path(key)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!(key, error = %e, "unreadable cache entry");
                None
            }
        }
    }

    /// Store an output. Written to a uniquely named temporary file first,
    /// then renamed, so concurrent writers of one key never collide.
    pub fn put(&self, key: &str, output: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(output)?;
        tmp.persist(self.entry_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "bin"))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", key))
    }
}
