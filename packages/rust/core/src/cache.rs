//! Startup snapshot of the source cache.
//!
//! The snapshot is taken once. Entries written by filters later in the same
//! run do not show up in [`ContentCache::contains`]; filters that need to see
//! them check the disk themselves.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use folio_shared::{FolioError, Result};

/// Longest readable prefix kept in a cache key before the hash suffix.
const MAX_KEY_PREFIX: usize = 80;

/// Membership view over the cache directory as it was at startup.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    dir: PathBuf,
    entries: HashSet<String>,
}

impl ContentCache {
    /// Snapshot the entry names in `dir`. A missing directory is an empty cache.
    pub fn snapshot(dir: &Path) -> Result<Self> {
        let mut entries = HashSet::new();

        match std::fs::read_dir(dir) {
            Ok(read_dir) => {
                for entry in read_dir {
                    let entry = entry.map_err(|e| FolioError::io(dir, e))?;
                    entries.insert(entry.file_name().to_string_lossy().into_owned());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(?dir, "cache directory missing, starting empty");
            }
            Err(e) => return Err(FolioError::io(dir, e)),
        }

        tracing::debug!(?dir, entries = entries.len(), "cache snapshot taken");
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    /// Build a snapshot from known entry names (no disk access).
    pub fn from_entries<I, S>(dir: impl Into<PathBuf>, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dir: dir.into(),
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `key` existed in the cache directory at startup.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Whether the entry for source locator `src` existed at startup.
    pub fn contains_src(&self, src: &str) -> bool {
        self.contains(&cache_key(src))
    }

    /// Where the entry for `src` lives (whether or not it exists).
    pub fn entry_path(&self, src: &str) -> PathBuf {
        self.dir.join(cache_key(src))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Filename-safe cache key for a source locator.
///
/// Readable prefix (scheme stripped, unsafe characters replaced) plus a short
/// SHA-256 suffix so distinct sources never collide after sanitizing.
pub fn cache_key(src: &str) -> String {
    let trimmed = src
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(src);

    let prefix: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_KEY_PREFIX)
        .collect();

    let digest = Sha256::digest(src.as_bytes());
    let suffix: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();

    format!("{prefix}-{suffix}.html")
}
