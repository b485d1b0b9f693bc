//! Content-addressed cache of materialized workspaces.
//!
//! A workspace unpacked from a bundle is expensive to materialize, so it is
//! cached under a hash-derived directory with a sentinel marker written
//! last. A directory without the marker is an interrupted store and is
//! treated as absent. How the workspace gets materialized (archive
//! unpacking, dependency installation) is the caller's concern.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Marker file written after a workspace is fully materialized.
const DONE_MARKER: &str = "DONE";

/// Length of the hash prefix used as a cache directory name.
const KEY_LEN: usize = 8;

/// Cache of workspaces keyed by bundle content hash.
pub struct WorkspaceCache {
    root: PathBuf,
}

impl WorkspaceCache {
    /// Cache rooted in the platform cache directory.
    pub fn new() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("packrun")
            .join("workspaces");
        Self { root }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Derive the cache key for a bundle file: a short prefix of its
    /// SHA-256 digest.
    pub fn key_for(bundle: &Path) -> io::Result<String> {
        let mut file = fs::File::open(bundle)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        let digest = hex::encode(hasher.finalize());
        Ok(digest[..KEY_LEN].to_string())
    }

    /// Look up a fully materialized workspace.
    pub fn lookup(&self, key: &str) -> Option<PathBuf> {
        let dir = self.root.join(key);
        if dir.join(DONE_MARKER).is_file() {
            Some(dir)
        } else {
            None
        }
    }

    /// Materialize a workspace into the cache.
    ///
    /// Any partial leftover from an interrupted earlier store is removed
    /// first; the sentinel is written only after the materializer returns,
    /// so `lookup` never sees a half-built workspace.
    pub fn store<F>(&self, key: &str, materialize: F) -> io::Result<PathBuf>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let dir = self.root.join(key);

        if dir.exists() {
            log::info!("Removing partial workspace at {:?}", dir);
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        materialize(&dir)?;

        fs::write(dir.join(DONE_MARKER), DONE_MARKER)?;
        log::info!("Workspace {} materialized at {:?}", key, dir);
        Ok(dir)
    }

    /// Look up the workspace for `key`, materializing it on a miss.
    pub fn get_or_store<F>(&self, key: &str, materialize: F) -> io::Result<PathBuf>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        match self.lookup(key) {
            Some(dir) => Ok(dir),
            None => self.store(key, materialize),
        }
    }
}

impl Default for WorkspaceCache {
    fn default() -> Self {
        Self::new()
    }
}
