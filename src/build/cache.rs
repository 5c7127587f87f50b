//! In-memory transform cache.
//!
//! One cache per source kind maps a source path to the content hash it was
//! compiled from and the compiled output. An entry is fresh while the file
//! content hashes the same; anything else is a miss and gets recompiled.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Namespace of the template cache.
pub const TEMPLATE_CACHE: &str = "template-cache";
/// Namespace of the script cache.
pub const SCRIPT_CACHE: &str = "script-cache";

/// Hex SHA-256 of a source file's bytes.
pub fn fingerprint(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// A cached transform result.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheEntry {
    /// Fingerprint of the source the output was compiled from
    hash: String,
    /// Compiled output
    output: String,
}

/// Cache of compiled outputs keyed by source path.
#[derive(Debug, Clone)]
pub struct TransformCache {
    namespace: &'static str,
    entries: BTreeMap<PathBuf, CacheEntry>,
}

impl TransformCache {
    pub fn new(namespace: &'static str) -> Self {
        Self { namespace, entries: BTreeMap::new() }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Cached output for `path` if it was compiled from content with `hash`.
    pub fn get_fresh(&self, path: &Path, hash: &str) -> Option<&str> {
        self.entries.get(path).filter(|e| e.hash == hash).map(|e| e.output.as_str())
    }

    pub fn insert(&mut self, path: PathBuf, hash: String, output: String) {
        self.entries.insert(path, CacheEntry { hash, output });
    }

    /// Drop the entry for `path`. Returns whether there was one.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drop entries whose path is not in `live`. Returns how many were dropped.
    pub fn retain_paths(&mut self, live: &BTreeSet<PathBuf>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| live.contains(path));
        before - self.entries.len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached outputs in source path order.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.output.as_str())
    }
}
