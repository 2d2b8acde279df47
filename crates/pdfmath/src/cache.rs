//! Persistent translation cache.
//!
//! Entries live under a namespace derived from a fixed seed string and are
//! keyed by a hash of the paragraph text and the translator identity.
//! [`FileCache`] keeps one directory per namespace, stamped with its last
//! use, and prunes to the most recently used namespaces.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::TranslateError;

/// Seed of the default namespace.
pub const NAMESPACE_SEED: &str = "pdfmath-translate";

/// Namespaces kept by [`FileCache`].
pub const DEFAULT_MAX_NAMESPACES: usize = 5;

const TIME_FILENAME: &str = "update_time";

/// Lowercase hex SHA-256 of `parts`, truncated to 20 characters.
pub fn deterministic_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .take(10)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// The default cache namespace.
pub fn default_namespace() -> String {
    deterministic_hash(&[NAMESPACE_SEED])
}

/// Cache key of one paragraph under one translator.
pub fn paragraph_key(text: &str, translator_identity: &str) -> String {
    deterministic_hash(&[text, translator_identity])
}

/// Keyed text store shared by concurrent translation workers.
pub trait CacheStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, TranslateError>;

    fn put(&self, namespace: &str, key: &str, text: &str) -> Result<(), TranslateError>;
}

/// In-process store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryCache {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored translations across all namespaces.
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |e| e.len())
    }

    /// `true` when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, TranslateError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| TranslateError::Cache("memory cache poisoned".into()))?;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&self, namespace: &str, key: &str, text: &str) -> Result<(), TranslateError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TranslateError::Cache("memory cache poisoned".into()))?;
        entries.insert((namespace.to_string(), key.to_string()), text.to_string());
        Ok(())
    }
}

/// Directory-backed store: `<root>/<namespace>/<key>` holds one paragraph.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
    max_namespaces: usize,
}

impl FileCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, TranslateError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| cache_error(&root, e))?;
        debug!(root = %root.display(), "translation cache directory");
        Ok(Self {
            root,
            max_namespaces: DEFAULT_MAX_NAMESPACES,
        })
    }

    /// `<system temp>/cache`.
    pub fn default_location() -> PathBuf {
        std::env::temp_dir().join("cache")
    }

    pub fn with_max_namespaces(mut self, max: usize) -> Self {
        self.max_namespaces = max.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `namespace`, stamp it as just used and prune older ones.
    pub fn open_namespace(&self, namespace: &str) -> Result<(), TranslateError> {
        let dir = self.root.join(namespace);
        fs::create_dir_all(&dir).map_err(|e| cache_error(&dir, e))?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        let stamp = dir.join(TIME_FILENAME);
        fs::write(&stamp, now.to_string()).map_err(|e| cache_error(&stamp, e))?;
        self.prune()
    }

    /// Remove namespaces beyond the limit, least recently used first.
    /// Namespaces without a readable stamp go before any stamped one.
    pub fn prune(&self) -> Result<(), TranslateError> {
        let entries = fs::read_dir(&self.root).map_err(|e| cache_error(&self.root, e))?;
        let mut namespaces: Vec<(f64, PathBuf)> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .map(|path| (read_stamp(&path).unwrap_or(f64::NEG_INFINITY), path))
            .collect();
        if namespaces.len() <= self.max_namespaces {
            return Ok(());
        }
        namespaces.sort_by(|a, b| a.0.total_cmp(&b.0));
        let excess = namespaces.len() - self.max_namespaces;
        for (_, path) in namespaces.into_iter().take(excess) {
            debug!(dir = %path.display(), "pruning cache namespace");
            if let Err(e) = fs::remove_dir_all(&path) {
                warn!(dir = %path.display(), error = %e, "failed to prune cache namespace");
            }
        }
        Ok(())
    }
}

impl CacheStore for FileCache {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, TranslateError> {
        let path = self.root.join(namespace).join(key);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(cache_error(&path, e)),
        }
    }

    fn put(&self, namespace: &str, key: &str, text: &str) -> Result<(), TranslateError> {
        let dir = self.root.join(namespace);
        fs::create_dir_all(&dir).map_err(|e| cache_error(&dir, e))?;
        let path = dir.join(key);
        fs::write(&path, text).map_err(|e| cache_error(&path, e))
    }
}

fn read_stamp(dir: &Path) -> Option<f64> {
    fs::read_to_string(dir.join(TIME_FILENAME))
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn cache_error(path: &Path, err: std::io::Error) -> TranslateError {
    TranslateError::Cache(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_twenty_hex_chars_and_stable() {
        let a = deterministic_hash(&["hello", "google zh en"]);
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(a, paragraph_key("hello", "google zh en"));
        assert_ne!(a, paragraph_key("hello", "google ja en"));
        assert_ne!(paragraph_key("ab", "c"), paragraph_key("a", "bc"));
    }

    #[test]
    fn known_digest_prefix() {
        // sha256("abc")
        assert_eq!(deterministic_hash(&["abc"]), "ba7816bf8f01cfea4141");
    }

    #[test]
    fn memory_cache_round_trip() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("ns", "k").unwrap(), None);
        cache.put("ns", "k", "值").unwrap();
        assert_eq!(cache.get("ns", "k").unwrap().as_deref(), Some("值"));
        assert_eq!(cache.get("other", "k").unwrap(), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn file_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        cache.open_namespace("ns").unwrap();
        assert!(dir.path().join("ns").join("update_time").exists());
        assert_eq!(cache.get("ns", "k").unwrap(), None);
        cache.put("ns", "k", "translated $v0$").unwrap();
        assert_eq!(
            cache.get("ns", "k").unwrap().as_deref(),
            Some("translated $v0$")
        );
    }

    #[test]
    fn prunes_oldest_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap().with_max_namespaces(2);
        for (name, stamp) in [("old", "100"), ("mid", "200")] {
            fs::create_dir_all(dir.path().join(name)).unwrap();
            fs::write(dir.path().join(name).join(TIME_FILENAME), stamp).unwrap();
        }
        fs::create_dir_all(dir.path().join("unstamped")).unwrap();
        cache.open_namespace("new").unwrap();

        assert!(!dir.path().join("unstamped").exists());
        assert!(!dir.path().join("old").exists());
        assert!(dir.path().join("mid").exists());
        assert!(dir.path().join("new").exists());
    }
}
