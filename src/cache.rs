//! Content-addressed memoisation of model calls, persisted across restarts.
//!
//! ## Keys
//!
//! A [`CacheKey`] is the SHA-256 of the canonical `serde_json` encoding of a
//! whole [`ModelRequest`]: channel, model, every message part in order
//! (inlined base64 images included), and the sampling parameters. The
//! encoder writes straight into the hasher, so a multi-megabyte page image
//! never becomes part of an intermediate key string. Struct fields serialise
//! in declaration order, which makes the encoding stable across runs.
//!
//! ## Persistence
//!
//! Durability is best-effort. The whole mapping is written to a
//! [`CacheStore`] after every miss, on the blocking pool; a failed write is
//! logged and the call still returns its response. A missing, unreadable or
//! corrupt store starts the cache empty. [`FileCacheStore`] merges with what
//! is already on disk before writing, so two caches pointed at one file keep
//! each other's entries.
//!
//! Entries are never evicted or expired. A long-running service will grow the
//! file without bound.

use crate::error::{ModelCallError, PersistenceError};
use crate::model::ModelRequest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Identifies the envelope written by [`FileCacheStore`].
pub const CACHE_FORMAT: &str = "pdf2records-response-cache";
/// Bumped whenever the envelope or key derivation changes.
pub const CACHE_VERSION: u32 = 1;

/// Hex-encoded SHA-256 digest of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `request`.
    pub fn for_request(request: &ModelRequest) -> Self {
        let mut hasher = Sha256::new();
        // Writing into a hasher cannot fail, and every field of ModelRequest
        // serialises infallibly.
        let _ = serde_json::to_writer(HashWriter(&mut hasher), request);
        CacheKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct HashWriter<'a>(&'a mut Sha256);

impl Write for HashWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Raw responses by key.
pub type CacheMap = HashMap<CacheKey, String>;

/// Byte-level persistence for the cache mapping.
pub trait CacheStore: Send + Sync {
    /// Load the persisted mapping. `Ok(empty)` when nothing was stored yet.
    fn load(&self) -> Result<CacheMap, PersistenceError>;

    /// Replace the persisted mapping with `entries`.
    fn save(&self, entries: &CacheMap) -> Result<(), PersistenceError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Keeps nothing between runs. Used when caching to disk is disabled.
#[derive(Debug, Default)]
pub struct MemoryCacheStore;

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Result<CacheMap, PersistenceError> {
        Ok(CacheMap::new())
    }

    fn save(&self, _entries: &CacheMap) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[derive(Deserialize)]
struct CacheFile {
    format: String,
    version: u32,
    entries: CacheMap,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    format: &'a str,
    version: u32,
    entries: &'a CacheMap,
}

/// JSON file on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self) -> Result<CacheMap, PersistenceError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheMap::new()),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let file: CacheFile =
            serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupt {
                path: self.path.clone(),
                detail: e.to_string(),
            })?;

        if file.format != CACHE_FORMAT || file.version != CACHE_VERSION {
            return Err(PersistenceError::Corrupt {
                path: self.path.clone(),
                detail: format!(
                    "unexpected format '{}' version {} (want '{}' version {})",
                    file.format, file.version, CACHE_FORMAT, CACHE_VERSION
                ),
            });
        }

        Ok(file.entries)
    }

    fn save(&self, entries: &CacheMap) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        // Entries written by another cache on this path since we loaded.
        let mut merged = self.load().unwrap_or_default();
        merged.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));

        let file = CacheFileRef {
            format: CACHE_FORMAT,
            version: CACHE_VERSION,
            entries: &merged,
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        // Atomic write: temp file + rename, so a crash never leaves half a file.
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(write_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(write_err)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Counters reported by [`ResponseCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Shared response cache. Wrap in `Arc` to share between stages and requests.
pub struct ResponseCache {
    entries: Mutex<CacheMap>,
    store: Arc<dyn CacheStore>,
    /// Held across a whole save so snapshots reach the store in order.
    persist_turn: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create a cache and load whatever `store` holds. Load failures are
    /// logged and yield an empty cache.
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        let entries = match store.load() {
            Ok(entries) => {
                debug!(
                    "Loaded {} cached responses from {}",
                    entries.len(),
                    store.describe()
                );
                entries
            }
            Err(e) => {
                warn!("Could not load response cache, starting empty: {}", e);
                CacheMap::new()
            }
        };

        Self {
            entries: Mutex::new(entries),
            store: Arc::from(store),
            persist_turn: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the stored response for `request`, or run `create`, store its
    /// result, persist, and return it.
    ///
    /// Failed calls are not cached.
    pub async fn get_or_create<F, Fut>(
        &self,
        request: &ModelRequest,
        create: F,
    ) -> Result<String, ModelCallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ModelCallError>>,
    {
        let key = CacheKey::for_request(request);

        if let Some(hit) = self.entries.lock().await.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Using cached response for key {}", key);
            return Ok(hit.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("No cache entry for key {}, calling model", key);
        let response = create().await?;

        self.entries.lock().await.insert(key, response.clone());
        self.persist().await;

        Ok(response)
    }

    async fn persist(&self) {
        let _turn = self.persist_turn.lock().await;
        let snapshot = self.entries.lock().await.clone();
        let store = Arc::clone(&self.store);

        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Could not persist response cache: {}", e),
            Err(e) => warn!("Response cache save task failed: {}", e),
        }
    }

    /// Look up `request` without calling anything.
    pub async fn get(&self, request: &ModelRequest) -> Option<String> {
        let key = CacheKey::for_request(request);
        self.entries.lock().await.get(&key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("store", &self.store.describe())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}
