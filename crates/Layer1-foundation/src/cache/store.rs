//! Disk-backed cache store
//!
//! One JSON file per entry, grouped by namespace:
//!
//! ```text
//! <root>/
//! ├── servers/   provider tool lists
//! ├── configs/   parsed configuration documents
//! └── models/    model init data (reserved)
//! ```
//!
//! The store is an optimization layer only. Read, write and parse failures
//! are logged and reported to callers as a miss or a no-op; only the explicit
//! management operations (`invalidate`, `prune_expired`, `stats`) return
//! errors, so the CLI can report them.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::entry::{CacheEntry, Namespace};
use super::redact::redact_in_place;
use super::util::short_hash;
use crate::{Error, Result};

const ENTRY_EXTENSION: &str = "json";
const TMP_EXTENSION: &str = "tmp";

/// Namespaced, TTL-bound, secret-redacting disk cache
///
/// Construct once at startup and share as `Arc<CacheStore>`.
///
/// ```rust,ignore
/// let store = Arc::new(CacheStore::open(CacheConfig::default()));
///
/// if let Some(doc) = store.get(Namespace::Config, path, Some(&fp)) {
///     return Ok(doc);
/// }
/// store.set(Namespace::Config, path, &doc, Some(&fp));
/// ```
#[derive(Debug)]
pub struct CacheStore {
    config: CacheConfig,
    /// Per-key write locks (same key writes are serialized)
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    /// Open the store, creating namespace directories
    ///
    /// Never fails: a store whose directories cannot be created simply
    /// misses on every read.
    pub fn open(config: CacheConfig) -> Self {
        if config.enabled {
            for ns in Namespace::ALL {
                let dir = config.root.join(ns.dir_name());
                if let Err(e) = fs::create_dir_all(&dir) {
                    warn!("Cache directory {} unavailable: {}", dir.display(), e);
                }
            }
        } else {
            debug!("Cache disabled; all lookups will miss");
        }

        Self {
            config,
            write_locks: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// File backing `(namespace, identifier)`
    ///
    /// The identifier is hashed so paths and provider names are safe file
    /// names; a sanitized prefix keeps the directory readable.
    pub fn entry_path(&self, namespace: Namespace, identifier: &str) -> PathBuf {
        let prefix: String = identifier
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(identifier)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .take(48)
            .collect();
        let file = format!(
            "{}-{}.{}",
            prefix,
            short_hash(identifier.as_bytes()),
            ENTRY_EXTENSION
        );
        self.namespace_dir(namespace).join(file)
    }

    fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.config.root.join(namespace.dir_name())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Fresh payload for `(namespace, identifier)`, or `None`
    ///
    /// A miss is reported the same way whether the entry is absent, expired,
    /// fingerprinted differently, unreadable, or the cache is disabled.
    pub fn get(
        &self,
        namespace: Namespace,
        identifier: &str,
        fingerprint: Option<&str>,
    ) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }

        let result = match self.read_entry(namespace, identifier) {
            Ok(Some(entry)) if entry.is_expired(self.ttl(), Utc::now()) => {
                debug!("Cache expired: {}", entry.key);
                None
            }
            Ok(Some(entry)) if !entry.matches_fingerprint(fingerprint) => {
                debug!("Cache fingerprint mismatch: {}", entry.key);
                None
            }
            Ok(Some(entry)) => Some(entry.payload),
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}:{}: {}", namespace, identifier, e);
                None
            }
        };

        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit: {}:{}", namespace, identifier);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Typed `get`; a payload that no longer deserializes is a miss
    pub fn get_as<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        identifier: &str,
        fingerprint: Option<&str>,
    ) -> Option<T> {
        let payload = self.get(namespace, identifier, fingerprint)?;
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "Cached payload for {}:{} has unexpected shape: {}",
                    namespace, identifier, e
                );
                None
            }
        }
    }

    /// Raw entry, ignoring TTL and fingerprint
    pub fn read_entry(&self, namespace: Namespace, identifier: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(namespace, identifier);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::CacheIo(format!("{}: {}", path.display(), e))),
        };
        let entry: CacheEntry = serde_json::from_str(&content)
            .map_err(|e| Error::CacheIo(format!("{}: {}", path.display(), e)))?;

        // Hash collision or hand-edited file
        if entry.namespace != namespace || entry.identifier != identifier {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// Store `payload`, overwriting any previous entry
    ///
    /// The payload is redacted before it touches disk. Failures are logged.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        namespace: Namespace,
        identifier: &str,
        payload: &T,
        fingerprint: Option<&str>,
    ) {
        if !self.config.enabled {
            return;
        }

        if let Err(e) = self.try_set(namespace, identifier, payload, fingerprint) {
            warn!("Cache write failed for {}:{}: {}", namespace, identifier, e);
        }
    }

    fn try_set<T: Serialize + ?Sized>(
        &self,
        namespace: Namespace,
        identifier: &str,
        payload: &T,
        fingerprint: Option<&str>,
    ) -> Result<()> {
        let mut value = serde_json::to_value(payload)?;
        let redacted = redact_in_place(&mut value);
        if redacted > 0 {
            debug!(
                "Redacted {} secret value(s) before caching {}:{}",
                redacted, namespace, identifier
            );
        }

        let entry = CacheEntry::new(
            namespace,
            identifier,
            value,
            fingerprint.map(str::to_string),
        );
        let content = serde_json::to_string_pretty(&entry)?;

        let lock = self.key_lock(&entry.key);
        let _guard = lock.lock();

        let path = self.entry_path(namespace, identifier);
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir)
            .map_err(|e| Error::CacheIo(format!("{}: {}", dir.display(), e)))?;

        // Write-then-rename so readers never observe a partial entry
        let tmp = dir.join(format!(".{}.{}", uuid::Uuid::new_v4(), TMP_EXTENSION));
        fs::write(&tmp, content).map_err(|e| Error::CacheIo(format!("{}: {}", tmp.display(), e)))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::CacheIo(format!("{}: {}", path.display(), e)));
        }

        debug!("Cached {}", entry.key);
        Ok(())
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock();
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Remove one entry, one namespace, or everything
    ///
    /// Works even when the cache is disabled. Returns the number of entries
    /// removed; removing something already gone is not an error.
    pub fn invalidate(&self, namespace: Option<Namespace>, identifier: Option<&str>) -> Result<usize> {
        let removed = match (namespace, identifier) {
            (Some(ns), Some(id)) => {
                let key = CacheEntry::key_for(ns, id);
                let lock = self.key_lock(&key);
                let _guard = lock.lock();
                usize::from(remove_if_exists(&self.entry_path(ns, id))?)
            }
            (Some(ns), None) => self.clear_namespace(ns)?,
            (None, None) => {
                let mut total = 0;
                for ns in Namespace::ALL {
                    total += self.clear_namespace(ns)?;
                }
                total
            }
            (None, Some(id)) => {
                return Err(Error::InvalidInput(format!(
                    "identifier '{}' given without a cache type",
                    id
                )))
            }
        };

        debug!(
            "Invalidated {} cache entr{} ({}/{})",
            removed,
            if removed == 1 { "y" } else { "ies" },
            namespace.map(|n| n.as_str()).unwrap_or("all"),
            identifier.unwrap_or("*")
        );
        Ok(removed)
    }

    /// Log-and-continue wrapper for library callers
    pub fn invalidate_quietly(&self, namespace: Namespace, identifier: &str) {
        if let Err(e) = self.invalidate(Some(namespace), Some(identifier)) {
            warn!("Cache invalidation failed for {}:{}: {}", namespace, identifier, e);
        }
    }

    fn clear_namespace(&self, namespace: Namespace) -> Result<usize> {
        let mut removed = 0;
        for path in self.list_files(namespace)? {
            if remove_if_exists(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Delete every expired entry; unreadable entries are deleted too
    pub fn prune_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let ttl = self.ttl();
        let mut removed = 0;

        for ns in Namespace::ALL {
            for path in self.list_files(ns)? {
                let stale = match read_entry_file(&path) {
                    Ok(entry) => entry.is_expired(ttl, now),
                    Err(_) => true,
                };
                if stale && remove_if_exists(&path)? {
                    removed += 1;
                }
            }
        }

        debug!("Pruned {} expired cache entries", removed);
        Ok(removed)
    }

    /// Entry files (and stray temp files) of a namespace
    fn list_files(&self, namespace: Namespace) -> Result<Vec<PathBuf>> {
        let dir = self.namespace_dir(namespace);
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::CacheIo(format!("{}: {}", dir.display(), e))),
        };

        let mut files = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| Error::CacheIo(format!("{}: {}", dir.display(), e)))?;
            let path = item.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if path.is_file() && matches!(ext, Some(ENTRY_EXTENSION) | Some(TMP_EXTENSION)) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now();
        let ttl = self.ttl();
        let mut stats = CacheStats {
            enabled: self.config.enabled,
            root: self.config.root.clone(),
            ttl_secs: ttl.as_secs(),
            namespaces: Vec::with_capacity(Namespace::ALL.len()),
            total_entries: 0,
            total_bytes: 0,
            expired: 0,
            oldest: None,
            newest: None,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        };

        for ns in Namespace::ALL {
            let mut ns_stats = NamespaceStats {
                namespace: ns,
                entries: 0,
                bytes: 0,
                expired: 0,
            };

            for path in self.list_files(ns)? {
                if path.extension().and_then(|e| e.to_str()) == Some(TMP_EXTENSION) {
                    continue;
                }
                let size = fs::metadata(&path)
                    .map(|m| m.len())
                    .map_err(|e| Error::CacheIo(format!("{}: {}", path.display(), e)))?;
                ns_stats.entries += 1;
                ns_stats.bytes += size;

                match read_entry_file(&path) {
                    Ok(entry) => {
                        if entry.is_expired(ttl, now) {
                            ns_stats.expired += 1;
                        }
                        stats.oldest = Some(stats.oldest.map_or(entry.created_at, |o| o.min(entry.created_at)));
                        stats.newest = Some(stats.newest.map_or(entry.created_at, |n| n.max(entry.created_at)));
                    }
                    // Unreadable entries can never hit
                    Err(_) => ns_stats.expired += 1,
                }
            }

            stats.total_entries += ns_stats.entries;
            stats.total_bytes += ns_stats.bytes;
            stats.expired += ns_stats.expired;
            stats.namespaces.push(ns_stats);
        }

        Ok(stats)
    }
}

fn read_entry_file(path: &Path) -> Result<CacheEntry> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::CacheIo(format!("{}: {}", path.display(), e))),
    }
}

/// Per-namespace statistics
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub namespace: Namespace,
    pub entries: usize,
    pub bytes: u64,
    pub expired: usize,
}

/// Snapshot of the cache store
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub root: PathBuf,
    pub ttl_secs: u64,
    pub namespaces: Vec<NamespaceStats>,
    pub total_entries: usize,
    pub total_bytes: u64,
    pub expired: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    /// Lookups served by this store instance
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn for_namespace(&self, namespace: Namespace) -> Option<&NamespaceStats> {
        self.namespaces.iter().find(|s| s.namespace == namespace)
    }

    pub fn entries(&self, namespace: Namespace) -> usize {
        self.for_namespace(namespace).map(|s| s.entries).unwrap_or(0)
    }

    /// Total size in MB, two decimals
    pub fn size_readable(&self) -> String {
        format!("{:.2} MB", self.total_bytes as f64 / (1024.0 * 1024.0))
    }
}
