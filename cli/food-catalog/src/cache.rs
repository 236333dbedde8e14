//! Response caches.
//!
//! Two independent tiers keyed by [`CacheKey`]:
//! - [`ResponseCache`]: process-local, short lived
//! - [`DurableCache`]: a JSON file that survives across sessions
//!
//! Neither tier evicts. An entry older than the tier's TTL is ignored on read
//! and replaced by the next successful fetch for the same key.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::DurableCacheConfig;

/// Identity of a logical request.
///
/// Built from the request URL with its query pairs sorted, so equivalent
/// requests map to the same key independent of parameter order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &Url) -> Self {
        let mut pairs = url.query_pairs().into_owned().collect::<Vec<_>>();
        pairs.sort();

        let mut canonical = url.clone();
        canonical.set_fragment(None);
        if pairs.is_empty() {
            canonical.set_query(None);
        } else {
            canonical.query_pairs_mut().clear().extend_pairs(pairs);
        }
        CacheKey(canonical.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// In-memory tier
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Process-local response cache with time based expiry.
///
/// Uses the tokio clock, so expiry follows `tokio::time::pause`/`advance` in
/// tests.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The stored value, if it has not expired yet.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        if Instant::now() < entry.expires_at {
            trace!(%key, "memory cache hit");
            Some(entry.value.clone())
        } else {
            trace!(%key, "memory cache entry expired");
            None
        }
    }

    /// Store `value`, replacing any previous entry for `key`.
    pub fn put(&self, key: CacheKey, value: Value) {
        self.put_for(key, value, self.ttl);
    }

    /// Store `value` for at most `lifetime`, capped by the TTL.
    pub fn put_for(&self, key: CacheKey, value: Value, lifetime: Duration) {
        let expires_at = Instant::now() + lifetime.min(self.ttl);
        self.lock().insert(key, CacheEntry { value, expires_at });
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Durable tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DurableEntry {
    data: Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

type DurableEntries = HashMap<String, DurableEntry>;

/// A response cache persisted as a single JSON document.
///
/// The whole file is read on every access and rewritten on every store. A
/// missing or unreadable file is an empty cache; write failures are logged and
/// otherwise ignored.
#[derive(Debug)]
pub struct DurableCache {
    path: PathBuf,
    ttl: Duration,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl DurableCache {
    pub fn new(config: &DurableCacheConfig) -> Self {
        Self {
            path: config.path.clone(),
            ttl: config.ttl,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored value and how long it stays fresh, if it has not expired.
    pub fn get(&self, key: &CacheKey) -> Option<(Value, Duration)> {
        self.get_at(key, Utc::now())
    }

    pub fn put(&self, key: &CacheKey, value: Value) {
        self.put_at(key, value, Utc::now())
    }

    fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<(Value, Duration)> {
        let mut entries = self.read_entries();
        let entry = entries.remove(key.as_str())?;
        // Entries from the future (clock changes) count as fresh.
        let age = (now - entry.timestamp).to_std().unwrap_or_default();
        if age < self.ttl {
            trace!(%key, "durable cache hit");
            Some((entry.data, self.ttl - age))
        } else {
            trace!(%key, "durable cache entry expired");
            None
        }
    }

    fn put_at(&self, key: &CacheKey, data: Value, now: DateTime<Utc>) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_entries();
        entries.insert(key.as_str().to_string(), DurableEntry {
            data,
            timestamp: now,
        });
        if let Err(err) = self.write_entries(&entries) {
            warn!(path = %self.path.display(), %err, "failed to write response cache");
        }
    }

    fn read_entries(&self) -> DurableEntries {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return DurableEntries::new(),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to read response cache");
                return DurableEntries::new();
            },
        };
        serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), %err, "discarding corrupt response cache");
            DurableEntries::new()
        })
    }

    /// Write atomically so concurrent readers never see a partial document.
    fn write_entries(&self, entries: &DurableEntries) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut file, entries)?;
        file.flush()?;
        file.persist(&self.path).map_err(|err| err.error)?;
        debug!(path = %self.path.display(), entries = entries.len(), "wrote response cache");
        Ok(())
    }
}
