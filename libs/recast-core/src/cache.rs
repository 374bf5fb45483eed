//! Bounded memo of derived schemas.
//!
//! Every record of a stream usually shares one value schema, so the derived
//! output schema is computed once and looked up afterwards. Lookups may come
//! from many worker threads at once; a single lock covers the whole
//! get-or-insert, so each source schema is derived at most once while it
//! stays cached.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use recast_api::{PluginError, Schema};
use tracing::debug;

/// Default number of cached schemas per transform instance.
pub const DEFAULT_SCHEMA_CACHE_CAPACITY: usize = 16;

/// How the cache decides two source schemas are "the same".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Same `Arc` allocation. Structurally equal copies get separate entries.
    #[default]
    Identity,
    /// Structural equality of the schema tree.
    Structural,
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePolicy::Identity => f.write_str("identity"),
            CachePolicy::Structural => f.write_str("structural"),
        }
    }
}

impl FromStr for CachePolicy {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(CachePolicy::Identity),
            "structural" => Ok(CachePolicy::Structural),
            other => Err(PluginError::config(format!(
                "unknown cache policy '{other}' (expected 'identity' or 'structural')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Identity(usize),
    Structural(Arc<Schema>),
}

struct Entry {
    /// Keeps the source alive, so an identity key's address cannot be reused.
    _source: Arc<Schema>,
    derived: Arc<Schema>,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, Entry>,
    tick: u64,
}

/// LRU cache from source schema to derived schema.
pub struct SchemaCache {
    policy: CachePolicy,
    capacity: usize,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SchemaCache {
    /// A capacity of 0 is treated as 1.
    pub fn new(policy: CachePolicy, capacity: usize) -> Self {
        Self {
            policy,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached schema derived from `source`, computing it with
    /// `derive` on a miss. A failed derivation is not cached.
    pub fn get_or_derive<F>(&self, source: &Arc<Schema>, derive: F) -> Result<Arc<Schema>, PluginError>
    where
        F: FnOnce(&Schema) -> Result<Schema, PluginError>,
    {
        let key = match self.policy {
            CachePolicy::Identity => CacheKey::Identity(Arc::as_ptr(source) as usize),
            CachePolicy::Structural => CacheKey::Structural(Arc::clone(source)),
        };

        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.last_used = tick;
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.derived));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let derived = Arc::new(derive(source)?);

        if inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                debug!(capacity = self.capacity, "evicted least recently used schema");
            }
        }

        inner.entries.insert(
            key,
            Entry {
                _source: Arc::clone(source),
                derived: Arc::clone(&derived),
                last_used: tick,
            },
        );
        debug!(policy = %self.policy, entries = inner.entries.len(), "cached derived schema");
        Ok(derived)
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    // A panic inside `derive` leaves the map untouched, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(CachePolicy::default(), DEFAULT_SCHEMA_CACHE_CAPACITY)
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("policy", &self.policy)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}
