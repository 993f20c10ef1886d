//! Cache of compiled bootstrap scripts
//!
//! Every test below a directory re-runs that directory's `shell.js`. The
//! compiled form is immutable, so it is compiled once per (file, opt level)
//! and shared between runs and threads. Each run still executes its own
//! copy in a fresh realm.
//!
//! The cache is a bounded LRU: a map from key to entry plus an ordered
//! recency index (access tick -> key). Only that bookkeeping sits behind the
//! lock; units are handed out as `Arc`s.

use rustc_hash::FxHashMap as HashMap;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

use crate::corpus::OptLevel;

/// Deepest bootstrap chain the default capacity is sized for
pub const MAX_DEPTH: usize = 5;

/// One slot per opt level for every level of a bootstrap chain
pub const DEFAULT_CAPACITY: usize = OptLevel::ALL.len() * MAX_DEPTH;

/// Identifies one compiled unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Absolute path of the script
    pub path: PathBuf,
    pub opt_level: OptLevel,
}

impl CacheKey {
    pub fn new(path: impl Into<PathBuf>, opt_level: OptLevel) -> Self {
        Self {
            path: path.into(),
            opt_level,
        }
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of units currently cached
    pub entry_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Entry<U> {
    unit: Arc<U>,
    tick: u64,
}

struct Inner<U> {
    entries: HashMap<CacheKey, Entry<U>>,
    recency: BTreeMap<u64, CacheKey>,
    clock: u64,
    stats: CacheStats,
}

impl<U> Inner<U> {
    fn touch(&mut self, key: &CacheKey) -> Option<Arc<U>> {
        self.clock += 1;
        let tick = self.clock;
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, key.clone());
        Some(Arc::clone(&entry.unit))
    }
}

type EvictionCallback = Box<dyn Fn(&CacheKey) + Send + Sync>;

/// Bounded, thread-safe LRU cache of compiled units
pub struct CompiledUnitCache<U> {
    capacity: usize,
    inner: Mutex<Inner<U>>,
    on_evict: Option<EvictionCallback>,
}

impl<U> CompiledUnitCache<U> {
    /// Create a cache with [`DEFAULT_CAPACITY`]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a cache holding at most `capacity` units (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::default(),
                recency: BTreeMap::new(),
                clock: 0,
                stats: CacheStats::default(),
            }),
            on_evict: None,
        }
    }

    /// Call `callback` with every evicted key
    pub fn on_evict(mut self, callback: impl Fn(&CacheKey) + Send + Sync + 'static) -> Self {
        self.on_evict = Some(Box::new(callback));
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Entries are immutable once inserted, so a poisoned lock still guards
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner<U>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, marking it most recently used
    pub fn get(&self, key: &CacheKey) -> Option<Arc<U>> {
        let mut inner = self.lock();
        let unit = inner.touch(key);
        if unit.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        unit
    }

    /// Whether `key` is cached; does not affect recency
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Insert a unit, evicting the least recently used entries beyond
    /// capacity. If another thread inserted `key` first, its unit wins.
    pub fn insert(&self, key: CacheKey, unit: U) -> Arc<U> {
        let mut evicted = Vec::new();
        let unit = {
            let mut inner = self.lock();
            if let Some(existing) = inner.touch(&key) {
                existing
            } else {
                let unit = Arc::new(unit);
                let tick = inner.clock;
                inner.recency.insert(tick, key.clone());
                inner.entries.insert(
                    key,
                    Entry {
                        unit: Arc::clone(&unit),
                        tick,
                    },
                );
                while inner.entries.len() > self.capacity {
                    let Some((_, oldest)) = inner.recency.pop_first() else {
                        break;
                    };
                    inner.entries.remove(&oldest);
                    inner.stats.evictions += 1;
                    evicted.push(oldest);
                }
                unit
            }
        };
        for key in &evicted {
            trace!("evicted {} ({})", key.path.display(), key.opt_level);
            if let Some(ref callback) = self.on_evict {
                callback(key);
            }
        }
        unit
    }

    /// Return the cached unit for `key`, compiling it on a miss.
    ///
    /// The lock is not held while compiling; two threads missing on the
    /// same key may both compile, and the first insert is kept.
    pub fn get_or_compile<E>(
        &self,
        key: CacheKey,
        compile: impl FnOnce() -> Result<U, E>,
    ) -> Result<Arc<U>, E> {
        if let Some(unit) = self.get(&key) {
            return Ok(unit);
        }
        let unit = compile()?;
        Ok(self.insert(key, unit))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry; statistics are kept
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entry_count: inner.entries.len(),
            ..inner.stats
        }
    }
}

impl<U> Default for CompiledUnitCache<U> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(i: usize) -> CacheKey {
        CacheKey::new(format!("/corpus/{}/shell.js", i), OptLevel::ALL[i % 3])
    }

    #[test]
    fn test_default_capacity() {
        let cache: CompiledUnitCache<u32> = CompiledUnitCache::new();
        assert_eq!(cache.capacity(), 15);
    }

    #[test]
    fn test_same_path_different_level_is_different_key() {
        let cache = CompiledUnitCache::new();
        cache.insert(CacheKey::new("/c/shell.js", OptLevel::Interpreted), 1);
        cache.insert(CacheKey::new("/c/shell.js", OptLevel::Compiled), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(
            *cache.get(&CacheKey::new("/c/shell.js", OptLevel::Compiled)).unwrap(),
            2
        );
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = CompiledUnitCache::new();
        for i in 0..DEFAULT_CAPACITY {
            cache.insert(key(i), i);
        }
        // refresh key 0 so key 1 becomes the oldest
        assert!(cache.get(&key(0)).is_some());
        cache.insert(key(DEFAULT_CAPACITY), DEFAULT_CAPACITY);

        assert!(!cache.contains(&key(1)));
        for i in (0..=DEFAULT_CAPACITY).filter(|i| *i != 1) {
            assert!(cache.contains(&key(i)), "key {} missing", i);
        }
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_callback() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let cache = CompiledUnitCache::with_capacity(2)
            .on_evict(move |k: &CacheKey| sink.lock().unwrap().push(k.clone()));
        cache.insert(key(0), 0);
        cache.insert(key(1), 1);
        cache.insert(key(2), 2);
        assert_eq!(*evicted.lock().unwrap(), vec![key(0)]);
    }

    #[test]
    fn test_get_or_compile_compiles_once() {
        let cache = CompiledUnitCache::new();
        let compiles = AtomicUsize::new(0);
        for _ in 0..3 {
            let unit = cache
                .get_or_compile(key(0), || {
                    compiles.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>("unit")
                })
                .unwrap();
            assert_eq!(*unit, "unit");
        }
        assert_eq!(compiles.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_compile_error_is_not_cached() {
        let cache: CompiledUnitCache<u32> = CompiledUnitCache::new();
        let result = cache.get_or_compile(key(0), || Err("syntax error"));
        assert_eq!(result.unwrap_err(), "syntax error");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_keeps_first_unit() {
        let cache = CompiledUnitCache::new();
        let first = cache.insert(key(0), 1);
        let second = cache.insert(key(0), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = CompiledUnitCache::with_capacity(8);
        std::thread::scope(|s| {
            for t in 0..4 {
                let cache = &cache;
                s.spawn(move || {
                    for i in 0..50 {
                        let k = key((i + t) % 12);
                        let unit = cache.get_or_compile(k.clone(), || Ok::<_, ()>(k.path.clone())).unwrap();
                        assert_eq!(*unit, k.path);
                    }
                });
            }
        });
        assert!(cache.len() <= 8);
    }

    #[test]
    fn test_clear() {
        let cache = CompiledUnitCache::new();
        cache.insert(key(0), 0);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&key(0)).is_none());
    }
}
