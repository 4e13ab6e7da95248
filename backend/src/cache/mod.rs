//! Loaded-source cache.
//!
//! Keeps derived record sets in memory so that re-submitting the same file
//! with different filters skips decoding, normalization and derivation.
//!
//! The cache is a plain value owned by the caller and passed down
//! explicitly. Entries are keyed by a fingerprint of the source bytes and
//! of the configuration fields that influence derivation, so a changed
//! diesel tag or date order never serves stale records.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use crate::config::PipelineConfig;
use crate::transform::pipeline::LoadedSource;

/// Default number of sources kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 16;

/// Content and configuration fingerprint of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey(u64);

impl SourceKey {
    pub fn new(bytes: &[u8], config: &PipelineConfig) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        config.diesel_tag.hash(&mut hasher);
        config.date_order.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Whether a lookup was served from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn is_hit(self) -> bool {
        matches!(self, CacheStatus::Hit)
    }
}

/// Bounded map from [`SourceKey`] to [`LoadedSource`].
#[derive(Debug)]
pub struct RecordCache {
    entries: HashMap<SourceKey, LoadedSource>,
    order: VecDeque<SourceKey>,
    capacity: usize,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &SourceKey) -> Option<&LoadedSource> {
        self.entries.get(key)
    }

    /// Insert or replace an entry, evicting the oldest ones beyond capacity.
    pub fn insert(&mut self, key: SourceKey, source: LoadedSource) {
        if self.entries.insert(key, source).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Read-through lookup. `load` runs only on a miss, and a failed load
    /// leaves the cache untouched.
    pub fn get_or_try_load<E, F>(&mut self, key: SourceKey, load: F) -> Result<(LoadedSource, CacheStatus), E>
    where
        F: FnOnce() -> Result<LoadedSource, E>,
    {
        if let Some(hit) = self.entries.get(&key) {
            return Ok((hit.clone(), CacheStatus::Hit));
        }
        let loaded = load()?;
        self.insert(key, loaded.clone());
        Ok((loaded, CacheStatus::Miss))
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&mut self, key: &SourceKey) -> bool {
        self.order.retain(|k| k != key);
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}
