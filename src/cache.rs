//! Response cache
//!
//! A bounded table mapping a request identity (host followed by path and
//! query) to the bytes relayed from the origin for that request.
//!
//! # Synchronization
//!
//! The table sits behind a [`tokio::sync::RwLock`]. Any number of lookups
//! proceed together under the read lock; an insert takes the write lock and
//! so never overlaps a lookup or another insert. Objects are immutable
//! [`Bytes`] swapped in whole, so a lookup sees either no entry or a complete
//! one.
//!
//! The lock is fair: once a writer is queued, readers arriving after it wait
//! behind it. A steady stream of lookups therefore cannot starve an insert.
//! The price is that a lookup may wait for an insert queued ahead of it even
//! while other lookups hold the lock.
//!
//! # Bounds
//!
//! Objects larger than `max_object_size` are never stored. The table never
//! holds more than `capacity` entries nor more than `max_cache_size` bytes.
//! When an insert does not fit, [`EvictionPolicy::Lru`] evicts the least
//! recently looked-up entries and [`EvictionPolicy::Reject`] drops the new
//! object instead.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::config::{CacheConfig, EvictionPolicy};

/// What an [`Cache::insert`] did. Caching is best-effort, so none of these
/// is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored under a new identity after evicting `evicted` entries.
    Inserted { evicted: usize },
    /// Overwrote the object already stored under this identity.
    Replaced { evicted: usize },
    /// The object exceeds the maximum object size; nothing was stored.
    TooLarge,
    /// The table is full and the policy forbids eviction; nothing was stored.
    Rejected,
}

impl InsertOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(
            self,
            InsertOutcome::Inserted { .. } | InsertOutcome::Replaced { .. }
        )
    }
}

#[derive(Debug)]
struct Entry {
    object: Bytes,
    /// Tick of the last lookup or insert. Atomic so lookups can bump it
    /// under the shared lock.
    last_used: AtomicU64,
}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<String, Entry>,
    bytes: usize,
}

impl Table {
    fn fits(&self, size: usize, capacity: usize, max_bytes: usize) -> bool {
        self.entries.len() < capacity && self.bytes + size <= max_bytes
    }

    fn remove(&mut self, identity: &str) -> Option<Entry> {
        let entry = self.entries.remove(identity)?;
        self.bytes -= entry.object.len();
        Some(entry)
    }

    fn put(&mut self, identity: String, entry: Entry) {
        self.bytes += entry.object.len();
        self.entries.insert(identity, entry);
    }

    /// Removes the least recently used entry. Returns false if the table is empty.
    fn evict_lru(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used.load(Ordering::Relaxed))
            .map(|(k, _)| k.clone());

        match victim {
            Some(identity) => {
                if let Some(entry) = self.remove(&identity) {
                    tracing::debug!(
                        identity = %identity,
                        bytes = entry.object.len(),
                        "Evicted cache entry"
                    );
                }
                true
            }
            None => false,
        }
    }
}

/// Shared handle to the response cache. Clones refer to the same table.
#[derive(Debug, Clone)]
pub struct Cache {
    table: Arc<RwLock<Table>>,
    clock: Arc<AtomicU64>,
    capacity: usize,
    max_object_size: usize,
    max_bytes: usize,
    policy: EvictionPolicy,
}

impl Cache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            table: Arc::new(RwLock::new(Table::default())),
            clock: Arc::new(AtomicU64::new(0)),
            capacity: config.capacity,
            max_object_size: config.max_object_size,
            max_bytes: config.max_cache_size,
            policy: config.policy,
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the object cached for `identity`, if any.
    ///
    /// Takes only the shared lock; concurrent lookups do not wait on each other.
    pub async fn lookup(&self, identity: &str) -> Option<Bytes> {
        let table = self.table.read().await;
        let entry = table.entries.get(identity)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.object.clone())
    }

    /// Stores `object` under `identity`, replacing any previous object.
    pub async fn insert(&self, identity: impl Into<String>, object: Bytes) -> InsertOutcome {
        let size = object.len();
        if size > self.max_object_size {
            return InsertOutcome::TooLarge;
        }

        let identity = identity.into();
        let mut table = self.table.write().await;

        // The superseded object goes even if the new one ends up rejected,
        // so a later lookup never returns stale bytes.
        let replaced = table.remove(&identity).is_some();

        let mut evicted = 0;
        while !table.fits(size, self.capacity, self.max_bytes) {
            if self.policy == EvictionPolicy::Reject || !table.evict_lru() {
                return InsertOutcome::Rejected;
            }
            evicted += 1;
        }

        let entry = Entry {
            object,
            last_used: AtomicU64::new(self.tick()),
        };
        table.put(identity, entry);

        if replaced {
            InsertOutcome::Replaced { evicted }
        } else {
            InsertOutcome::Inserted { evicted }
        }
    }

    pub async fn contains(&self, identity: &str) -> bool {
        self.table.read().await.entries.contains_key(identity)
    }

    /// Number of resident entries.
    pub async fn len(&self) -> usize {
        self.table.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Total size of all resident objects.
    pub async fn resident_bytes(&self) -> usize {
        self.table.read().await.bytes
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }
}
