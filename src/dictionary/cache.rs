//! Bounded gloss cache
//!
//! Keyed by exact surface string. A cached `None` records that every tier
//! came back empty, so the word is not looked up again this session.
//! Capacity is enforced with first-in-first-out eviction; an optional TTL
//! expires entries on read.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use super::DictionaryMatch;

/// Default number of cached words
pub const DEFAULT_CAPACITY: usize = 4096;

struct Slot {
    value: Option<DictionaryMatch>,
    inserted: Instant,
    seq: u64,
}

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub expirations: usize,
}

/// Word → resolved match cache with a hard entry limit
pub struct GlossCache {
    slots: HashMap<String, Slot>,
    order: VecDeque<(String, u64)>,
    capacity: usize,
    ttl: Option<Duration>,
    next_seq: u64,
    stats: CacheStats,
}

impl GlossCache {
    /// Create a cache holding at most `capacity` words (minimum 1)
    #[must_use]
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            slots: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            ttl,
            next_seq: 0,
            stats: CacheStats::default(),
        }
    }

    /// Look a word up.
    ///
    /// The outer `Option` is hit/miss; the inner one is the cached outcome.
    pub fn get(&mut self, word: &str) -> Option<Option<DictionaryMatch>> {
        let expired = match self.slots.get(word) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(slot) => self.ttl.is_some_and(|ttl| slot.inserted.elapsed() >= ttl),
        };

        if expired {
            self.slots.remove(word);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            return None;
        }

        self.stats.hits += 1;
        self.slots.get(word).map(|slot| slot.value.clone())
    }

    /// Store an outcome, evicting the oldest insertions beyond capacity
    pub fn insert(&mut self, word: impl Into<String>, value: Option<DictionaryMatch>) {
        let word = word.into();
        let seq = self.next_seq;
        self.next_seq += 1;

        self.order.push_back((word.clone(), seq));
        self.slots.insert(
            word,
            Slot {
                value,
                inserted: Instant::now(),
                seq,
            },
        );

        while self.slots.len() > self.capacity {
            let Some((oldest, seq)) = self.order.pop_front() else {
                break;
            };
            // Stale order entries belong to overwritten or expired slots
            if self.slots.get(&oldest).is_some_and(|s| s.seq == seq) {
                self.slots.remove(&oldest);
                self.stats.evictions += 1;
            }
        }

        // Keep the order queue from growing without bound on overwrites
        if self.order.len() > self.capacity * 2 {
            let slots = &self.slots;
            self.order
                .retain(|(w, seq)| slots.get(w).is_some_and(|s| s.seq == *seq));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl Default for GlossCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, None)
    }
}
