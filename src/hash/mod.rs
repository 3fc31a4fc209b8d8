//! A concurrent extendible hash directory: `Find`/`Insert`/`Remove` over a
//! directory of buckets that grows incrementally under collision pressure,
//! without ever rehashing the live entries of buckets that aren't involved
//! in a given split.
//!
//! The production instantiation in this crate is `ExtendibleHashDirectory<PageId,
//! FrameId>`, used by the buffer pool as its page table.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;

use crate::common::config::MAX_GLOBAL_DEPTH;

struct Bucket<K, V> {
    depth: u32,
    entries: Vec<(K, V)>,
}

impl<K, V> Bucket<K, V> {
    fn new(depth: u32) -> Self {
        Self {
            depth,
            entries: Vec::new(),
        }
    }
}

struct Inner<K, V> {
    directory: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
    global_depth: u32,
    bucket_size: usize,
    num_buckets: usize,
}

/// Concurrent mapping from key to value, backed by extendible hashing.
///
/// `K` must have a total hash and equality; `V` is required to be `Clone`
/// since lookups hand back owned values rather than borrowing out of the
/// lock (the original's "movable" requirement, adapted to Rust: callers get
/// a copy instead of a reference they'd have to hold the lock to keep).
pub struct ExtendibleHashDirectory<K, V> {
    inner: Mutex<Inner<K, V>>,
}

fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn mask(depth: u32) -> u64 {
    if depth >= 64 {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}

impl<K: Hash + Eq + Clone, V: Clone> ExtendibleHashDirectory<K, V> {
    /// Builds an empty directory: global depth 0, a single bucket of
    /// capacity `bucket_size` referenced by the lone directory slot.
    pub fn new(bucket_size: usize) -> Self {
        assert!(bucket_size >= 1, "bucket_size must be at least 1");
        Self {
            inner: Mutex::new(Inner {
                directory: vec![0],
                buckets: vec![Bucket::new(0)],
                global_depth: 0,
                bucket_size,
                num_buckets: 1,
            }),
        }
    }

    /// Looks up `key`, returning a clone of its value if resident.
    pub fn find(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock();
        let slot = (hash_key(key) & mask(inner.global_depth)) as usize;
        let bucket = &inner.buckets[inner.directory[slot]];
        bucket
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Inserts `(key, value)`. Does not deduplicate an existing `key` — the
    /// caller (the buffer pool's page table) is required to guarantee
    /// uniqueness, matching the source's behavior (see DESIGN.md).
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        loop {
            let slot = (hash_key(&key) & mask(inner.global_depth)) as usize;
            let bucket_id = inner.directory[slot];
            if inner.buckets[bucket_id].entries.len() < inner.bucket_size {
                inner.buckets[bucket_id].entries.push((key, value));
                return;
            }
            Self::split(&mut inner, slot);
        }
    }

    /// Removes `key` via swap-remove within its bucket. No bucket merging
    /// is performed (explicit non-goal).
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let slot = (hash_key(key) & mask(inner.global_depth)) as usize;
        let bucket_id = inner.directory[slot];
        let entries = &mut inner.buckets[bucket_id].entries;
        if let Some(pos) = entries.iter().position(|(k, _)| k == key) {
            entries.swap_remove(pos);
            true
        } else {
            false
        }
    }

    pub fn get_global_depth(&self) -> u32 {
        self.inner.lock().global_depth
    }

    /// Local depth of the bucket reachable from directory slot `slot`.
    pub fn get_local_depth(&self, slot: usize) -> u32 {
        let inner = self.inner.lock();
        inner.buckets[inner.directory[slot]].depth
    }

    /// Number of distinct, live buckets (not the directory length, which is
    /// always `2^global_depth` and over-counts aliasing by design).
    pub fn get_num_buckets(&self) -> usize {
        self.inner.lock().num_buckets
    }

    /// Splits the bucket reachable from `slot`, growing the directory first
    /// (a "global split") if the bucket's local depth has caught up with the
    /// global depth. Entries are partitioned by the newly-discriminating
    /// hash bit; no other bucket's entries are touched or rehashed.
    fn split(inner: &mut Inner<K, V>, slot: usize) {
        let bucket_id = inner.directory[slot];
        let depth = inner.buckets[bucket_id].depth;

        if depth == inner.global_depth {
            assert!(
                inner.global_depth < MAX_GLOBAL_DEPTH,
                "extendible hash directory exceeded the {}-bit depth bound",
                MAX_GLOBAL_DEPTH
            );
            let old_len = inner.directory.len();
            inner.directory.extend_from_within(0..old_len);
            inner.global_depth += 1;
        }

        let new_depth = depth + 1;
        let split_bit = 1u64 << depth;

        let old_entries = std::mem::take(&mut inner.buckets[bucket_id].entries);
        let mut zero_bucket = Bucket::new(new_depth);
        let mut one_bucket = Bucket::new(new_depth);
        for (k, v) in old_entries {
            if hash_key(&k) & split_bit == 0 {
                zero_bucket.entries.push((k, v));
            } else {
                one_bucket.entries.push((k, v));
            }
        }

        let zero_id = inner.buckets.len();
        inner.buckets.push(zero_bucket);
        let one_id = inner.buckets.len();
        inner.buckets.push(one_bucket);
        inner.buckets[bucket_id].depth = new_depth;

        for idx in 0..inner.directory.len() {
            if inner.directory[idx] == bucket_id {
                inner.directory[idx] = if (idx as u64) & split_bit == 0 {
                    zero_id
                } else {
                    one_id
                };
            }
        }
        inner.num_buckets += 1;
    }
}
