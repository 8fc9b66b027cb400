//! Tagged cache layer using moka
//!
//! Stores composed artifacts by key and remembers which keys were stored
//! under which tags, so that everything derived from a changed story, step
//! or layer can be dropped in one call.
//!
//! # Example
//!
//! ```rust
//! use storymap_cache::TaggedCache;
//!
//! let cache: TaggedCache<String> = TaggedCache::new(100);
//! let tags = ["node:7".to_string()];
//!
//! let first = cache.get_or_compute("main:story-7", &tags, false, || "composed".to_string());
//! let again = cache.get_or_compute("main:story-7", &tags, false, || unreachable!());
//! assert_eq!(first, again);
//!
//! cache.invalidate("node:7");
//! assert!(!cache.contains("main:story-7"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use dashmap::DashMap;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache (approximate until pending tasks ran)
    pub entry_count: u64,
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that had to compute
    pub misses: u64,
    /// Number of tags with recorded keys
    pub tag_count: usize,
}

/// Two-way index between tags and the keys stored under them
///
/// A key is linked to exactly the tags of its latest insert. Guards of the
/// two maps are never held at the same time.
#[derive(Debug, Default)]
struct TagIndex {
    by_tag: DashMap<String, HashSet<String>>,
    by_key: DashMap<String, HashSet<String>>,
}

impl TagIndex {
    fn link(&self, key: &str, tags: HashSet<String>) {
        self.unlink(key);
        for tag in &tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        if !tags.is_empty() {
            self.by_key.insert(key.to_string(), tags);
        }
    }

    fn unlink(&self, key: &str) {
        let Some((_, tags)) = self.by_key.remove(key) else {
            return;
        };
        for tag in tags {
            if let Some(mut keys) = self.by_tag.get_mut(&tag) {
                keys.remove(key);
            }
            self.by_tag.remove_if(&tag, |_, keys| keys.is_empty());
        }
    }

    /// Remove a tag and unlink every key it held from its other tags
    fn take(&self, tag: &str) -> HashSet<String> {
        let Some((_, keys)) = self.by_tag.remove(tag) else {
            return HashSet::new();
        };
        for key in &keys {
            self.unlink(key);
        }
        keys
    }

    fn keys(&self, tag: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .by_tag
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn clear(&self) {
        self.by_tag.clear();
        self.by_key.clear();
    }
}

/// Key/value cache with tag-based bulk invalidation
///
/// - Entries never expire; they leave the cache through invalidation or
///   capacity eviction
/// - A single insert is atomic and immediately visible to other threads
/// - Get-then-compute-then-insert is *not* atomic: two threads missing the
///   same key both compute and the later insert wins
///
/// Each key stays recorded under the tags of its latest insert only.
/// Removal, re-insert and capacity eviction all prune the tag index.
pub struct TaggedCache<V> {
    inner: Cache<String, V>,
    index: Arc<TagIndex>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<V> TaggedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create new cache with max capacity
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        let index = Arc::new(TagIndex::default());
        let evicted = Arc::clone(&index);
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_listener(move |key: Arc<String>, _value: V, cause: RemovalCause| {
                if cause.was_evicted() {
                    tracing::trace!(key = key.as_str(), ?cause, "evicted");
                    evicted.unlink(&key);
                }
            })
            .build();

        Self {
            inner,
            index,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get stored value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key)
    }

    /// Check if cache contains key
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Store value and record the key under exactly these tags
    ///
    /// Tags of a previous insert under the same key are forgotten.
    pub fn insert<S: AsRef<str>>(&self, key: &str, tags: &[S], value: V) {
        // Tags first: an invalidation racing this insert then finds the key
        self.index
            .link(key, tags.iter().map(|t| t.as_ref().to_string()).collect());
        self.inner.insert(key.to_string(), value);
    }

    /// Get or compute value
    ///
    /// With `no_cache` the stored value is ignored, `compute` always runs and
    /// its result replaces the stored one.
    pub fn get_or_compute<S, F>(&self, key: &str, tags: &[S], no_cache: bool, compute: F) -> V
    where
        S: AsRef<str>,
        F: FnOnce() -> V,
    {
        match self.try_get_or_compute(key, tags, no_cache, || Ok::<V, std::convert::Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Try to get or compute value
    ///
    /// # Errors
    /// Returns the error of `compute`; nothing is stored in that case.
    pub fn try_get_or_compute<S, E, F>(
        &self,
        key: &str,
        tags: &[S],
        no_cache: bool,
        compute: F,
    ) -> Result<V, E>
    where
        S: AsRef<str>,
        F: FnOnce() -> Result<V, E>,
    {
        self.try_get_or_compute_tagged(key, no_cache, || {
            compute().map(|value| (value, tags.iter().map(|t| t.as_ref().to_string()).collect()))
        })
    }

    /// Try to get or compute a value whose tags are derived from the value
    ///
    /// # Errors
    /// Returns the error of `compute`; nothing is stored in that case.
    pub fn try_get_or_compute_tagged<E, F>(&self, key: &str, no_cache: bool, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<(V, Vec<String>), E>,
    {
        if !no_cache {
            if let Some(cached) = self.inner.get(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key, "cache hit");
                return Ok(cached);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(key, no_cache, "cache miss");

        let (value, tags) = compute()?;
        self.insert(key, &tags, value.clone());
        Ok(value)
    }

    /// Remove every key recorded under `tag`
    ///
    /// Returns the number of entries that were present and removed.
    pub fn invalidate(&self, tag: &str) -> usize {
        let keys = self.index.take(tag);
        let removed = keys
            .iter()
            .filter(|key| {
                let present = self.inner.contains_key(key.as_str());
                self.inner.invalidate(key.as_str());
                present
            })
            .count();
        tracing::debug!(tag, recorded = keys.len(), removed, "invalidated cache tag");
        removed
    }

    /// Remove a single key
    #[inline]
    pub fn invalidate_key(&self, key: &str) {
        self.index.unlink(key);
        self.inner.invalidate(key);
    }

    /// Invalidate all entries
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        self.index.clear();
    }

    /// Keys currently recorded under a tag
    #[must_use]
    pub fn keys_for_tag(&self, tag: &str) -> Vec<String> {
        self.index.keys(tag)
    }

    /// Flush moka's pending maintenance so `entry_count` is exact and
    /// evicted keys are pruned from the tag index
    #[inline]
    pub fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            tag_count: self.index.by_tag.len(),
        }
    }
}

impl<V> Clone for TaggedCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            index: Arc::clone(&self.index),
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
        }
    }
}

impl<V> fmt::Debug for TaggedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedCache")
            .field("entry_count", &self.inner.entry_count())
            .field("tag_count", &self.index.by_tag.len())
            .finish_non_exhaustive()
    }
}

impl<V> Default for TaggedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create cache with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn get_or_compute_runs_once() {
        let cache: TaggedCache<u32> = TaggedCache::new(100);
        let calls = AtomicUsize::new(0);

        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            42
        };
        assert_eq!(cache.get_or_compute("k", &tags(&["t"]), false, compute), 42);
        assert_eq!(
            cache.get_or_compute("k", &tags(&["t"]), false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                0
            }),
            42
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn no_cache_always_computes_and_restores() {
        let cache: TaggedCache<u32> = TaggedCache::new(100);
        let calls = AtomicUsize::new(0);

        for expected in [1, 2, 3] {
            let value = cache.get_or_compute("k", &tags(&[]), true, || {
                calls.fetch_add(1, Ordering::SeqCst) as u32 + 1
            });
            assert_eq!(value, expected);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Last computed value was stored
        assert_eq!(cache.get("k"), Some(3));
    }

    #[test]
    fn failed_compute_stores_nothing() {
        let cache: TaggedCache<u32> = TaggedCache::new(100);
        let result: Result<u32, &str> =
            cache.try_get_or_compute("k", &tags(&["t"]), false, || Err("lookup failed"));

        assert_eq!(result, Err("lookup failed"));
        assert!(!cache.contains("k"));
        assert!(cache.keys_for_tag("t").is_empty());
    }

    #[test]
    fn tags_derived_from_value() {
        let cache: TaggedCache<Vec<u32>> = TaggedCache::new(100);
        let value = cache
            .try_get_or_compute_tagged("story-structure:1", false, || {
                let steps = vec![4, 5];
                let tags = steps.iter().map(|s| format!("story_step:{s}")).collect();
                Ok::<_, ()>((steps, tags))
            })
            .unwrap();

        assert_eq!(value, vec![4, 5]);
        assert_eq!(cache.keys_for_tag("story_step:5"), vec!["story-structure:1".to_string()]);
        assert_eq!(cache.invalidate("story_step:4"), 1);
        assert!(!cache.contains("story-structure:1"));
    }

    #[test]
    fn invalidate_tag_leaves_unrelated_entries() {
        let cache: TaggedCache<&'static str> = TaggedCache::new(100);
        cache.insert("main:story-1", &tags(&["node:1", "main:layer:10"]), "one");
        cache.insert("main:story-1:step-5", &tags(&["node:1", "story_step:5"]), "step");
        cache.insert("main:story-2", &tags(&["node:2", "main:layer:10"]), "two");

        assert_eq!(cache.invalidate("node:1"), 2);

        assert!(!cache.contains("main:story-1"));
        assert!(!cache.contains("main:story-1:step-5"));
        assert!(cache.contains("main:story-2"));
        assert_eq!(cache.invalidate("node:1"), 0);
    }

    #[test]
    fn shared_tag_invalidates_across_keys() {
        let cache: TaggedCache<u8> = TaggedCache::new(100);
        cache.insert("a", &tags(&["main:layer:10"]), 1);
        cache.insert("b", &tags(&["main:layer:10"]), 2);
        cache.insert("c", &tags(&["main:layer:11"]), 3);

        assert_eq!(cache.keys_for_tag("main:layer:10"), vec!["a".to_string(), "b".to_string()]);
        cache.invalidate("main:layer:10");

        assert!(!cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn invalidated_key_leaves_its_other_tags() {
        let cache: TaggedCache<u8> = TaggedCache::new(100);
        cache.insert("k", &tags(&["a", "b"]), 1);

        assert_eq!(cache.invalidate("a"), 1);
        assert!(cache.keys_for_tag("b").is_empty());
        assert_eq!(cache.stats().tag_count, 0);
    }

    #[test]
    fn reinsert_replaces_tags() {
        let cache: TaggedCache<u8> = TaggedCache::new(100);
        cache.insert("k", &tags(&["a", "b"]), 1);
        cache.insert("k", &tags(&["c"]), 2);

        assert_eq!(cache.invalidate("b"), 0);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.keys_for_tag("c"), vec!["k".to_string()]);

        // Same through a recomputation that derives different tags
        let value = cache.get_or_compute("k", &tags(&["d"]), true, || 3);
        assert_eq!(value, 3);
        assert_eq!(cache.invalidate("c"), 0);
        assert!(cache.contains("k"));
        assert_eq!(cache.invalidate("d"), 1);
    }

    #[test]
    fn invalidate_key_prunes_index() {
        let cache: TaggedCache<usize> = TaggedCache::new(100);
        for i in 0..1_000 {
            let key = format!("k{i}");
            cache.insert(&key, &["t"], i);
            cache.invalidate_key(&key);
        }

        assert!(cache.keys_for_tag("t").is_empty());
        assert_eq!(cache.stats().tag_count, 0);
    }

    #[test]
    fn evicted_keys_leave_the_index() {
        let cache: TaggedCache<usize> = TaggedCache::new(10);
        for i in 0..200 {
            cache.insert(&format!("k{i}"), &["t"], i);
            cache.run_pending_tasks();
        }
        cache.run_pending_tasks();

        let recorded = cache.keys_for_tag("t");
        assert!(recorded.len() <= 10, "{} keys still recorded", recorded.len());
        assert!(recorded.iter().all(|key| cache.contains(key)));
    }

    #[test]
    fn invalidate_all_clears_tags() {
        let cache: TaggedCache<u8> = TaggedCache::default();
        cache.insert("a", &tags(&["x"]), 1);
        cache.invalidate_all();
        cache.run_pending_tasks();

        assert!(!cache.contains("a"));
        assert_eq!(cache.stats().tag_count, 0);
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[test]
    fn clones_share_state() {
        let cache: TaggedCache<u8> = TaggedCache::new(10);
        let other = cache.clone();
        cache.insert("a", &tags(&["x"]), 1);

        assert_eq!(other.get("a"), Some(1));
        other.invalidate("x");
        assert!(!cache.contains("a"));
    }

    #[test]
    fn concurrent_inserts_are_visible() {
        let cache: TaggedCache<usize> = TaggedCache::new(1_000);
        std::thread::scope(|scope| {
            for t in 0..4 {
                let cache = cache.clone();
                scope.spawn(move || {
                    for i in 0..50 {
                        let key = format!("k{}", i % 10);
                        // Deterministic value per key, so racing writers agree
                        let v = cache.get_or_compute(&key, &["shared"], false, || i % 10);
                        assert_eq!(v, i % 10, "thread {t}");
                    }
                });
            }
        });

        for i in 0..10 {
            assert_eq!(cache.get(&format!("k{i}")), Some(i));
        }
        assert_eq!(cache.invalidate("shared"), 10);
    }
}
