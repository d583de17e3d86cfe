//! Bounded cache of parsed control-block skeletons.
//!
//! Keys are the SHA-256 of the template text. Values never depend on a
//! context, so a hit is valid for every execution. Once `capacity` entries
//! are stored new templates are simply not cached.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::blocks::Skeleton;

#[derive(Debug)]
pub struct TemplateCache {
    capacity: usize,
    entries: Mutex<HashMap<String, Arc<Skeleton>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn key(template: &str) -> String {
        let digest = Sha256::digest(template.as_bytes());
        let mut key = String::with_capacity(64);
        for byte in digest.iter() {
            let _ = write!(key, "{byte:02x}");
        }
        key
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Skeleton>>> {
        // Entries are immutable once inserted, so a poisoned map is still valid.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Arc<Skeleton>> {
        let found = self.lock().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Returns false when the cache is full and `key` is not already present.
    pub fn insert(&self, key: String, skeleton: Arc<Skeleton>) -> bool {
        let mut entries = self.lock();
        if entries.contains_key(&key) {
            return true;
        }
        if entries.len() >= self.capacity {
            return false;
        }
        entries.insert(key, skeleton);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn skeleton(text: &str) -> Arc<Skeleton> {
        Skeleton::parse(text, 100)
    }

    #[test]
    fn key_is_stable_sha256_hex() {
        let k = TemplateCache::key("abc");
        assert_eq!(
            k,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(k, TemplateCache::key("abd"));
    }

    #[test]
    fn get_counts_hits_and_misses() {
        let cache = TemplateCache::new(10);
        let key = TemplateCache::key("t");
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), skeleton("t"));
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn full_cache_rejects_new_keys_without_eviction() {
        let cache = TemplateCache::new(2);
        assert!(cache.insert("a".into(), skeleton("a")));
        assert!(cache.insert("b".into(), skeleton("b")));
        assert!(!cache.insert("c".into(), skeleton("c")));
        assert!(cache.insert("a".into(), skeleton("a")));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_none());
    }

    #[test]
    fn concurrent_inserts_respect_capacity() {
        let cache = Arc::new(TemplateCache::new(16));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..20 {
                        let text = format!("{t}-{i}");
                        cache.insert(TemplateCache::key(&text), skeleton(&text));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 16);
    }

    #[test]
    fn clear_resets_everything() {
        let cache = TemplateCache::new(4);
        cache.insert("k".into(), skeleton("k"));
        let _ = cache.get("k");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 0);
    }
}
