//! Compiled Template Cache
//!
//! LRU cache of compiled templates keyed by template name.
//! Thread-safe; optional invalidation when the source file changes on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Instant, SystemTime};

use serde::Serialize;
use tracing::debug;

use super::template::CompiledTemplate;

pub struct TemplateCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
    stats: RwLock<CacheStats>,
}

struct CacheEntry {
    compiled: Arc<CompiledTemplate>,
    path: PathBuf,
    modified: Option<SystemTime>,
    last_accessed: Instant,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

impl CacheStats {
    /// Cache hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl TemplateCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Cached template, if present and (when `check_source`) still fresh
    ///
    /// A stale entry is dropped and counted as an invalidation plus a miss.
    /// The source file is checked without holding the cache lock.
    pub fn get(&self, name: &str, check_source: bool) -> Option<Arc<CompiledTemplate>> {
        let (compiled, source) = {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let Some(entry) = entries.get(name) else {
                self.bump(|s| s.misses += 1);
                return None;
            };
            (
                Arc::clone(&entry.compiled),
                check_source.then(|| (entry.path.clone(), entry.modified)),
            )
        };

        let stale = source.is_some_and(|(path, recorded)| modified_time(&path) != recorded);

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Replaced or removed while the file was being checked
        let Some(entry) = entries
            .get_mut(name)
            .filter(|entry| Arc::ptr_eq(&entry.compiled, &compiled))
        else {
            self.bump(|s| s.misses += 1);
            return None;
        };

        if stale {
            debug!(template = %name, "Template source changed, invalidating");
            entries.remove(name);
            self.bump(|s| {
                s.invalidations += 1;
                s.misses += 1;
            });
            return None;
        }

        entry.last_accessed = Instant::now();
        self.bump(|s| s.hits += 1);
        Some(compiled)
    }

    /// Store a compiled template loaded from `path`
    pub fn insert(&self, name: &str, compiled: Arc<CompiledTemplate>, path: &Path) {
        let modified = modified_time(path);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !entries.contains_key(name) && entries.len() >= self.max_entries {
            self.evict_oldest(&mut entries);
        }

        entries.insert(
            name.to_string(),
            CacheEntry {
                compiled,
                path: path.to_path_buf(),
                modified,
                last_accessed: Instant::now(),
            },
        );
    }

    /// Evict least recently used entry
    fn evict_oldest(&self, entries: &mut HashMap<String, CacheEntry>) {
        if let Some(oldest_key) = entries
            .iter()
            .min_by_key(|(_, v)| v.last_accessed)
            .map(|(k, _)| k.clone())
        {
            entries.remove(&oldest_key);
            debug!(template = %oldest_key, "Evicted template from cache");
            self.bump(|s| s.evictions += 1);
        }
    }

    fn bump(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self
            .stats
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut stats);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn stats(&self) -> CacheStats {
        *self
            .stats
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::template::Template;
    use std::fs;
    use tempfile::TempDir;

    fn compiled(name: &str) -> Arc<CompiledTemplate> {
        Arc::new(CompiledTemplate::compile(Template::parse(name, "body", None)).unwrap())
    }

    #[test]
    fn test_hit_and_miss_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.hbs");
        fs::write(&path, "body").unwrap();

        let cache = TemplateCache::new(4);
        assert!(cache.get("a", false).is_none());
        cache.insert("a", compiled("a"), &path);
        assert!(cache.get("a", false).is_some());
        assert!(cache.get("a", true).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.hbs");
        fs::write(&path, "body").unwrap();

        let cache = TemplateCache::new(2);
        cache.insert("a", compiled("a"), &path);
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.insert("b", compiled("b"), &path);
        std::thread::sleep(std::time::Duration::from_millis(2));
        // touch "a" so "b" becomes the oldest
        cache.get("a", false);
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.insert("c", compiled("c"), &path);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_source_change_invalidates_only_when_checked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.hbs");
        fs::write(&path, "v1").unwrap();

        let cache = TemplateCache::new(4);
        cache.insert("a", compiled("a"), &path);

        let later = SystemTime::now() + std::time::Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(cache.get("a", false).is_some());
        assert!(cache.get("a", true).is_none());
        assert!(!cache.contains("a"));
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_concurrent_checked_reads_all_hit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.hbs");
        fs::write(&path, "body").unwrap();

        let cache = TemplateCache::new(4);
        let template = compiled("a");
        cache.insert("a", Arc::clone(&template), &path);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let got = cache.get("a", true).unwrap();
                        assert!(Arc::ptr_eq(&got, &template));
                    }
                });
            }
        });

        let stats = cache.stats();
        assert_eq!(stats.hits, 400);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.invalidations, 0);
    }

    #[test]
    fn test_reinsert_after_invalidation_is_served() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.hbs");
        fs::write(&path, "v1").unwrap();

        let cache = TemplateCache::new(4);
        cache.insert("a", compiled("a"), &path);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + std::time::Duration::from_secs(60))
            .unwrap();
        assert!(cache.get("a", true).is_none());

        let fresh = compiled("a");
        cache.insert("a", Arc::clone(&fresh), &path);
        let got = cache.get("a", true).unwrap();
        assert!(Arc::ptr_eq(&got, &fresh));
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.hbs");
        fs::write(&path, "body").unwrap();

        let cache = TemplateCache::new(4);
        cache.insert("a", compiled("a"), &path);
        cache.clear();
        assert!(cache.is_empty());
    }
}
