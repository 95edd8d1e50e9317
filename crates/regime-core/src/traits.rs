use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::DecisionResult;
use crate::types::{Date, Series};

/// A read-only data source for price/macro series (§6.1). Implementations
/// live outside this workspace (HTTP clients, file loaders); this trait is
/// the seam the core pipeline depends on so it never talks to a concrete
/// transport directly.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load_series(&self, id: &str, from: Date, to: Date) -> DecisionResult<Series>;
}

/// Process-wide cache from `(endpoint, as_of)` to a cached JSON-ish payload,
/// with a per-key TTL (§5 "Shared resources"). Mirrors the reference
/// workspace's orchestrator-level `DashMap<K, CacheEntry<T>>` pattern.
pub struct EngineCache<V: Clone> {
    entries: DashMap<(String, Date), (V, DateTime<Utc>)>,
    ttl: chrono::Duration,
}

impl<V: Clone> EngineCache<V> {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::seconds(ttl_seconds),
        }
    }

    pub fn get(&self, endpoint: &str, as_of: Date) -> Option<V> {
        let key = (endpoint.to_string(), as_of);
        let entry = self.entries.get(&key)?;
        let (value, cached_at) = entry.value().clone();
        if Utc::now() - cached_at > self.ttl {
            drop(entry);
            self.entries.remove(&key);
            return None;
        }
        Some(value)
    }

    pub fn put(&self, endpoint: &str, as_of: Date, value: V) {
        self.entries
            .insert((endpoint.to_string(), as_of), (value, Utc::now()));
    }

    /// Pattern-based invalidation: drop every cached key whose endpoint
    /// contains `pattern` (§5 "Invalidation is pattern-based").
    pub fn invalidate_matching(&self, pattern: &str) {
        self.entries.retain(|(endpoint, _), _| !endpoint.contains(pattern));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_roundtrip_and_ttl() {
        let cache: EngineCache<i32> = EngineCache::new(3600);
        let d = Date::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(cache.get("x", d).is_none());
        cache.put("x", d, 42);
        assert_eq!(cache.get("x", d), Some(42));
    }

    #[test]
    fn cache_invalidate_matching_pattern() {
        let cache: EngineCache<i32> = EngineCache::new(3600);
        let d = Date::from_ymd_opt(2024, 1, 1).unwrap();
        cache.put("world:macro", d, 1);
        cache.put("world:liquidity", d, 2);
        cache.put("forecast:spx", d, 3);
        cache.invalidate_matching("world:");
        assert_eq!(cache.get("world:macro", d), None);
        assert_eq!(cache.get("world:liquidity", d), None);
        assert_eq!(cache.get("forecast:spx", d), Some(3));
    }
}
