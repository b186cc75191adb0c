//! Response cache for live analysis results
//!
//! Keys are the MD5 of the serialized payload with `requestedAt` removed, so
//! two requests over the same data and options share an entry regardless of
//! when they were made. Only live tier answers are stored.

use crate::types::{AnalysisPayload, AnalysisResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage seam for cached results.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<AnalysisResult>;
    fn set(&self, key: String, result: AnalysisResult);
    /// Remove an entry. Returns whether it existed.
    fn evict(&self, key: &str) -> bool;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key for a payload, or `None` when it cannot be serialized.
pub fn cache_key(payload: &AnalysisPayload) -> Option<String> {
    let mut value = serde_json::to_value(payload).ok()?;
    value.as_object_mut()?.remove("requestedAt");
    let bytes = serde_json::to_vec(&value).ok()?;
    Some(format!("{:x}", md5::compute(bytes)))
}

struct Entry {
    result: AnalysisResult,
    last_used: u64,
}

#[derive(Default)]
struct LruInner {
    entries: HashMap<String, Entry>,
    tick: u64,
}

impl LruInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// In-memory cache evicting the least recently used entry at capacity.
pub struct LruResponseCache {
    capacity: usize,
    inner: Mutex<LruInner>,
}

impl LruResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(LruInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruInner> {
        // A panic while holding the lock cannot leave the map half-written.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ResponseCache for LruResponseCache {
    fn get(&self, key: &str) -> Option<AnalysisResult> {
        let mut inner = self.lock();
        let tick = inner.next_tick();
        let entry = inner.entries.get_mut(key)?;
        entry.last_used = tick;
        Some(entry.result.clone())
    }

    fn set(&self, key: String, result: AnalysisResult) {
        let mut inner = self.lock();
        let tick = inner.next_tick();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                tracing::debug!(key = %oldest, "Evicted least recently used analysis");
            }
        }

        inner.entries.insert(
            key,
            Entry {
                result,
                last_used: tick,
            },
        );
    }

    fn evict(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisMode, AnalysisOptions, FeatureSet, Metric, SourceKind, TimeSeriesEntry};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn result(summary: &str) -> AnalysisResult {
        AnalysisResult {
            forecast: None,
            pollution_source: None,
            health_risk_groups: None,
            ventilation_tips: None,
            layout_suggestions: None,
            summary: summary.to_string(),
            confidence: 0.5,
            evidence: Vec::new(),
        }
    }

    fn payload() -> AnalysisPayload {
        AnalysisPayload {
            mode: AnalysisMode::Chat,
            source: SourceKind::Csv,
            requested_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            features: FeatureSet::for_mode(AnalysisMode::Chat),
            time_series: vec![TimeSeriesEntry::new("2024-03-01T11:00:00Z", 0).with(Metric::Pm25, 9.0)],
            frames: Vec::new(),
            sensor_summary: BTreeMap::new(),
            options: AnalysisOptions::default(),
            total_entries: 1,
            spike_count: None,
        }
    }

    #[test]
    fn test_key_ignores_request_time() {
        let a = payload();
        let mut b = payload();
        b.requested_at = a.requested_at + Duration::hours(3);
        assert_eq!(cache_key(&a), cache_key(&b));
        assert_eq!(cache_key(&a).unwrap().len(), 32);
    }

    #[test]
    fn test_key_changes_with_options() {
        let a = payload();
        let mut b = payload();
        b.options.message = Some("different question".to_string());
        assert_ne!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn test_get_set_evict() {
        let cache = LruResponseCache::new(4);
        assert!(cache.is_empty());
        cache.set("k".to_string(), result("a"));
        assert_eq!(cache.get("k").unwrap().summary, "a");
        assert!(cache.evict("k"));
        assert!(!cache.evict("k"));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = LruResponseCache::new(2);
        cache.set("a".to_string(), result("a"));
        cache.set("b".to_string(), result("b"));
        // Touch "a" so "b" becomes the oldest.
        assert!(cache.get("a").is_some());
        cache.set("c".to_string(), result("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = LruResponseCache::new(1);
        cache.set("a".to_string(), result("first"));
        cache.set("a".to_string(), result("second"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().summary, "second");
    }
}
