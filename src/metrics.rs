use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Usage counters of a single flag.
#[derive(Serialize, Default, Debug, Clone, PartialEq)]
pub struct ToggleCount {
    pub yes: u64,
    pub no: u64,
    pub variants: HashMap<String, u64>,
}

/// Usage counters collected since `start`.
#[derive(Serialize, Debug, Clone)]
pub struct MetricsBucket {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub toggles: HashMap<String, ToggleCount>,
}

impl MetricsBucket {
    pub fn is_empty(&self) -> bool {
        self.toggles.is_empty()
    }
}

type CounterMap<V> = ArcSwap<HashMap<String, Arc<V>>>;

struct ToggleCounter {
    yes: AtomicU64,
    no: AtomicU64,
    variants: CounterMap<AtomicU64>,
}

impl Default for ToggleCounter {
    fn default() -> Self {
        Self {
            yes: AtomicU64::new(0),
            no: AtomicU64::new(0),
            variants: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

impl ToggleCounter {
    fn to_count(&self) -> ToggleCount {
        ToggleCount {
            yes: self.yes.load(Ordering::Relaxed),
            no: self.no.load(Ordering::Relaxed),
            variants: self
                .variants
                .load()
                .iter()
                .map(|(name, count)| (name.clone(), count.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

struct LiveBucket {
    start: DateTime<Utc>,
    toggles: CounterMap<ToggleCounter>,
}

impl LiveBucket {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            toggles: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

/// Collects flag usage without locking the evaluation path.
///
/// Counters are atomics. A flag's map entry is only copied in the first time the flag
/// is counted in a bucket.
pub struct MetricsRegistry {
    bucket: ArcSwap<LiveBucket>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            bucket: ArcSwap::from_pointee(LiveBucket::new(Utc::now())),
        }
    }

    pub fn count(&self, name: &str, enabled: bool) {
        let bucket = self.bucket.load();
        let toggle = counter(&bucket.toggles, name);
        if enabled {
            toggle.yes.fetch_add(1, Ordering::Relaxed);
        } else {
            toggle.no.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count_variant(&self, name: &str, variant: &str) {
        let bucket = self.bucket.load();
        let toggle = counter(&bucket.toggles, name);
        counter(&toggle.variants, variant).fetch_add(1, Ordering::Relaxed);
    }

    /// Swaps out the current bucket and returns it closed at the current time.
    ///
    /// Increments racing with the swap may land in the returned bucket after it was read
    /// and are dropped.
    pub fn take_bucket(&self) -> MetricsBucket {
        let now = Utc::now();
        let taken = self.bucket.swap(Arc::new(LiveBucket::new(now)));
        MetricsBucket {
            start: taken.start,
            stop: now,
            toggles: taken
                .toggles
                .load()
                .iter()
                .map(|(name, toggle)| (name.clone(), toggle.to_count()))
                .collect(),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn counter<V: Default>(map: &CounterMap<V>, key: &str) -> Arc<V> {
    if let Some(found) = map.load().get(key) {
        return Arc::clone(found);
    }
    map.rcu(|current| {
        if current.contains_key(key) {
            return Arc::clone(current);
        }
        let mut next = HashMap::clone(current);
        next.insert(key.to_owned(), Arc::new(V::default()));
        Arc::new(next)
    });
    match map.load().get(key) {
        Some(found) => Arc::clone(found),
        None => Arc::new(V::default()),
    }
}

#[cfg(test)]
mod metrics_tests {
    use crate::metrics::MetricsRegistry;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counts_yes_and_no() {
        let registry = MetricsRegistry::new();
        registry.count("a", true);
        registry.count("a", true);
        registry.count("a", false);
        registry.count("b", false);
        registry.count_variant("a", "blue");
        registry.count_variant("a", "blue");
        registry.count_variant("a", "disabled");

        let bucket = registry.take_bucket();
        assert!(bucket.stop >= bucket.start);
        assert_eq!(bucket.toggles["a"].yes, 2);
        assert_eq!(bucket.toggles["a"].no, 1);
        assert_eq!(bucket.toggles["a"].variants["blue"], 2);
        assert_eq!(bucket.toggles["a"].variants["disabled"], 1);
        assert_eq!(bucket.toggles["b"].yes, 0);
        assert_eq!(bucket.toggles["b"].no, 1);
    }

    #[test]
    fn take_resets_bucket() {
        let registry = MetricsRegistry::new();
        registry.count("a", true);
        let first = registry.take_bucket();
        let second = registry.take_bucket();
        assert!(!first.is_empty());
        assert!(second.is_empty());
        assert!(second.start >= first.stop);
    }

    #[test]
    fn concurrent_counting() {
        let registry = Arc::new(MetricsRegistry::new());
        let handles = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..250 {
                        registry.count("a", true);
                        // every thread races to create the same new entries
                        let name = format!("flag-{}", i % 5);
                        registry.count(name.as_str(), t % 2 == 0);
                        registry.count_variant(name.as_str(), format!("v{}", i % 3).as_str());
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        let bucket = registry.take_bucket();
        assert_eq!(bucket.toggles["a"].yes, 2000);
        assert_eq!(bucket.toggles.len(), 6);
        for i in 0..5 {
            let toggle = &bucket.toggles[format!("flag-{i}").as_str()];
            assert_eq!(toggle.yes, 200);
            assert_eq!(toggle.no, 200);
            assert_eq!(toggle.variants.values().sum::<u64>(), 400);
        }
        assert!(registry.take_bucket().is_empty());
    }

    #[test]
    fn bucket_serializes_in_backend_format() {
        let registry = MetricsRegistry::new();
        registry.count("a", true);
        let json = serde_json::to_value(registry.take_bucket()).unwrap();
        assert_eq!(json["toggles"]["a"]["yes"], 1);
        assert_eq!(json["toggles"]["a"]["no"], 0);
        assert!(json["start"].is_string());
        assert!(json["stop"].is_string());
    }
}
