use chrono::{DateTime, Utc};
use criterion::Criterion;
use criterion::{criterion_group, criterion_main};
use std::sync::Arc;
use tokio::runtime::Runtime;
use unleash::{Client, ConfigCache, Context, PollingMode};

struct SingleValueCache {
    value: String,
}

impl SingleValueCache {
    pub fn new(val: String) -> Self {
        Self { value: val }
    }
}

impl ConfigCache for SingleValueCache {
    fn read(&self, _: &str) -> Option<String> {
        Some(self.value.clone())
    }
    fn write(&self, _: &str, _: &str) {}
}

fn is_enabled_bench(c: &mut Criterion) {
    let client = Arc::new(
        Client::builder("http://localhost:4242/api", "bench-app")
            .polling_mode(PollingMode::Manual)
            .metrics(false)
            // Seeded from the cache, no HTTP request is made.
            .cache(Box::new(SingleValueCache::new(construct_cache_payload(
                Utc::now(),
                "tag",
            ))))
            .build()
            .unwrap(),
    );
    c.bench_function("is_enabled", |b| {
        b.to_async(Runtime::new().unwrap()).iter(|| async {
            let mut handles = Vec::new();
            for i in 0..200 {
                let cl = client.clone();
                handles.push(tokio::spawn(async move {
                    let ctx = Context::new()
                        .user_id(i.to_string().as_str())
                        .environment("production");
                    cl.is_enabled("beta-ui", &ctx, false);
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
        });
    });
}

fn construct_cache_payload(time: DateTime<Utc>, etag: &str) -> String {
    time.timestamp_millis().to_string() + "\n" + etag + "\n" + construct_json_payload()
}

fn construct_json_payload() -> &'static str {
    r#"{"version": 1, "features": [{"name": "beta-ui", "enabled": true, "strategies": [
        {"name": "userWithId", "parameters": {"userIds": "1,2,3"}},
        {"name": "flexibleRollout", "parameters": {"rollout": "50", "stickiness": "default", "groupId": "beta-ui"},
         "constraints": [{"contextName": "environment", "operator": "IN", "values": ["production"]}]}
    ]}]}"#
}

criterion_group!(benches, is_enabled_bench);
criterion_main!(benches);
