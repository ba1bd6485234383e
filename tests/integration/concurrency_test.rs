//! Concurrent use of proxies and engines.
//!
//! Callers racing on an empty cell must cause exactly one delegated call,
//! and racing first builds must converge on a single dispatch table.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use veneer::{CachingEngine, TracingEngine};

use crate::contracts::{CountingLookup, Lookup};

const THREADS: usize = 16;

fn slow_lookup(engine: &CachingEngine) -> (Arc<CountingLookup>, Arc<dyn Lookup>) {
    let inner = Arc::new(CountingLookup::slow(Duration::from_millis(25)));
    let as_lookup: Arc<dyn Lookup> = inner.clone();
    let proxy = engine.build(as_lookup, |_| {}).unwrap();
    (inner, proxy)
}

#[test]
fn test_memo_computed_exactly_once_under_contention() {
    let engine = CachingEngine::new();
    let (inner, lookup) = slow_lookup(&engine);
    let barrier = Arc::new(Barrier::new(THREADS));

    let names: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let lookup = Arc::clone(&lookup);
                scope.spawn(move || {
                    barrier.wait();
                    lookup.name()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(inner.calls(), 1);
    assert!(names.iter().all(|name| name == "lookup-1"));
}

#[test]
fn test_keyed_computed_once_per_key_under_contention() {
    let engine = CachingEngine::new();
    let (inner, lookup) = slow_lookup(&engine);
    let barrier = Arc::new(Barrier::new(THREADS));

    let results: Vec<(String, i32)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let barrier = Arc::clone(&barrier);
                let lookup = Arc::clone(&lookup);
                let key = if i % 2 == 0 { "even" } else { "odd" }.to_string();
                scope.spawn(move || {
                    barrier.wait();
                    let value = lookup.get(key.clone());
                    (key, value)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(inner.calls(), 2);
    for key in ["even", "odd"] {
        let mut values = results.iter().filter(|(k, _)| k == key).map(|(_, v)| *v);
        let first = values.next().unwrap();
        assert!(values.all(|v| v == first));
    }
}

#[test]
fn test_racing_first_builds_share_one_table() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());
    let barrier = Arc::new(Barrier::new(THREADS));

    let proxies: Vec<Arc<dyn Lookup>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let inner: Arc<dyn Lookup> = inner.clone();
                let engine = &engine;
                scope.spawn(move || {
                    barrier.wait();
                    engine.build(inner, |_| {}).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let (synthesized, reused, discarded) = engine.stats().snapshot();
    assert_eq!(synthesized + reused, THREADS as u64);
    assert_eq!(synthesized - discarded, 1);

    // Every proxy works and keeps its own cells.
    for proxy in &proxies {
        proxy.name();
    }
    assert_eq!(inner.calls(), THREADS as i32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_proxy_shared_across_tasks() {
    let engine = TracingEngine::new();
    let inner: Arc<dyn Lookup> = Arc::new(CountingLookup::default());
    let traced = engine
        .build(inner, |_, _: &str| {}, |_, _: &str| {})
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let traced = Arc::clone(&traced);
        handles.push(tokio::task::spawn_blocking(move || {
            traced.get(format!("key-{i}"))
        }));
    }

    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.unwrap());
    }
    values.sort_unstable();
    assert_eq!(values, (1..=8).collect::<Vec<i32>>());
}
