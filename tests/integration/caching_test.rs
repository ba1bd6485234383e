//! Caching proxy integration tests.

use std::sync::Arc;
use std::time::Duration;

use veneer::config::CachingSettings;
use veneer::{
    CachingEngine, Contract, EngineKind, PassingMode, ProxyError, ReturnShape, Strategy,
    SynthesisError,
};

use crate::contracts::{
    CountingLookup, CountingStore, Lookup, LookupMethods, Scratch, Store, Zeroes,
};

fn cached(engine: &CachingEngine, inner: &Arc<CountingLookup>) -> Arc<dyn Lookup> {
    let inner: Arc<dyn Lookup> = inner.clone();
    engine.build(inner, |_| {}).unwrap()
}

#[test]
fn test_get_served_from_cache_per_key() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());
    let lookup = cached(&engine, &inner);

    assert_eq!(lookup.get("a".to_string()), 1);
    assert_eq!(lookup.get("a".to_string()), 1);
    assert_eq!(lookup.get("b".to_string()), 2);
    assert_eq!(inner.calls(), 2);
}

#[test]
fn test_zero_argument_method_memoized() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());
    let lookup = cached(&engine, &inner);

    assert_eq!(lookup.name(), "lookup-1");
    assert_eq!(lookup.name(), "lookup-1");
    assert_eq!(inner.calls(), 1);
}

#[test]
fn test_composite_key_respects_argument_order() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());
    let lookup = cached(&engine, &inner);

    assert_eq!(lookup.between(1, 3), vec![1, 2, 3]);
    assert_eq!(lookup.between(1, 3), vec![1, 2, 3]);
    assert_eq!(inner.calls(), 1);

    assert!(lookup.between(3, 1).is_empty());
    assert_eq!(inner.calls(), 2);
}

#[test]
fn test_failures_reach_caller_and_are_not_cached() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());
    let lookup = cached(&engine, &inner);

    assert_eq!(lookup.parse(""), Err("nothing to parse on call 1".to_string()));
    assert_eq!(lookup.parse(""), Err("nothing to parse on call 2".to_string()));
    assert_eq!(lookup.parse("42"), Ok(42));
    assert_eq!(lookup.parse("42"), Ok(42));
    assert_eq!(inner.calls(), 3);
}

#[test]
fn test_unit_method_always_delegates() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());
    let lookup = cached(&engine, &inner);

    lookup.clear();
    lookup.clear();
    assert_eq!(inner.clears(), 2);
}

#[test]
fn test_unit_result_method_always_delegates() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingStore::default());
    let as_store: Arc<dyn Store> = inner.clone();
    let store = engine.build(as_store, |_| {}).unwrap();

    assert_eq!(store.save("x".to_string()), Ok(()));
    assert_eq!(store.save("x".to_string()), Ok(()));
    assert_eq!(store.save(String::new()), Err("empty item".to_string()));
    assert_eq!(store.flush(), Ok(()));
    assert_eq!(store.flush(), Ok(()));
    assert_eq!(inner.saves(), 3);
    assert_eq!(inner.flushes(), 2);

    let descriptor = <dyn Store as Contract>::descriptor();
    assert_eq!(descriptor.methods[0].returns, ReturnShape::Unit);
    assert_eq!(descriptor.methods[0].return_type, "Result<(), String>");

    let table = engine.synthesized::<dyn Store>().unwrap();
    assert!(table
        .plans()
        .iter()
        .all(|plan| plan.strategy == Strategy::PassThrough && plan.cell.is_none()));
    assert_eq!(table.cell_count(), 0);
}

#[test]
fn test_excluded_method_always_delegates() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());
    let as_lookup: Arc<dyn Lookup> = inner.clone();
    let lookup = engine
        .build(as_lookup, |cfg| {
            cfg.method(LookupMethods::GET).exclude();
        })
        .unwrap();

    assert_eq!(lookup.get("a".to_string()), 1);
    assert_eq!(lookup.get("a".to_string()), 2);
    // Other methods keep their default strategy.
    assert_eq!(lookup.name(), "lookup-3");
    assert_eq!(lookup.name(), "lookup-3");
}

#[test]
fn test_expired_values_recomputed() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());
    let as_lookup: Arc<dyn Lookup> = inner.clone();
    let lookup = engine
        .build(as_lookup, |cfg| {
            cfg.method(LookupMethods::GET)
                .expire(Duration::from_millis(20));
        })
        .unwrap();

    assert_eq!(lookup.get("a".to_string()), 1);
    assert_eq!(lookup.get("a".to_string()), 1);
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(lookup.get("a".to_string()), 2);
}

#[test]
fn test_expiration_can_be_switched_off() {
    let engine = CachingEngine::with_settings(CachingSettings {
        honor_expiration: false,
        ..CachingSettings::default()
    });
    let inner = Arc::new(CountingLookup::default());
    let as_lookup: Arc<dyn Lookup> = inner.clone();
    let lookup = engine
        .build(as_lookup, |cfg| {
            cfg.expire(LookupMethods::NAME, Duration::ZERO);
        })
        .unwrap();

    assert_eq!(lookup.name(), "lookup-1");
    assert_eq!(lookup.name(), "lookup-1");
}

#[test]
fn test_generated_descriptor() {
    let descriptor = <dyn Lookup as Contract>::descriptor();
    assert_eq!(descriptor.name, "Lookup");
    assert_eq!(descriptor.methods.len(), 5);

    let parse = &descriptor.methods[3];
    assert_eq!(parse.name, "parse");
    assert_eq!(parse.params[0].name, "text");
    assert_eq!(parse.params[0].type_name, "&str");
    assert_eq!(parse.params[0].mode, PassingMode::Shared);
    assert_eq!(parse.returns, ReturnShape::Fallible);
    assert_eq!(parse.return_type, "Result<i32, String>");

    assert_eq!(descriptor.methods[4].returns, ReturnShape::Unit);
    assert_eq!(LookupMethods::BETWEEN.index(), 2);
    assert_eq!(LookupMethods::BETWEEN.name(), "between");
}

#[test]
fn test_strategies_chosen_per_method() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());
    let _lookup = cached(&engine, &inner);

    let table = engine.synthesized::<dyn Lookup>().unwrap();
    assert_eq!(table.engine(), EngineKind::Caching);

    let strategies: Vec<Strategy> = table.plans().iter().map(|p| p.strategy).collect();
    assert_eq!(
        strategies,
        vec![
            Strategy::KeyCache { ttl: None },
            Strategy::Memo { ttl: None },
            Strategy::CompositeKeyCache { arity: 2, ttl: None },
            Strategy::KeyCache { ttl: None },
            Strategy::PassThrough,
        ]
    );
    assert_eq!(table.cell_count(), 4);
}

#[test]
fn test_exclusive_parameter_rejected_on_every_build() {
    let engine = CachingEngine::new();

    for _ in 0..2 {
        let inner: Arc<dyn Scratch> = Arc::new(Zeroes);
        let err = engine
            .build(inner, |_| {})
            .err()
            .expect("`&mut` parameter must be rejected");
        match err {
            ProxyError::Synthesis(SynthesisError::UnsupportedParameter {
                contract,
                method,
                param,
                ..
            }) => {
                assert_eq!(contract, "Scratch");
                assert_eq!(method, "fill");
                assert_eq!(param, "buf");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    assert!(engine.synthesized::<dyn Scratch>().is_none());
    assert_eq!(engine.stats().snapshot(), (0, 0, 0));
}

#[test]
fn test_stable_under_reuse() {
    let engine = CachingEngine::new();
    let inner = Arc::new(CountingLookup::default());

    for _ in 0..10 {
        let lookup = cached(&engine, &inner);
        lookup.name();
    }

    // One delegated call per proxy; one table for all of them.
    assert_eq!(inner.calls(), 10);
    assert_eq!(engine.stats().snapshot(), (1, 9, 0));
}

#[test]
fn test_global_engine_builds() {
    let inner = Arc::new(CountingLookup::default());
    let as_lookup: Arc<dyn Lookup> = inner.clone();
    let lookup = veneer::caching::build(as_lookup, |_| {}).unwrap();

    assert_eq!(lookup.get("x".to_string()), 1);
    assert_eq!(lookup.get("x".to_string()), 1);
    assert!(veneer::CachingEngine::global()
        .synthesized::<dyn Lookup>()
        .is_some());
}
