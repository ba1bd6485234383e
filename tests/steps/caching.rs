//! Caching proxy step definitions.

use std::fmt;
use std::sync::Arc;

use cucumber::{given, then, when, World};
use veneer::{CacheConfig, CachingEngine, MethodRef};

use crate::contracts::{CountingLookup, Lookup, LookupMethods};

/// Test context for caching scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct CachingWorld {
    engine: CachingEngine,
    inner: Arc<CountingLookup>,
    proxy: Option<Arc<dyn Lookup>>,
    last_result: Option<i32>,
    last_parse: Option<Result<i32, String>>,
}

impl fmt::Debug for CachingWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingWorld")
            .field("inner_calls", &self.inner.calls())
            .field("has_proxy", &self.proxy.is_some())
            .field("last_result", &self.last_result)
            .field("last_parse", &self.last_parse)
            .finish()
    }
}

impl CachingWorld {
    fn new() -> Self {
        Self {
            engine: CachingEngine::new(),
            inner: Arc::new(CountingLookup::default()),
            proxy: None,
            last_result: None,
            last_parse: None,
        }
    }

    fn wrap(&mut self, configure: impl FnOnce(&mut CacheConfig<dyn Lookup>)) {
        let inner: Arc<dyn Lookup> = self.inner.clone();
        self.proxy = Some(self.engine.build(inner, configure).unwrap());
    }

    fn proxy(&self) -> &Arc<dyn Lookup> {
        self.proxy.as_ref().expect("no proxy built")
    }
}

fn method_named(name: &str) -> MethodRef<dyn Lookup> {
    match name {
        "get" => LookupMethods::GET,
        "name" => LookupMethods::NAME,
        "between" => LookupMethods::BETWEEN,
        "parse" => LookupMethods::PARSE,
        "clear" => LookupMethods::CLEAR,
        other => panic!("Lookup has no method {other}"),
    }
}

// --- Given ---

#[given("a counting lookup wrapped in a caching proxy")]
async fn given_caching_proxy(world: &mut CachingWorld) {
    world.wrap(|_| {});
}

#[given(expr = "a counting lookup wrapped in a caching proxy excluding {string}")]
async fn given_caching_proxy_excluding(world: &mut CachingWorld, method: String) {
    // The first configuration for a contract stays in effect per engine.
    *world = CachingWorld::new();
    let method = method_named(&method);
    world.wrap(|cfg| {
        cfg.method(method).exclude();
    });
}

// --- When ---

#[when(expr = "I get {string}")]
async fn when_get(world: &mut CachingWorld, key: String) {
    world.last_result = Some(world.proxy().get(key));
}

#[when(expr = "I ask for the name {int} time(s)")]
async fn when_name(world: &mut CachingWorld, times: usize) {
    for _ in 0..times {
        world.proxy().name();
    }
}

#[when(expr = "I parse {string}")]
async fn when_parse(world: &mut CachingWorld, text: String) {
    world.last_parse = Some(world.proxy().parse(&text));
}

#[when(expr = "I clear the lookup {int} time(s)")]
async fn when_clear(world: &mut CachingWorld, times: usize) {
    for _ in 0..times {
        world.proxy().clear();
    }
}

#[when("I wrap the same lookup in another caching proxy")]
async fn when_wrap_again(world: &mut CachingWorld) {
    world.wrap(|_| {});
}

// --- Then ---

#[then(expr = "the result is {int}")]
async fn then_result(world: &mut CachingWorld, expected: i32) {
    assert_eq!(world.last_result, Some(expected));
}

#[then("the parse fails")]
async fn then_parse_fails(world: &mut CachingWorld) {
    assert!(matches!(world.last_parse, Some(Err(_))));
}

#[then(expr = "the inner lookup was called {int} time(s)")]
async fn then_inner_called(world: &mut CachingWorld, times: i32) {
    assert_eq!(world.inner.calls(), times);
}

#[then(expr = "the inner lookup was cleared {int} time(s)")]
async fn then_inner_cleared(world: &mut CachingWorld, times: u32) {
    assert_eq!(world.inner.clears(), times);
}

#[then("the contract was synthesized once")]
async fn then_synthesized_once(world: &mut CachingWorld) {
    assert_eq!(world.engine.stats().snapshot(), (1, 1, 0));
}
