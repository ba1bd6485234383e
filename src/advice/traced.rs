//! Call-tracing advice.
//!
//! Wraps any contract implementation so that every method call is bracketed
//! by caller-supplied hooks. Hooks receive the inner instance and the method
//! name; they observe the call and cannot change its result.
//!
//! # Example
//!
//! ```ignore
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let seen = log.clone();
//! let lookup = veneer::traced::build(
//!     lookup,
//!     move |_inner, method: &str| seen.lock().unwrap().push(method.to_string()),
//!     |_inner, _method: &str| {},
//! )?;
//! ```
//!
//! `on_begin` runs immediately before delegating. `on_end` runs after the
//! inner method returns, including when it returns an `Err`; it does not run
//! when the inner method panics.

use std::any::TypeId;
use std::sync::{Arc, LazyLock};

use tracing::trace_span;

use crate::behavior::BehaviorTable;
use crate::config::{Settings, TracingSettings};
use crate::contract::{validate_build, Contract};
use crate::error::Result;
use crate::synthesis::{
    synthesize, EngineKind, SynthesisCache, SynthesisOptions, SynthesisStats, SynthesizedContract,
};

/// Hook invoked around a traced call with the inner instance and method name.
pub type TraceHook<C> = Arc<dyn Fn(&C, &str) + Send + Sync>;

/// The pair of hooks a tracing proxy calls.
pub struct TraceHooks<C: ?Sized> {
    on_begin: TraceHook<C>,
    on_end: TraceHook<C>,
}

impl<C: ?Sized> TraceHooks<C> {
    pub fn new<B, E>(on_begin: B, on_end: E) -> Self
    where
        B: Fn(&C, &str) + Send + Sync + 'static,
        E: Fn(&C, &str) + Send + Sync + 'static,
    {
        Self {
            on_begin: Arc::new(on_begin),
            on_end: Arc::new(on_end),
        }
    }

    /// Hooks with a no-op `on_end`.
    pub fn begin_only<B>(on_begin: B) -> Self
    where
        B: Fn(&C, &str) + Send + Sync + 'static,
    {
        Self::new(on_begin, |_: &C, _: &str| {})
    }
}

impl<C: ?Sized> Clone for TraceHooks<C> {
    fn clone(&self) -> Self {
        Self {
            on_begin: Arc::clone(&self.on_begin),
            on_end: Arc::clone(&self.on_end),
        }
    }
}

/// A contract with a tracing proxy shape.
///
/// Implemented for `dyn Trait` by `#[veneer::contract]`.
pub trait TracingContract: Contract {
    /// Wrap `inner` in the contract's tracing proxy.
    fn tracing_proxy(inner: Arc<Self>, core: TraceCore<Self>) -> Arc<Self>;
}

/// Per-proxy runtime for the tracing engine.
pub struct TraceCore<C: ?Sized> {
    contract: Arc<SynthesizedContract>,
    hooks: TraceHooks<C>,
    log_calls: bool,
}

impl<C: ?Sized> TraceCore<C> {
    pub fn new(contract: Arc<SynthesizedContract>, hooks: TraceHooks<C>, log_calls: bool) -> Self {
        Self {
            contract,
            hooks,
            log_calls,
        }
    }

    pub fn contract(&self) -> &SynthesizedContract {
        &self.contract
    }

    /// Run `call` between the hooks for the method at `method`.
    pub fn trace<R>(&self, method: usize, target: &C, call: impl FnOnce() -> R) -> R {
        let name = self
            .contract
            .plan(method)
            .map(|plan| plan.name)
            .unwrap_or("<unknown>");

        let span = self
            .log_calls
            .then(|| trace_span!("traced_call", contract = self.contract.contract(), method = name));
        let _entered = span.as_ref().map(|span| span.enter());

        (self.hooks.on_begin)(target, name);
        let result = call();
        (self.hooks.on_end)(target, name);
        result
    }
}

static GLOBAL: LazyLock<TracingEngine> =
    LazyLock::new(|| TracingEngine::with_settings(Settings::load_or_default().tracing));

/// Builds tracing proxies. Owns its own synthesized-contract cache.
#[derive(Debug)]
pub struct TracingEngine {
    cache: SynthesisCache,
    settings: TracingSettings,
}

impl TracingEngine {
    pub fn new() -> Self {
        Self::with_settings(TracingSettings::default())
    }

    pub fn with_settings(settings: TracingSettings) -> Self {
        Self {
            cache: SynthesisCache::new(EngineKind::Tracing),
            settings,
        }
    }

    /// The process-wide engine, configured from [`Settings::load_or_default`].
    pub fn global() -> &'static TracingEngine {
        &GLOBAL
    }

    pub fn settings(&self) -> &TracingSettings {
        &self.settings
    }

    /// Wrap `inner` in a tracing proxy for contract `C`.
    pub fn build<C, B, E>(&self, inner: Arc<C>, on_begin: B, on_end: E) -> Result<Arc<C>>
    where
        C: TracingContract + ?Sized,
        B: Fn(&C, &str) + Send + Sync + 'static,
        E: Fn(&C, &str) + Send + Sync + 'static,
    {
        self.build_with_hooks(inner, TraceHooks::new(on_begin, on_end))
    }

    /// Wrap `inner` using an existing pair of hooks.
    pub fn build_with_hooks<C>(&self, inner: Arc<C>, hooks: TraceHooks<C>) -> Result<Arc<C>>
    where
        C: TracingContract + ?Sized,
    {
        self.build_from(Some(inner), hooks)
    }

    /// Start a builder for contract `C`.
    pub fn builder<C>(&self) -> TracingBuilder<'_, C>
    where
        C: TracingContract + ?Sized,
    {
        TracingBuilder {
            engine: self,
            inner: None,
            hooks: None,
        }
    }

    /// The synthesized table for `C`, if a build has produced one.
    pub fn synthesized<C>(&self) -> Option<Arc<SynthesizedContract>>
    where
        C: Contract + ?Sized,
    {
        self.cache.get(TypeId::of::<C>())
    }

    pub fn stats(&self) -> &SynthesisStats {
        self.cache.stats()
    }

    fn build_from<C>(&self, inner: Option<Arc<C>>, hooks: TraceHooks<C>) -> Result<Arc<C>>
    where
        C: TracingContract + ?Sized,
    {
        let descriptor = C::descriptor();
        let inner = validate_build(&descriptor, inner)?;
        let contract = self.cache.get_or_synthesize(TypeId::of::<C>(), || {
            synthesize(
                EngineKind::Tracing,
                &descriptor,
                &BehaviorTable::new(),
                SynthesisOptions::default(),
            )
        })?;
        let core = TraceCore::new(contract, hooks, self.settings.log_calls);
        Ok(C::tracing_proxy(inner, core))
    }
}

impl Default for TracingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Step-by-step construction of a tracing proxy.
pub struct TracingBuilder<'e, C: ?Sized> {
    engine: &'e TracingEngine,
    inner: Option<Arc<C>>,
    hooks: Option<TraceHooks<C>>,
}

impl<C> TracingBuilder<'_, C>
where
    C: TracingContract + ?Sized,
{
    /// Set the implementation to wrap.
    pub fn inner(mut self, inner: Arc<C>) -> Self {
        self.inner = Some(inner);
        self
    }

    pub fn on_begin(self, on_begin: impl Fn(&C, &str) + Send + Sync + 'static) -> Self {
        let on_end = self.end_hook();
        self.with_hooks(TraceHooks {
            on_begin: Arc::new(on_begin),
            on_end,
        })
    }

    pub fn on_end(self, on_end: impl Fn(&C, &str) + Send + Sync + 'static) -> Self {
        let on_begin = self.begin_hook();
        self.with_hooks(TraceHooks {
            on_begin,
            on_end: Arc::new(on_end),
        })
    }

    /// Build the proxy. Fails if no inner instance was set; unset hooks
    /// default to no-ops.
    pub fn build(self) -> Result<Arc<C>> {
        let hooks = self
            .hooks
            .unwrap_or_else(|| TraceHooks::new(|_: &C, _: &str| {}, |_: &C, _: &str| {}));
        self.engine.build_from(self.inner, hooks)
    }

    fn with_hooks(mut self, hooks: TraceHooks<C>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    fn begin_hook(&self) -> TraceHook<C> {
        match &self.hooks {
            Some(hooks) => Arc::clone(&hooks.on_begin),
            None => Arc::new(|_: &C, _: &str| {}),
        }
    }

    fn end_hook(&self) -> TraceHook<C> {
        match &self.hooks {
            Some(hooks) => Arc::clone(&hooks.on_end),
            None => Arc::new(|_: &C, _: &str| {}),
        }
    }
}

/// Build a tracing proxy with the process-wide engine.
pub fn build<C, B, E>(inner: Arc<C>, on_begin: B, on_end: E) -> Result<Arc<C>>
where
    C: TracingContract + ?Sized,
    B: Fn(&C, &str) + Send + Sync + 'static,
    E: Fn(&C, &str) + Send + Sync + 'static,
{
    TracingEngine::global().build(inner, on_begin, on_end)
}
