//! Result-caching advice.
//!
//! Wraps any contract implementation so that value-returning methods are
//! served from per-proxy cells after the first call.
//!
//! # Example
//!
//! ```ignore
//! #[veneer::contract]
//! pub trait Lookup: Send + Sync {
//!     fn get(&self, key: String) -> i32;
//!     fn reload(&self) -> usize;
//! }
//!
//! let lookup: Arc<dyn Lookup> = Arc::new(DatabaseLookup::new(pool));
//! let lookup = veneer::caching::build(lookup, |cfg| {
//!     cfg.method(LookupMethods::RELOAD).exclude();
//! })?;
//!
//! lookup.get("a".into()); // delegates
//! lookup.get("a".into()); // served from cache
//! ```
//!
//! Strategies are chosen per method by [`select_caching`](crate::selector::select_caching).
//! The dispatch table is synthesized once per contract and then shared; the
//! configuration passed to the first build of a contract is the one that
//! stays in effect for every later build of that contract.

use std::any::TypeId;
use std::convert::Infallible;
use std::hash::Hash;
use std::sync::{Arc, LazyLock};

use tracing::{error, trace, warn};

use crate::behavior::{BehaviorTable, CacheConfig};
use crate::cell::{CellSlots, KeyedCell, MemoCell};
use crate::config::{CachingSettings, Settings};
use crate::contract::{validate_build, Contract, ContractDescriptor};
use crate::error::Result;
use crate::selector::Strategy;
use crate::synthesis::{
    synthesize, EngineKind, MethodPlan, SynthesisCache, SynthesisOptions, SynthesisStats,
    SynthesizedContract,
};

/// A contract with a caching proxy shape.
///
/// Implemented for `dyn Trait` by `#[veneer::contract]`.
pub trait CachingContract: Contract {
    /// Wrap `inner` in the contract's caching proxy.
    fn caching_proxy(inner: Arc<Self>, core: CachingCore) -> Arc<Self>;
}

/// Per-proxy runtime: the contract's dispatch table plus this proxy's cells.
///
/// Generated method bodies call [`unit`](Self::unit), [`value`](Self::value)
/// or [`fallible`](Self::fallible) with their method position.
pub struct CachingCore {
    contract: Arc<SynthesizedContract>,
    cells: CellSlots,
}

impl CachingCore {
    pub fn new(contract: Arc<SynthesizedContract>) -> Self {
        let cells = CellSlots::new(contract.cell_count());
        Self { contract, cells }
    }

    pub fn contract(&self) -> &SynthesizedContract {
        &self.contract
    }

    pub fn cells(&self) -> &CellSlots {
        &self.cells
    }

    /// Dispatch a method returning nothing. Always delegates.
    pub fn unit<R>(&self, method: usize, call: impl FnOnce() -> R) -> R {
        if let Some(plan) = self.plan(method) {
            trace!(contract = self.contract.contract(), method = plan.name, "Delegating");
        }
        call()
    }

    /// Dispatch a method returning a plain value.
    ///
    /// `args` holds the call's arguments; `key` projects them onto the owned
    /// cache key and `call` delegates to the inner instance.
    pub fn value<A, K, V, KF, CF>(&self, method: usize, args: A, key: KF, call: CF) -> V
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        KF: FnOnce(&A) -> K,
        CF: FnOnce(A) -> V,
    {
        match self.fallible(method, args, key, |args| Ok::<V, Infallible>(call(args))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Dispatch a method returning `Result<T, E>`. `Err` values are passed
    /// back and never stored.
    pub fn fallible<A, K, T, E, KF, CF>(
        &self,
        method: usize,
        args: A,
        key: KF,
        call: CF,
    ) -> std::result::Result<T, E>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        KF: FnOnce(&A) -> K,
        CF: FnOnce(A) -> std::result::Result<T, E>,
    {
        let Some(plan) = self.plan(method) else {
            return call(args);
        };
        let Some(slot) = plan.cell else {
            trace!(contract = self.contract.contract(), method = plan.name, "Delegating");
            return call(args);
        };
        let ttl = plan.strategy.ttl();

        match plan.strategy {
            Strategy::Memo { .. } => match self.cells.typed::<MemoCell<T>>(slot) {
                Some(cell) => cell.get_or_try_compute(ttl, || call(args)),
                None => self.mistyped(plan, || call(args)),
            },
            Strategy::KeyCache { .. } | Strategy::CompositeKeyCache { .. } => {
                match self.cells.typed::<KeyedCell<K, T>>(slot) {
                    Some(cell) => {
                        let key = key(&args);
                        cell.get_or_try_compute(key, ttl, || call(args))
                    }
                    None => self.mistyped(plan, || call(args)),
                }
            }
            Strategy::PassThrough | Strategy::Trace => call(args),
        }
    }

    fn plan(&self, method: usize) -> Option<&MethodPlan> {
        let plan = self.contract.plan(method);
        if plan.is_none() {
            warn!(
                contract = self.contract.contract(),
                method, "No plan for method position, delegating"
            );
        }
        plan
    }

    fn mistyped<R>(&self, plan: &MethodPlan, call: impl FnOnce() -> R) -> R {
        error!(
            contract = self.contract.contract(),
            method = plan.name,
            "Cache cell holds a different type, delegating without caching"
        );
        call()
    }
}

impl std::fmt::Debug for CachingCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingCore")
            .field("contract", &self.contract.contract())
            .field("cells", &self.cells.len())
            .finish()
    }
}

static GLOBAL: LazyLock<CachingEngine> =
    LazyLock::new(|| CachingEngine::with_settings(Settings::load_or_default().caching));

/// Builds caching proxies. Owns its own synthesized-contract cache.
#[derive(Debug)]
pub struct CachingEngine {
    cache: SynthesisCache,
    settings: CachingSettings,
}

impl CachingEngine {
    pub fn new() -> Self {
        Self::with_settings(CachingSettings::default())
    }

    pub fn with_settings(settings: CachingSettings) -> Self {
        Self {
            cache: SynthesisCache::new(EngineKind::Caching),
            settings,
        }
    }

    /// The process-wide engine, configured from [`Settings::load_or_default`].
    pub fn global() -> &'static CachingEngine {
        &GLOBAL
    }

    pub fn settings(&self) -> &CachingSettings {
        &self.settings
    }

    /// Wrap `inner` in a caching proxy for contract `C`.
    pub fn build<C>(
        &self,
        inner: Arc<C>,
        configure: impl FnOnce(&mut CacheConfig<C>),
    ) -> Result<Arc<C>>
    where
        C: CachingContract + ?Sized,
    {
        let mut config = CacheConfig::new();
        configure(&mut config);
        self.build_from(Some(inner), config.into_table())
    }

    /// Start a builder for contract `C`.
    pub fn builder<C>(&self) -> CachingBuilder<'_, C>
    where
        C: CachingContract + ?Sized,
    {
        CachingBuilder {
            engine: self,
            inner: None,
            config: CacheConfig::new(),
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

    fn build_from<C>(&self, inner: Option<Arc<C>>, behaviors: BehaviorTable) -> Result<Arc<C>>
    where
        C: CachingContract + ?Sized,
    {
        let descriptor = C::descriptor();
        let inner = validate_build(&descriptor, inner)?;
        let contract = self.resolve::<C>(&descriptor, &behaviors)?;
        Ok(C::caching_proxy(inner, CachingCore::new(contract)))
    }

    fn resolve<C>(
        &self,
        descriptor: &ContractDescriptor,
        behaviors: &BehaviorTable,
    ) -> Result<Arc<SynthesizedContract>>
    where
        C: CachingContract + ?Sized,
    {
        let options = SynthesisOptions {
            honor_expiration: self.settings.honor_expiration,
        };
        let contract = self.cache.get_or_synthesize(TypeId::of::<C>(), || {
            synthesize(EngineKind::Caching, descriptor, behaviors, options)
        })?;

        if self.settings.warn_on_config_mismatch && contract.behaviors() != behaviors {
            warn!(
                contract = descriptor.name,
                embedded = ?contract.behaviors(),
                requested = ?behaviors,
                "Contract already synthesized with a different caching configuration; \
                 the embedded configuration stays in effect"
            );
        }

        Ok(contract)
    }
}

impl Default for CachingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Step-by-step construction of a caching proxy.
pub struct CachingBuilder<'e, C: ?Sized> {
    engine: &'e CachingEngine,
    inner: Option<Arc<C>>,
    config: CacheConfig<C>,
}

impl<C> CachingBuilder<'_, C>
where
    C: CachingContract + ?Sized,
{
    /// Set the implementation to wrap.
    pub fn inner(mut self, inner: Arc<C>) -> Self {
        self.inner = Some(inner);
        self
    }

    /// Adjust per-method behavior. May be called repeatedly.
    pub fn configure(mut self, configure: impl FnOnce(&mut CacheConfig<C>)) -> Self {
        configure(&mut self.config);
        self
    }

    /// Build the proxy. Fails if no inner instance was set.
    pub fn build(self) -> Result<Arc<C>> {
        self.engine
            .build_from(self.inner, self.config.into_table())
    }
}

/// Build a caching proxy with the process-wide engine.
pub fn build<C>(inner: Arc<C>, configure: impl FnOnce(&mut CacheConfig<C>)) -> Result<Arc<C>>
where
    C: CachingContract + ?Sized,
{
    CachingEngine::global().build(inner, configure)
}
