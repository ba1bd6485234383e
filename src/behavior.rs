//! Per-method caching behavior, declared by the caller before the first build.
//!
//! ```rust,ignore
//! let lookup = veneer::caching::build(inner, |cfg| {
//!     cfg.method(LookupMethods::RELOAD).exclude();
//!     cfg.method(LookupMethods::GET).expire(Duration::from_secs(30));
//! })?;
//! ```

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::time::Duration;

use crate::contract::MethodRef;

/// Override of the default strategy for one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodBehavior {
    /// Always delegate; never cache.
    Excluded,
    /// Cache, but treat stored values older than the duration as absent.
    ExpireAfter(Duration),
}

/// Behavior overrides keyed by method position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorTable {
    entries: BTreeMap<usize, MethodBehavior>,
}

impl BehaviorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the behavior for a method, replacing any earlier setting.
    pub fn insert(&mut self, method: usize, behavior: MethodBehavior) {
        self.entries.insert(method, behavior);
    }

    pub fn get(&self, method: usize) -> Option<&MethodBehavior> {
        self.entries.get(&method)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &MethodBehavior)> {
        self.entries.iter().map(|(index, behavior)| (*index, behavior))
    }
}

/// Caching configuration for contract `C`.
pub struct CacheConfig<C: ?Sized> {
    table: BehaviorTable,
    _contract: PhantomData<fn(&C)>,
}

impl<C: ?Sized> CacheConfig<C> {
    pub fn new() -> Self {
        Self {
            table: BehaviorTable::new(),
            _contract: PhantomData,
        }
    }

    /// Select a method to configure.
    pub fn method(&mut self, method: MethodRef<C>) -> MethodConfigurator<'_> {
        MethodConfigurator {
            table: &mut self.table,
            method: method.index(),
        }
    }

    /// Shorthand for `method(m).exclude()`.
    pub fn exclude(&mut self, method: MethodRef<C>) -> &mut Self {
        self.method(method).exclude();
        self
    }

    /// Shorthand for `method(m).expire(ttl)`.
    pub fn expire(&mut self, method: MethodRef<C>, ttl: Duration) -> &mut Self {
        self.method(method).expire(ttl);
        self
    }

    pub fn table(&self) -> &BehaviorTable {
        &self.table
    }

    pub fn into_table(self) -> BehaviorTable {
        self.table
    }
}

impl<C: ?Sized> Default for CacheConfig<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> std::fmt::Debug for CacheConfig<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("table", &self.table)
            .finish()
    }
}

/// Configures a single method selected with [`CacheConfig::method`].
pub struct MethodConfigurator<'a> {
    table: &'a mut BehaviorTable,
    method: usize,
}

impl MethodConfigurator<'_> {
    /// Never cache this method.
    pub fn exclude(self) {
        self.table.insert(self.method, MethodBehavior::Excluded);
    }

    /// Cache this method, expiring stored values after `ttl`.
    pub fn expire(self, ttl: Duration) {
        self.table.insert(self.method, MethodBehavior::ExpireAfter(ttl));
    }
}
