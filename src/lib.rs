//! Veneer - caching and tracing proxies over trait contracts
//!
//! A contract is an object-safe trait annotated with [`contract`]. Given any
//! implementation of it, the engines produce a proxy implementing the same
//! trait that either serves repeated calls from a cache or brackets every
//! call with begin/end hooks.
//!
//! ```ignore
//! #[veneer::contract]
//! pub trait Lookup: Send + Sync {
//!     fn get(&self, key: String) -> i32;
//! }
//!
//! let lookup: Arc<dyn Lookup> = Arc::new(TableLookup::default());
//! let cached = veneer::caching::build(lookup, |_| {})?;
//! ```

extern crate self as veneer;

pub mod advice;
pub mod behavior;
pub mod cell;
pub mod config;
pub mod contract;
pub mod error;
pub mod selector;
pub mod synthesis;
pub mod utils;

pub use advice::{caching, traced};
pub use advice::{
    CachingBuilder, CachingContract, CachingCore, CachingEngine, TraceCore, TraceHooks,
    TracingBuilder, TracingContract, TracingEngine,
};
pub use behavior::{BehaviorTable, CacheConfig, MethodBehavior};
pub use config::Settings;
pub use contract::{
    Contract, ContractDescriptor, ContractKind, MethodDescriptor, MethodRef, ParamDescriptor,
    PassingMode, ReturnShape,
};
pub use error::{ContractError, ProxyError, Result, SynthesisError};
pub use selector::Strategy;
pub use synthesis::{EngineKind, MethodPlan, SynthesizedContract};

/// Declare a trait as a proxyable contract.
///
/// Generates the contract descriptor, a `<Trait>Methods` holder of
/// [`MethodRef`] constants for configuring per-method behavior, and the
/// caching and tracing proxy shapes.
///
/// Options: `#[contract(name = "...")]` overrides the reported contract
/// name; `#[contract(trace_only)]` generates only the tracing shape.
pub use veneer_macros::contract;
