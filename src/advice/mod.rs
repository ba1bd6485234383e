//! Aspect-oriented advice over contracts.
//!
//! Each kind of advice wraps an existing implementation of a contract in a
//! proxy that implements the same contract and delegates to it.
//!
//! # Architecture
//!
//! Advice is applied at composition time, not in implementations:
//!
//! ```ignore
//! // Core implementation - pure business logic
//! let catalog: Arc<dyn Catalog> = Arc::new(SqlCatalog::new(pool));
//!
//! // Apply advice layers
//! let catalog = veneer::caching::build(catalog, |_| {})?;
//! let catalog = veneer::traced::build(catalog, log_begin, log_end)?;
//!
//! // Use as normal - the proxies are transparent
//! catalog.price("sku-1".into());
//! ```
//!
//! # Available Advice
//!
//! - [`caching`] - Serves repeated calls from per-proxy cells
//! - [`traced`] - Brackets every call with begin/end hooks

pub mod caching;
pub mod traced;

pub use caching::{CachingBuilder, CachingContract, CachingCore, CachingEngine};
pub use traced::{TraceCore, TraceHook, TraceHooks, TracingBuilder, TracingContract, TracingEngine};
