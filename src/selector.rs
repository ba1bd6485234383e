//! Per-method strategy selection.
//!
//! Pure classification over a method's shape and its configured behavior,
//! applied once per method when a contract's dispatch table is built.

use std::fmt;
use std::time::Duration;

use crate::behavior::MethodBehavior;
use crate::contract::MethodDescriptor;

/// Runtime strategy a proxy applies to one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Delegate unchanged.
    PassThrough,
    /// Zero-argument method: one stored value per proxy.
    Memo { ttl: Option<Duration> },
    /// One-argument method: values keyed on the argument.
    KeyCache { ttl: Option<Duration> },
    /// N-argument method: values keyed on the ordered tuple of arguments.
    CompositeKeyCache { arity: usize, ttl: Option<Duration> },
    /// Delegate between begin and end hooks.
    Trace,
}

impl Strategy {
    /// Returns true if the strategy stores values in a per-proxy cell.
    pub fn needs_cell(&self) -> bool {
        matches!(
            self,
            Strategy::Memo { .. } | Strategy::KeyCache { .. } | Strategy::CompositeKeyCache { .. }
        )
    }

    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Strategy::Memo { ttl }
            | Strategy::KeyCache { ttl }
            | Strategy::CompositeKeyCache { ttl, .. } => *ttl,
            Strategy::PassThrough | Strategy::Trace => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::PassThrough => write!(f, "pass-through"),
            Strategy::Memo { .. } => write!(f, "memo"),
            Strategy::KeyCache { .. } => write!(f, "key-cache"),
            Strategy::CompositeKeyCache { arity, .. } => write!(f, "composite-key-cache/{arity}"),
            Strategy::Trace => write!(f, "trace"),
        }
    }
}

/// Strategy for a method under the caching engine.
///
/// Rules, first match wins:
/// 1. no return value (including `Result<(), E>`), or excluded: pass-through
/// 2. no parameters: memo
/// 3. one parameter: key cache
/// 4. otherwise: composite-key cache
///
/// Expiration durations are only carried into the strategy when
/// `honor_expiration` is set.
pub fn select_caching(
    method: &MethodDescriptor,
    behavior: Option<&MethodBehavior>,
    honor_expiration: bool,
) -> Strategy {
    if !method.returns.returns_value() || matches!(behavior, Some(MethodBehavior::Excluded)) {
        return Strategy::PassThrough;
    }

    let ttl = match behavior {
        Some(MethodBehavior::ExpireAfter(ttl)) if honor_expiration => Some(*ttl),
        _ => None,
    };

    match method.arity() {
        0 => Strategy::Memo { ttl },
        1 => Strategy::KeyCache { ttl },
        arity => Strategy::CompositeKeyCache { arity, ttl },
    }
}

/// Strategy for a method under the tracing engine. Shape is irrelevant.
pub fn select_tracing(_method: &MethodDescriptor) -> Strategy {
    Strategy::Trace
}
